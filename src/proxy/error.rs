use std::fmt;

use hyper::StatusCode;
use serde_json::json;

use crate::cache;

#[derive(Debug, PartialEq)]
pub enum Error {
    Initialization(String),
    Configuration(String),
    // mappable to classical HTTP responses
    Unauthorized(String),
    Upstream(String),
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Initialization(err) => write!(f, "{err}"),
            Error::Configuration(err) => write!(f, "Invalid configuration: {err}"),
            Error::Unauthorized(err) => write!(f, "Unauthorized: {err}"),
            Error::Upstream(err) => write!(f, "Upstream error: {err}"),
            Error::Internal(err) => write!(f, "Internal Server Error: {err}"),
        }
    }
}

impl From<cache::Error> for Error {
    fn from(error: cache::Error) -> Self {
        Error::Internal(format!("Cache error: {error}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Internal(format!("JSON error: {error}"))
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::Initialization(_) | Error::Configuration(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn as_json(&self, trace_id: Option<&String>) -> serde_json::Value {
        let (code, message) = match self {
            Error::Unauthorized(msg) => ("UNAUTHORIZED", msg),
            Error::Upstream(msg) => ("BAD_GATEWAY", msg),
            Error::Initialization(msg) | Error::Configuration(msg) | Error::Internal(msg) => {
                ("INTERNAL_SERVER_ERROR", msg)
            }
        };

        if let Some(trace_id) = trace_id {
            json!({
                "errors": [{
                    "code": code,
                    "message": message,
                    "detail": { "trace_id": trace_id }
                }]
            })
        } else {
            json!({
                "errors": [{
                    "code": code,
                    "message": message,
                }]
            })
        }
    }
}
