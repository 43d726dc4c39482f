use std::fmt;

use redis::RedisError;
use tracing::warn;

#[derive(Debug, PartialEq)]
pub enum Error {
    /// The store itself is unavailable (connection refused, timeout, ...)
    Backend(String),
    /// The store answered but the value could not be (de)serialized or written
    Execution(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Backend(err) => write!(f, "cache backend unavailable: {err}"),
            Error::Execution(err) => write!(f, "{err}"),
        }
    }
}

impl From<RedisError> for Error {
    fn from(error: RedisError) -> Self {
        warn!("Redis backend error: {error}");
        Error::Backend(error.category().to_string())
    }
}
