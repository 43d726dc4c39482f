use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use hyper::http::request::Parts;
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use super::{AuthResult, Authenticator};
use crate::proxy::{AuthMethod, ClientIdentity, Error};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HMAC-SHA256";
const SIGNATURE_PARAM: &str = "OC-Signature";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Signing key per credential (user id)
    #[serde(default)]
    pub keys: HashMap<String, String>,
}

#[derive(Debug, PartialEq)]
struct SignedRequest {
    credential: String,
    date: DateTime<Utc>,
    expires: i64,
    verb: String,
    signature: String,
    // raw query with the signature parameter removed, as it was signed
    signed_query: String,
}

impl SignedRequest {
    fn parse(query: &str) -> Option<Self> {
        let params: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
        let param = |name: &str| {
            params
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        };

        let signature = param(SIGNATURE_PARAM)?;
        if param("OC-Algo")? != ALGORITHM {
            debug!("Unsupported signing algorithm");
            return None;
        }

        let date = DateTime::parse_from_rfc3339(&param("OC-Date")?)
            .ok()?
            .with_timezone(&Utc);

        let signed_query = query
            .split('&')
            .filter(|pair| !pair.starts_with("OC-Signature="))
            .collect::<Vec<_>>()
            .join("&");

        Some(Self {
            credential: param("OC-Credential")?,
            date,
            expires: param("OC-Expires")?.parse().ok()?,
            verb: param("OC-Verb")?,
            signature,
            signed_query,
        })
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        TimeDelta::try_seconds(self.expires)
            .and_then(|expires| self.date.checked_add_signed(expires))
            .is_none_or(|deadline| now > deadline)
    }
}

pub fn string_to_sign(method: &str, path: &str, signed_query: &str) -> String {
    format!("{method}\n{path}?{signed_query}")
}

/// Authenticates pre-signed URLs carrying `OC-*` query parameters.
pub struct SignedUrlValidator {
    keys: HashMap<String, String>,
}

impl SignedUrlValidator {
    pub fn new(config: &Config) -> Self {
        Self {
            keys: config.keys.clone(),
        }
    }

    fn verify(&self, parts: &Parts, request: &SignedRequest) -> Result<bool, Error> {
        let Some(key) = self.keys.get(&request.credential) else {
            debug!("Unknown signing credential '{}'", request.credential);
            return Ok(false);
        };

        let Ok(signature) = hex::decode(&request.signature) else {
            debug!("Signature is not hex encoded");
            return Ok(false);
        };

        let payload = string_to_sign(
            parts.method.as_str(),
            parts.uri.path(),
            &request.signed_query,
        );

        let mut mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|e| Error::Internal(format!("Invalid signing key: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(mac.verify_slice(&signature).is_ok())
    }
}

#[async_trait]
impl Authenticator for SignedUrlValidator {
    fn name(&self) -> &'static str {
        AuthMethod::SignedUrl.as_str()
    }

    async fn authenticate(&self, parts: &Parts) -> Result<AuthResult, Error> {
        let Some(request) = parts.uri.query().and_then(SignedRequest::parse) else {
            return Ok(AuthResult::NoCredentials);
        };

        if !request.verb.eq_ignore_ascii_case(parts.method.as_str()) {
            debug!("Signed URL verb does not match request method");
            return Ok(AuthResult::NoCredentials);
        }

        if request.is_expired(Utc::now()) {
            debug!("Signed URL has expired");
            return Ok(AuthResult::NoCredentials);
        }

        if !self.verify(parts, &request)? {
            return Ok(AuthResult::NoCredentials);
        }

        let identity = ClientIdentity::new(request.credential, AuthMethod::SignedUrl);
        Ok(AuthResult::Authenticated(identity))
    }
}
