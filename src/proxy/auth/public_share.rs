use std::collections::HashMap;

use argon2::password_hash::PasswordHashString;
use argon2::{Argon2, PasswordVerifier};
use async_trait::async_trait;
use hyper::http::request::Parts;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{AuthResult, Authenticator};
use crate::proxy::path::PathClass;
use crate::proxy::request_ext::HeaderExt;
use crate::proxy::{AuthMethod, ClientIdentity, Error};

pub const SHARE_TOKEN_HEADER: &str = "public-token";
const SHARE_TOKEN_PARAM: &str = "public-token";
const SHARE_USERNAME: &str = "public";

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub owner: String,
    /// Argon2 hash; the share is password protected when set
    #[serde(default)]
    pub password: Option<String>,
}

struct Share {
    owner: String,
    password: Option<PasswordHashString>,
}

/// Authenticates requests against public link shares.
///
/// The share token travels in the `public-token` header or query parameter. Password
/// protected shares additionally require `Basic public:<password>`.
pub struct PublicShareValidator {
    shares: HashMap<String, Share>,
}

impl PublicShareValidator {
    pub fn new(shares: &HashMap<String, Config>) -> Self {
        let mut validated = HashMap::new();
        for (token, config) in shares {
            let password = match config.password.as_deref().map(PasswordHashString::new) {
                None => None,
                Some(Ok(hash)) => Some(hash),
                Some(Err(err)) => {
                    warn!("Invalid password hash for public share of {}: {err}", config.owner);
                    continue;
                }
            };

            let share = Share {
                owner: config.owner.clone(),
                password,
            };
            validated.insert(token.clone(), share);
        }

        Self { shares: validated }
    }

    fn verify_password(parts: &Parts, hash: &PasswordHashString) -> bool {
        let Some((username, password)) = parts.basic_auth() else {
            debug!("Password protected share accessed without credentials");
            return false;
        };

        if username != SHARE_USERNAME {
            return false;
        }

        Argon2::default()
            .verify_password(password.as_bytes(), &hash.password_hash())
            .is_ok()
    }
}

#[async_trait]
impl Authenticator for PublicShareValidator {
    fn name(&self) -> &'static str {
        AuthMethod::PublicShare.as_str()
    }

    /// Share tokens only open public share paths.
    fn applies_to(&self, path_class: PathClass) -> bool {
        path_class == PathClass::Public
    }

    async fn authenticate(&self, parts: &Parts) -> Result<AuthResult, Error> {
        let Some(token) = parts
            .get_header(SHARE_TOKEN_HEADER)
            .or_else(|| parts.query_param(SHARE_TOKEN_PARAM))
        else {
            return Ok(AuthResult::NoCredentials);
        };

        let Some(share) = self.shares.get(&token) else {
            debug!("Unknown public share token");
            return Ok(AuthResult::NoCredentials);
        };

        if let Some(hash) = &share.password {
            if !Self::verify_password(parts, hash) {
                return Ok(AuthResult::NoCredentials);
            }
        }

        let mut claims = HashMap::new();
        claims.insert("share_token".to_string(), json!(token));

        let identity = ClientIdentity::new(share.owner.clone(), AuthMethod::PublicShare)
            .with_username(SHARE_USERNAME)
            .with_claims(claims);
        Ok(AuthResult::Authenticated(identity))
    }
}
