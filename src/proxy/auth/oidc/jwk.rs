use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::proxy::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kty")]
pub enum Jwk {
    #[serde(rename = "RSA")]
    Rsa {
        #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
        key_use: Option<String>,
        kid: Option<String>,
        alg: Option<String>,
        n: String,
        e: String,
    },
    #[serde(rename = "EC")]
    Ec {
        #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
        key_use: Option<String>,
        kid: Option<String>,
        alg: Option<String>,
        x: String,
        y: String,
    },
}

impl Jwk {
    pub fn kid(&self) -> Option<&str> {
        match self {
            Jwk::Rsa { kid, .. } | Jwk::Ec { kid, .. } => kid.as_deref(),
        }
    }

    pub fn to_decoding_key(&self) -> Result<DecodingKey, Error> {
        match self {
            Jwk::Rsa { n, e, alg, kid, .. } => {
                debug!("Creating RSA DecodingKey from JWK with alg={alg:?}, kid={kid:?}");
                DecodingKey::from_rsa_components(n, e)
                    .map_err(|e| Error::Unauthorized(format!("Unusable RSA key: {e}")))
            }
            Jwk::Ec { x, y, alg, kid, .. } => {
                debug!("Creating EC DecodingKey from JWK with alg={alg:?}, kid={kid:?}");
                DecodingKey::from_ec_components(x, y)
                    .map_err(|e| Error::Unauthorized(format!("Unusable EC key: {e}")))
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Finds the signing key for a token header.
    ///
    /// A token without `kid` is only accepted when the set holds a single key.
    pub fn find(&self, kid: Option<&str>) -> Option<&Jwk> {
        match kid {
            Some(kid) => self.keys.iter().find(|key| key.kid() == Some(kid)),
            None if self.keys.len() == 1 => self.keys.first(),
            None => None,
        }
    }
}
