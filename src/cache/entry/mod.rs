use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::cache::{Cache, Error};


/// What a cache entry holds, and for which token or issuer.
#[derive(Clone, Copy, Debug)]
pub enum CacheKey<'a> {
    /// Claims resolved from an access token
    AccessToken(&'a str),
    /// Signing keys of an issuer
    Jwks(&'a str),
    /// Discovery document of an issuer
    Discovery(&'a str),
}

impl CacheKey<'_> {
    fn kind(self) -> &'static str {
        match self {
            CacheKey::AccessToken(_) => "token",
            CacheKey::Jwks(_) => "jwks",
            CacheKey::Discovery(_) => "config",
        }
    }

    /// Store key; tokens never reach the backend in clear.
    pub fn to_key(self) -> String {
        let subject = match self {
            CacheKey::AccessToken(subject) | CacheKey::Jwks(subject) | CacheKey::Discovery(subject) => {
                subject
            }
        };
        let digest = Sha256::digest(subject.as_bytes());
        format!("oidc:{}:{}", self.kind(), hex::encode(digest))
    }
}

/// Lifetime of an entry derived from a credential expiring at `expires_at` (unix
/// seconds): `ttl`, cut short so the entry never outlives the credential.
pub fn capped_ttl(ttl: u64, expires_at: Option<i64>) -> u64 {
    let Some(expires_at) = expires_at else {
        return ttl;
    };

    let remaining = expires_at.saturating_sub(Utc::now().timestamp());
    u64::try_from(remaining).map_or(0, |remaining| remaining.min(ttl))
}

/// Looks up an entry. An entry that no longer decodes counts as a miss.
pub async fn retrieve<T>(cache: &dyn Cache, key: CacheKey<'_>) -> Result<Option<T>, Error>
where
    T: DeserializeOwned,
{
    let key = key.to_key();
    let Some(cached) = cache.retrieve_value(&key).await? else {
        return Ok(None);
    };

    match serde_json::from_str::<T>(&cached) {
        Ok(value) => {
            debug!("Cache hit for {key}");
            Ok(Some(value))
        }
        Err(err) => {
            warn!("Ignoring undecodable cache entry {key}: {err}");
            Ok(None)
        }
    }
}

/// Stores an entry for `ttl` seconds. Nothing is stored when `ttl` is zero.
pub async fn store<T>(cache: &dyn Cache, key: CacheKey<'_>, value: &T, ttl: u64) -> Result<(), Error>
where
    T: Serialize,
{
    let key = key.to_key();
    if ttl == 0 {
        debug!("Not caching {key}: already expired");
        return Ok(());
    }

    let serialized = serde_json::to_string(value).map_err(|err| {
        Error::Execution(format!("Failed to serialize cache entry {key}: {err}"))
    })?;

    cache.store_value(&key, &serialized, ttl).await
}
