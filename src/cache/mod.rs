use async_trait::async_trait;
use std::any::Any;
use std::fmt::Debug;
mod config;
mod entry;
mod error;
pub mod memory;
pub mod redis;

pub use config::Config;
pub use entry::{capped_ttl, retrieve, store, CacheKey};
pub use error::Error;

/// Shared key/value store with per-entry TTL, backing JWKS, discovery and token caches.
#[async_trait]
pub trait Cache: Any + Debug + Send + Sync {
    /// Store a value with a given TTL in the cache
    ///
    /// # Arguments
    ///
    /// * `key` - The key to store the value under
    /// * `value` - The value to store
    /// * `expires_in` - The time in seconds until the value expires
    async fn store_value(&self, key: &str, value: &str, expires_in: u64) -> Result<(), Error>;

    /// Retrieve a value from the cache
    ///
    /// # Returns
    ///
    /// * `Ok(Some(String))` if the value was found in the cache
    /// * `Ok(None)` if the value was not found or has expired
    /// * `Err(Error)` if the value could not be retrieved
    async fn retrieve_value(&self, key: &str) -> Result<Option<String>, Error>;
}
