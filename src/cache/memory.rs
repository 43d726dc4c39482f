use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::info;

use crate::cache::{Cache, Error};

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BackendConfig {
    #[serde(default = "BackendConfig::default_max_entries")]
    pub max_entries: usize,
}

impl BackendConfig {
    fn default_max_entries() -> usize {
        1024
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            max_entries: Self::default_max_entries(),
        }
    }
}

#[derive(Debug)]
pub struct Backend {
    store: Arc<RwLock<HashMap<String, (String, Instant)>>>,
    counter: Arc<AtomicUsize>,
    max_entries: usize,
}

impl Backend {
    pub fn new(config: &BackendConfig) -> Self {
        info!(
            "Using in-memory cache store (max {} entries)",
            config.max_entries
        );
        Backend {
            store: Arc::new(RwLock::new(HashMap::new())),
            counter: Arc::new(AtomicUsize::new(0)),
            max_entries: config.max_entries.max(1),
        }
    }

    async fn cleanup_expired(&self) {
        let mut store = self.store.write().await;
        let now = Instant::now();
        store.retain(|_, &mut (_, expiry)| expiry > now);
    }
}

// Evicts expired entries, then the entry closest to expiry until there is room.
fn make_room(store: &mut HashMap<String, (String, Instant)>, max_entries: usize) {
    let now = Instant::now();
    store.retain(|_, &mut (_, expiry)| expiry > now);

    while store.len() >= max_entries {
        let Some(key) = store
            .iter()
            .min_by_key(|(_, (_, expiry))| *expiry)
            .map(|(key, _)| key.clone())
        else {
            break;
        };
        store.remove(&key);
    }
}

#[async_trait]
impl Cache for Backend {
    async fn store_value(&self, key: &str, value: &str, expires_in: u64) -> Result<(), Error> {
        let count = self.counter.fetch_add(1, Ordering::Relaxed);

        if count.is_multiple_of(1000) {
            self.cleanup_expired().await;
        }

        let mut store = self.store.write().await;
        if !store.contains_key(key) && store.len() >= self.max_entries {
            make_room(&mut store, self.max_entries);
        }

        store.insert(
            key.to_string(),
            (
                value.to_string(),
                Instant::now() + Duration::from_secs(expires_in),
            ),
        );
        Ok(())
    }

    async fn retrieve_value(&self, key: &str) -> Result<Option<String>, Error> {
        let count = self.counter.fetch_add(1, Ordering::Relaxed);

        if count.is_multiple_of(1000) {
            self.cleanup_expired().await;
        }

        let store = self.store.read().await;
        if let Some((value, expiry)) = store.get(key) {
            if *expiry > Instant::now() {
                return Ok(Some(value.clone()));
            }
        }

        Ok(None)
    }
}
