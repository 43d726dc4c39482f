use std::sync::Arc;

use serde::Deserialize;

use crate::cache;
use crate::cache::{Cache, Error};

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub enum Config {
    #[serde(rename = "memory")]
    Memory(cache::memory::BackendConfig),
    #[serde(rename = "redis")]
    Redis(cache::redis::BackendConfig),
}

impl Default for Config {
    fn default() -> Self {
        Config::Memory(cache::memory::BackendConfig::default())
    }
}

impl Config {
    pub fn to_backend(&self) -> Result<Arc<dyn Cache>, Error> {
        match self {
            Config::Redis(config) => Ok(Arc::new(cache::redis::Backend::new(config)?)),
            Config::Memory(config) => Ok(Arc::new(cache::memory::Backend::new(config))),
        }
    }
}
