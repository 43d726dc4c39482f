use std::fmt;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::cache::{Cache, Error};

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BackendConfig {
    pub url: String,
    #[serde(default = "BackendConfig::default_key_prefix")]
    pub key_prefix: String,
}

impl BackendConfig {
    fn default_key_prefix() -> String {
        "edge-auth:".to_string()
    }
}

/// Redis store shared by every gateway instance pointing at the same server.
///
/// A single multiplexed connection is opened on first use and shared by all
/// requests; a failed attempt is retried by the next one.
pub struct Backend {
    client: redis::Client,
    connection: OnceCell<MultiplexedConnection>,
    key_prefix: String,
}

impl Backend {
    pub fn new(config: &BackendConfig) -> Result<Self, Error> {
        info!("Using Redis cache store with key prefix '{}'", config.key_prefix);
        let client = redis::Client::open(config.url.as_str())?;
        Ok(Backend {
            client,
            connection: OnceCell::new(),
            key_prefix: config.key_prefix.clone(),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, Error> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                debug!("Opening Redis connection");
                self.client.get_multiplexed_async_connection().await
            })
            .await?;
        Ok(connection.clone())
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Backend")
            .field("client", &self.client)
            .field("connected", &self.connection.initialized())
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

#[async_trait]
impl Cache for Backend {
    async fn store_value(&self, key: &str, value: &str, expires_in: u64) -> Result<(), Error> {
        let mut conn = self.connection().await?;
        Ok(conn.set_ex(self.key(key), value, expires_in).await?)
    }

    async fn retrieve_value(&self, key: &str) -> Result<Option<String>, Error> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(self.key(key)).await?;
        Ok(value)
    }
}
