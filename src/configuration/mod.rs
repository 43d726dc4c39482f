use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use hyper::Uri;
use serde::Deserialize;

mod error;
pub mod watcher;

use crate::cache;
use crate::proxy::{AuthConfig, AuthenticatorConfig};
pub use error::Error;

#[derive(Clone, Debug, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: cache::Config,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_bind_address")]
    pub bind_address: IpAddr,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    #[serde(default = "ServerConfig::default_query_timeout")]
    pub query_timeout: u64,
    #[serde(default = "ServerConfig::default_query_timeout_grace_period")]
    pub query_timeout_grace_period: u64,
    /// Serves `/healthz` and `/metrics` outside the authentication chain
    #[serde(default)]
    pub debug_address: Option<SocketAddr>,
}

impl ServerConfig {
    fn default_bind_address() -> IpAddr {
        IpAddr::from(Ipv4Addr::from([0; 4]))
    }

    fn default_port() -> u16 {
        8000
    }

    fn default_query_timeout() -> u64 {
        3600
    }

    fn default_query_timeout_grace_period() -> u64 {
        60
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: Self::default_bind_address(),
            port: Self::default_port(),
            query_timeout: Self::default_query_timeout(),
            query_timeout_grace_period: Self::default_query_timeout_grace_period(),
            debug_address: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpstreamConfig {
    pub url: String,
}

impl UpstreamConfig {
    pub fn base_uri(&self) -> Result<Uri, Error> {
        let uri = self.url.parse::<Uri>().map_err(|error| {
            Error::InvalidSetting(format!("upstream url '{}': {error}", self.url))
        })?;

        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(Error::InvalidSetting(format!(
                "upstream url '{}' must be absolute",
                self.url
            )));
        }

        Ok(uri)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub tracing: Option<TracingConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TracingConfig {
    pub endpoint: String,
    pub sampling_rate: f64,
}

impl Configuration {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config_str = fs::read_to_string(path)?;
        Self::load_from_str(&config_str)
    }

    pub fn load_from_str(slice: &str) -> Result<Self, Error> {
        let config: Configuration = toml::from_str(slice).map_err(|e| {
            println!("Configuration file format error:");
            println!("{e}");
            Error::ConfigurationFileFormat(e.to_string())
        })?;

        config.upstream.base_uri()?;
        AuthenticatorConfig::new(&config.auth)?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::proxy::Scheme;

    #[test]
    fn test_load_minimal_config() {
        let config = r#"
        [upstream]
        url = "http://127.0.0.1:9200"
        "#;

        let config = Configuration::load_from_str(config).unwrap();

        assert_eq!(config.server.bind_address.to_string(), "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.query_timeout, 3600);
        assert_eq!(config.server.query_timeout_grace_period, 60);
        assert!(config.server.debug_address.is_none());
        assert_eq!(config.cache, cache::Config::default());

        assert!(!config.auth.enable_basic_auth);
        assert!(config.auth.oidc.is_none());
        assert!(config.auth.user_agent_lock.is_empty());
        assert_eq!(config.auth.lock_scopes.len(), 2);
        assert!(config.observability.is_none());
    }

    #[test]
    fn test_load_full_auth_section() {
        let config = r#"
        [server]
        bind_address = "127.0.0.1"
        port = 9100
        debug_address = "127.0.0.1:9205"

        [upstream]
        url = "http://proxy.internal:9200"

        [cache.redis]
        url = "redis://localhost:6379"

        [auth]
        enable_basic_auth = true
        fallback_challenge = "basic"

        [auth.oidc]
        issuer = "https://idp.example.com"

        [auth.user_agent_lock]
        mirall = "basic"
        "Mozilla/5.0" = "bearer"
        "#;

        let config = Configuration::load_from_str(config).unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(
            config.server.debug_address,
            Some("127.0.0.1:9205".parse().unwrap())
        );
        assert!(matches!(config.cache, cache::Config::Redis(_)));
        assert_eq!(config.auth.oidc_issuer(), "https://idp.example.com");

        let keys = config.auth.user_agent_lock.keys().collect::<Vec<_>>();
        assert_eq!(keys, vec!["mirall", "Mozilla/5.0"]);

        let authenticator_config = AuthenticatorConfig::new(&config.auth).unwrap();
        assert_eq!(authenticator_config.fallback_challenge, Some(Scheme::Basic));
    }

    #[test]
    fn test_missing_upstream_is_rejected() {
        let config = r#"
        [server]
        port = 9100
        "#;

        let result = Configuration::load_from_str(config);
        assert!(matches!(result, Err(Error::ConfigurationFileFormat(_))));
    }

    #[test]
    fn test_relative_upstream_is_rejected() {
        let config = r#"
        [upstream]
        url = "/just/a/path"
        "#;

        let result = Configuration::load_from_str(config);
        assert!(matches!(result, Err(Error::InvalidSetting(_))));
    }

    #[test]
    fn test_unknown_lock_scheme_is_rejected() {
        let config = r#"
        [upstream]
        url = "http://127.0.0.1:9200"

        [auth.user_agent_lock]
        mirall = "digest"
        "#;

        let result = Configuration::load_from_str(config);
        assert!(matches!(result, Err(Error::InvalidSetting(_))));
    }

    #[test]
    fn test_bearer_lock_without_issuer_is_rejected() {
        let config = r#"
        [upstream]
        url = "http://127.0.0.1:9200"

        [auth]
        enable_basic_auth = true

        [auth.user_agent_lock]
        mirall = "bearer"
        "#;

        let result = Configuration::load_from_str(config);
        assert!(matches!(result, Err(Error::InvalidSetting(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[upstream]\nurl = \"http://127.0.0.1:9200\"").unwrap();

        let config = Configuration::load(file.path()).unwrap();
        assert_eq!(config.upstream.url, "http://127.0.0.1:9200");
    }

    #[test]
    fn test_load_shipped_config() {
        let config = Configuration::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml"))
            .unwrap();

        assert_eq!(config.server.port, 9200);
        assert!(config.auth.enable_basic_auth);
        assert_eq!(config.auth.identity.len(), 1);
        assert_eq!(config.auth.oidc_clients.len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Configuration::load("/nonexistent/edge-auth.toml");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
