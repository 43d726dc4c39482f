use std::collections::HashMap;

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;

use crate::proxy::auth::{basic_auth, oidc, public_share, signed_url};
use crate::proxy::challenge::{Scheme, SupportedSchemes};
use crate::proxy::path::{PathClassifier, DEFAULT_PUBLIC_PATHS};
use crate::proxy::Error;

pub const DEFAULT_LOCK_SCOPES: &[&str] = &["/ocs/v[12].php/cloud/", "^/remote.php/"];

#[derive(Clone, Debug, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enable_basic_auth: bool,
    #[serde(default)]
    pub oidc: Option<oidc::Config>,
    #[serde(default)]
    pub user_agent_lock: IndexMap<String, String>,
    #[serde(default)]
    pub fallback_challenge: Option<String>,
    #[serde(default = "AuthConfig::default_lock_scopes")]
    pub lock_scopes: Vec<String>,
    #[serde(default = "AuthConfig::default_public_paths")]
    pub public_paths: Vec<String>,
    #[serde(default)]
    pub identity: HashMap<String, basic_auth::Config>,
    #[serde(default)]
    pub oidc_clients: HashMap<String, basic_auth::Config>,
    #[serde(default)]
    pub signed_url: signed_url::Config,
    #[serde(default)]
    pub public_shares: HashMap<String, public_share::Config>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enable_basic_auth: false,
            oidc: None,
            user_agent_lock: IndexMap::new(),
            fallback_challenge: None,
            lock_scopes: Self::default_lock_scopes(),
            public_paths: Self::default_public_paths(),
            identity: HashMap::new(),
            oidc_clients: HashMap::new(),
            signed_url: signed_url::Config::default(),
            public_shares: HashMap::new(),
        }
    }
}

impl AuthConfig {
    fn default_lock_scopes() -> Vec<String> {
        DEFAULT_LOCK_SCOPES.iter().map(ToString::to_string).collect()
    }

    fn default_public_paths() -> Vec<String> {
        DEFAULT_PUBLIC_PATHS.iter().map(ToString::to_string).collect()
    }

    pub fn oidc_issuer(&self) -> &str {
        self.oidc
            .as_ref()
            .map_or("", |oidc| oidc.issuer.trim())
    }
}

/// Validated, immutable view of the `[auth]` section shared by every request.
#[derive(Debug)]
pub struct AuthenticatorConfig {
    pub supported_schemes: SupportedSchemes,
    pub oidc_issuer: String,
    pub enable_basic_auth: bool,
    pub user_agent_locks: IndexMap<String, Scheme>,
    pub fallback_challenge: Option<Scheme>,
    pub lock_scopes: Vec<Regex>,
    pub classifier: PathClassifier,
}

impl AuthenticatorConfig {
    pub fn new(config: &AuthConfig) -> Result<Self, Error> {
        let oidc_issuer = config.oidc_issuer().to_string();
        let bearer_enabled = !oidc_issuer.is_empty();

        let mut user_agent_locks = IndexMap::with_capacity(config.user_agent_lock.len());
        for (user_agent, scheme) in &config.user_agent_lock {
            if user_agent.is_empty() {
                let msg = "user agent lock keys must not be empty".to_string();
                return Err(Error::Configuration(msg));
            }

            let scheme = parse_scheme(scheme, bearer_enabled).map_err(|error| {
                let msg = format!("user agent lock for '{user_agent}': {error}");
                Error::Configuration(msg)
            })?;
            user_agent_locks.insert(user_agent.clone(), scheme);
        }

        let fallback_challenge = config
            .fallback_challenge
            .as_deref()
            .map(|scheme| parse_scheme(scheme, bearer_enabled))
            .transpose()
            .map_err(|error| Error::Configuration(format!("fallback challenge: {error}")))?;

        let lock_scopes = config
            .lock_scopes
            .iter()
            .map(|scope| {
                Regex::new(scope).map_err(|error| {
                    let msg = format!("invalid lock scope '{scope}': {error}");
                    Error::Configuration(msg)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            supported_schemes: SupportedSchemes::new(bearer_enabled, config.enable_basic_auth),
            oidc_issuer,
            enable_basic_auth: config.enable_basic_auth,
            user_agent_locks,
            fallback_challenge,
            lock_scopes,
            classifier: PathClassifier::new(config.public_paths.clone()),
        })
    }
}

fn parse_scheme(value: &str, bearer_enabled: bool) -> Result<Scheme, String> {
    let scheme = value.parse::<Scheme>()?;
    if scheme == Scheme::Bearer && !bearer_enabled {
        return Err("the bearer scheme requires an OIDC issuer".to_string());
    }

    Ok(scheme)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::path::PathClass;

    fn parse(config: &str) -> AuthConfig {
        toml::from_str(config).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        let config = AuthenticatorConfig::new(&config).unwrap();

        assert!(config.supported_schemes.as_slice().is_empty());
        assert!(config.user_agent_locks.is_empty());
        assert_eq!(config.fallback_challenge, None);
        assert_eq!(config.lock_scopes.len(), 2);
        assert_eq!(config.classifier.classify("/data"), PathClass::Public);
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
            enable_basic_auth = true
            fallback_challenge = "basic"
            lock_scopes = ["^/remote.php/"]

            [oidc]
            issuer = "https://idp.example.com"

            [user_agent_lock]
            "mirall" = "basic"
            "Mozilla" = "bearer"
            "#,
        );
        let config = AuthenticatorConfig::new(&config).unwrap();

        assert_eq!(
            config.supported_schemes.as_slice(),
            &[Scheme::Bearer, Scheme::Basic]
        );
        assert_eq!(config.oidc_issuer, "https://idp.example.com");
        assert_eq!(config.fallback_challenge, Some(Scheme::Basic));

        let locks: Vec<_> = config.user_agent_locks.iter().collect();
        assert_eq!(locks[0], (&"mirall".to_string(), &Scheme::Basic));
        assert_eq!(locks[1], (&"Mozilla".to_string(), &Scheme::Bearer));
    }

    #[test]
    fn test_blank_issuer_disables_bearer() {
        let config = parse(
            r#"
            enable_basic_auth = true

            [oidc]
            issuer = "   "
            "#,
        );
        let config = AuthenticatorConfig::new(&config).unwrap();

        assert_eq!(config.supported_schemes.as_slice(), &[Scheme::Basic]);
    }

    #[test]
    fn test_unknown_scheme_is_rejected() {
        let config = parse(
            r#"
            [user_agent_lock]
            "mirall" = "digest"
            "#,
        );

        let error = AuthenticatorConfig::new(&config).unwrap_err();
        assert!(matches!(error, Error::Configuration(msg) if msg.contains("digest")));
    }

    #[test]
    fn test_bearer_lock_without_issuer_is_rejected() {
        let config = parse(
            r#"
            enable_basic_auth = true

            [user_agent_lock]
            "Mozilla" = "bearer"
            "#,
        );

        let error = AuthenticatorConfig::new(&config).unwrap_err();
        assert!(matches!(error, Error::Configuration(msg) if msg.contains("OIDC issuer")));
    }

    #[test]
    fn test_bearer_fallback_without_issuer_is_rejected() {
        let config = parse(r#"fallback_challenge = "bearer""#);
        assert!(AuthenticatorConfig::new(&config).is_err());
    }

    #[test]
    fn test_empty_lock_key_is_rejected() {
        let config = parse(
            r#"
            [user_agent_lock]
            "" = "basic"
            "#,
        );
        assert!(AuthenticatorConfig::new(&config).is_err());
    }

    #[test]
    fn test_invalid_lock_scope_is_rejected() {
        let config = parse(r#"lock_scopes = ["/ocs/v[12.php"]"#);

        let error = AuthenticatorConfig::new(&config).unwrap_err();
        assert!(matches!(error, Error::Configuration(msg) if msg.contains("lock scope")));
    }
}
