pub mod jwk;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hyper::http::request::Parts;
use jsonwebtoken::{decode, decode_header, Validation};
pub use jwk::{Jwk, Jwks};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::cache::{self, Cache, CacheKey};
use crate::proxy::auth::{AuthResult, Authenticator};
use crate::proxy::request_ext::HeaderExt;
use crate::proxy::{AuthMethod, ClientIdentity, Error};

pub type Claims = HashMap<String, serde_json::Value>;

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VerifyMethod {
    /// Verify the access token signature against the issuer's JWKS
    #[default]
    Jwt,
    /// Opaque access tokens, resolved through the userinfo endpoint
    None,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub issuer: String,
    #[serde(default)]
    pub jwks_uri: Option<String>,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub access_token_verify_method: VerifyMethod,
    #[serde(default)]
    pub required_audience: Option<String>,
    #[serde(default = "Config::default_clock_skew_tolerance")]
    pub clock_skew_tolerance: u64,
    #[serde(default = "Config::default_jwks_refresh_interval")]
    pub jwks_refresh_interval: u64,
    #[serde(default = "Config::default_token_cache_ttl")]
    pub token_cache_ttl: u64,
}

impl Config {
    fn default_clock_skew_tolerance() -> u64 {
        60
    }

    fn default_jwks_refresh_interval() -> u64 {
        3600
    }

    fn default_token_cache_ttl() -> u64 {
        10
    }

    fn issuer(&self) -> &str {
        self.issuer.trim().trim_end_matches('/')
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct OpenIdConfiguration {
    issuer: String,
    jwks_uri: String,
    #[serde(default)]
    userinfo_endpoint: Option<String>,
}

/// Validates `Authorization: Bearer` access tokens issued by the configured provider.
pub struct OidcValidator {
    config: Config,
    client: Client,
    cache: Arc<dyn Cache>,
}

impl OidcValidator {
    pub fn new(config: &Config, cache: Arc<dyn Cache>) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| Error::Initialization(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            config: config.clone(),
            client,
            cache,
        })
    }

    /// Resolves the claims of an access token, using the short-lived token cache first.
    pub async fn validate_token(&self, token: &str) -> Result<Claims, Error> {
        let token_cache_key = CacheKey::AccessToken(token);
        if let Ok(Some(claims)) = cache::retrieve::<Claims>(&*self.cache, token_cache_key).await {
            debug!("Using cached claims for access token");
            return Ok(claims);
        }

        let claims = match self.config.access_token_verify_method {
            VerifyMethod::Jwt => self.verify_jwt(token).await?,
            VerifyMethod::None => self.fetch_userinfo(token).await?,
        };

        let expires_at = claims.get("exp").and_then(serde_json::Value::as_i64);
        let ttl = cache::capped_ttl(self.config.token_cache_ttl, expires_at);
        if let Err(err) = cache::store(&*self.cache, token_cache_key, &claims, ttl).await {
            warn!("Failed to cache access token claims: {err}");
        }

        Ok(claims)
    }

    #[instrument(skip_all)]
    async fn verify_jwt(&self, token: &str) -> Result<Claims, Error> {
        let header = decode_header(token)
            .map_err(|e| Error::Unauthorized(format!("Failed to decode JWT header: {e}")))?;

        debug!("JWT header: alg={:?}, kid={:?}", header.alg, header.kid);

        let jwks = self.fetch_jwks().await?;
        let jwk = jwks.find(header.kid.as_deref()).ok_or_else(|| {
            Error::Unauthorized(format!("No matching key found for kid: {:?}", header.kid))
        })?;

        let decoding_key = jwk.to_decoding_key()?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.config.issuer()]);
        if let Some(aud) = &self.config.required_audience {
            validation.set_audience(&[aud]);
        } else {
            validation.validate_aud = false;
        }
        validation.leeway = self.config.clock_skew_tolerance;
        validation.validate_exp = true;
        validation.validate_nbf = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            debug!("JWT decode failed with error: {e:?}");
            Error::Unauthorized(format!("JWT validation failed: {e}"))
        })?;

        Ok(token_data.claims)
    }

    async fn fetch_jwks(&self) -> Result<Jwks, Error> {
        let jwks_cache_key = CacheKey::Jwks(self.config.issuer());
        if let Ok(Some(jwks)) = cache::retrieve::<Jwks>(&*self.cache, jwks_cache_key).await {
            debug!("Using cached JWKS");
            return Ok(jwks);
        }

        let jwks_uri = match &self.config.jwks_uri {
            Some(uri) => uri.clone(),
            None => self.fetch_oidc_configuration().await?.jwks_uri,
        };

        let response = self
            .client
            .get(&jwks_uri)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::Internal(format!("Failed to fetch JWKS: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Internal(format!(
                "Failed to fetch JWKS: HTTP {}",
                response.status()
            )));
        }

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("Failed to parse JWKS: {e}")))?;

        let _ = cache::store(
            &*self.cache,
            jwks_cache_key,
            &jwks,
            self.config.jwks_refresh_interval,
        )
        .await;

        info!("Fetched and cached JWKS from {jwks_uri}");
        Ok(jwks)
    }

    async fn fetch_oidc_configuration(&self) -> Result<OpenIdConfiguration, Error> {
        let config_cache_key = CacheKey::Discovery(self.config.issuer());
        if let Ok(Some(config)) =
            cache::retrieve::<OpenIdConfiguration>(&*self.cache, config_cache_key).await
        {
            debug!("Using cached OIDC configuration");
            return Ok(config);
        }

        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            self.config.issuer()
        );

        let response = self
            .client
            .get(&discovery_url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::Internal(format!("Failed to fetch OIDC configuration: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Internal(format!(
                "Failed to fetch OIDC configuration: HTTP {}",
                response.status()
            )));
        }

        let config: OpenIdConfiguration = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("Failed to parse OIDC configuration: {e}")))?;

        if config.issuer.trim_end_matches('/') != self.config.issuer() {
            return Err(Error::Internal(format!(
                "OIDC configuration issuer mismatch: expected {}, got {}",
                self.config.issuer(),
                config.issuer
            )));
        }

        let _ = cache::store(
            &*self.cache,
            config_cache_key,
            &config,
            self.config.jwks_refresh_interval,
        )
        .await;

        Ok(config)
    }

    #[instrument(skip_all)]
    async fn fetch_userinfo(&self, token: &str) -> Result<Claims, Error> {
        let endpoint = match &self.config.userinfo_endpoint {
            Some(endpoint) => endpoint.clone(),
            None => self
                .fetch_oidc_configuration()
                .await?
                .userinfo_endpoint
                .ok_or_else(|| {
                    Error::Internal("OIDC provider has no userinfo endpoint".to_string())
                })?,
        };

        let response = self
            .client
            .get(&endpoint)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::Internal(format!("Failed to fetch userinfo: {e}")))?;

        match response.status() {
            status if status.is_success() => response
                .json()
                .await
                .map_err(|e| Error::Internal(format!("Failed to parse userinfo: {e}"))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Unauthorized(
                "Access token rejected by userinfo endpoint".to_string(),
            )),
            status => Err(Error::Internal(format!(
                "Failed to fetch userinfo: HTTP {status}"
            ))),
        }
    }
}

#[async_trait]
impl Authenticator for OidcValidator {
    fn name(&self) -> &'static str {
        AuthMethod::Bearer.as_str()
    }

    async fn authenticate(&self, parts: &Parts) -> Result<AuthResult, Error> {
        let Some(token) = parts.bearer_token() else {
            return Ok(AuthResult::NoCredentials);
        };

        let claims = match self.validate_token(&token).await {
            Ok(claims) => claims,
            Err(Error::Unauthorized(reason)) => {
                debug!("Access token rejected: {reason}");
                return Ok(AuthResult::NoCredentials);
            }
            Err(error) => return Err(error),
        };

        let Some(subject) = claims.get("sub").and_then(serde_json::Value::as_str) else {
            warn!("Access token has no subject claim");
            return Ok(AuthResult::NoCredentials);
        };

        let mut identity = ClientIdentity::new(subject, AuthMethod::Bearer);
        if let Some(username) = claims
            .get("preferred_username")
            .and_then(serde_json::Value::as_str)
        {
            identity = identity.with_username(username);
        }

        Ok(AuthResult::Authenticated(identity.with_claims(claims)))
    }
}

#[cfg(test)]
mod tests;
