
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::http::request::Parts;
use hyper::{Request, Response, StatusCode};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cache::Cache;
use crate::metrics_provider::{AUTH_ATTEMPTS, AUTH_REJECTIONS};
use crate::proxy::auth::{
    AuthResult, Authenticator, BasicAuthValidator, OidcValidator, PublicShareValidator,
    SignedUrlValidator,
};
use crate::proxy::challenge::{build_headers, Scheme};
use crate::proxy::config::{AuthConfig, AuthenticatorConfig};
use crate::proxy::lock_in::resolve_challenge;
use crate::proxy::path::PathClass;
use crate::proxy::request_ext::HeaderExt;
use crate::proxy::webdav::{plain_unauthorized, translate_failure};
use crate::proxy::{AuthMethod, ClientIdentity, Error, ResponseBody};

/// Status logged and returned when the client went away before a verdict was reached.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

pub enum Verdict<B> {
    /// Authenticated or bypassed; the identity, if any, is in the request extensions
    Forward(Request<B>),
    Reject(Response<ResponseBody>),
    Aborted,
}

enum Outcome {
    Authenticated(ClientIdentity),
    Exhausted,
    Aborted,
}

/// Ordered list of authenticators guarding the upstream.
pub struct AuthenticationChain {
    config: AuthenticatorConfig,
    authenticators: Vec<Arc<dyn Authenticator>>,
    client_authenticator: Option<Arc<dyn Authenticator>>,
}

impl AuthenticationChain {
    /// Authentication order: OIDC bearer → Basic → signed URL → public share
    pub fn new(config: &AuthConfig, cache: &Arc<dyn Cache>) -> Result<Self, Error> {
        let authenticator_config = AuthenticatorConfig::new(config)?;

        let mut authenticators: Vec<Arc<dyn Authenticator>> = Vec::new();
        let bearer_enabled = authenticator_config
            .supported_schemes
            .contains(Scheme::Bearer);
        if let Some(oidc) = config.oidc.as_ref().filter(|_| bearer_enabled) {
            authenticators.push(Arc::new(OidcValidator::new(oidc, cache.clone())?));
        }
        if config.enable_basic_auth {
            let validator = BasicAuthValidator::new(&config.identity, AuthMethod::Basic);
            authenticators.push(Arc::new(validator));
        }
        if !config.signed_url.keys.is_empty() {
            authenticators.push(Arc::new(SignedUrlValidator::new(&config.signed_url)));
        }
        if !config.public_shares.is_empty() {
            authenticators.push(Arc::new(PublicShareValidator::new(&config.public_shares)));
        }

        let client_authenticator = (!config.oidc_clients.is_empty()).then(|| {
            let validator =
                BasicAuthValidator::new(&config.oidc_clients, AuthMethod::ClientCredentials);
            Arc::new(validator) as Arc<dyn Authenticator>
        });

        info!(
            "Authentication chain: [{}], issuer: '{}', basic auth: {}, token endpoint client authentication: {}",
            authenticators
                .iter()
                .map(|authenticator| authenticator.name())
                .collect::<Vec<_>>()
                .join(", "),
            authenticator_config.oidc_issuer,
            authenticator_config.enable_basic_auth,
            client_authenticator.is_some()
        );

        Ok(Self::with_authenticators(
            authenticator_config,
            authenticators,
            client_authenticator,
        ))
    }

    pub fn with_authenticators(
        config: AuthenticatorConfig,
        authenticators: Vec<Arc<dyn Authenticator>>,
        client_authenticator: Option<Arc<dyn Authenticator>>,
    ) -> Self {
        Self {
            config,
            authenticators,
            client_authenticator,
        }
    }

    #[instrument(
        skip_all,
        fields(
            path = %request.uri().path(),
            path_class = tracing::field::Empty,
            auth_method = tracing::field::Empty
        )
    )]
    pub async fn evaluate<B>(&self, request: Request<B>) -> Verdict<B> {
        let (mut parts, body) = request.into_parts();

        let path_class = self.config.classifier.classify(parts.uri.path());
        tracing::Span::current().record("path_class", path_class.as_str());

        let outcome = match (path_class, &self.client_authenticator) {
            (PathClass::Bypass, _) | (PathClass::TokenEndpoint, None) => {
                debug!("Forwarding without authentication");
                return Verdict::Forward(Request::from_parts(parts, body));
            }
            (PathClass::TokenEndpoint, Some(client_authenticator)) => {
                self.run(std::slice::from_ref(client_authenticator), path_class, &parts)
                    .await
            }
            (PathClass::Public | PathClass::Normal, _) => {
                self.run(&self.authenticators, path_class, &parts).await
            }
        };

        match outcome {
            Outcome::Authenticated(mut identity) => {
                identity.client_ip = parts
                    .extensions
                    .get::<SocketAddr>()
                    .map(|address| address.ip().to_string());
                parts.extensions.insert(identity);
                Verdict::Forward(Request::from_parts(parts, body))
            }
            Outcome::Aborted => {
                debug!("Client went away during authentication");
                Verdict::Aborted
            }
            Outcome::Exhausted => {
                AUTH_REJECTIONS
                    .with_label_values(&[path_class.as_str()])
                    .inc();
                Verdict::Reject(self.reject(path_class, &parts))
            }
        }
    }

    async fn run(
        &self,
        authenticators: &[Arc<dyn Authenticator>],
        path_class: PathClass,
        parts: &Parts,
    ) -> Outcome {
        let cancellation = parts.extensions.get::<CancellationToken>();
        let is_cancelled = || cancellation.is_some_and(CancellationToken::is_cancelled);

        let applicable = authenticators
            .iter()
            .filter(|authenticator| authenticator.applies_to(path_class));
        for authenticator in applicable {
            if is_cancelled() {
                return Outcome::Aborted;
            }

            let name = authenticator.name();
            match authenticator.authenticate(parts).await {
                Ok(AuthResult::Authenticated(identity)) => {
                    debug!("{name} authentication succeeded");
                    AUTH_ATTEMPTS.with_label_values(&[name, "success"]).inc();
                    tracing::Span::current().record("auth_method", name);
                    return Outcome::Authenticated(identity);
                }
                Ok(AuthResult::NoCredentials) => {
                    AUTH_ATTEMPTS.with_label_values(&[name, "declined"]).inc();
                }
                Err(error) => {
                    warn!("{name} authentication failed: {error}");
                    AUTH_ATTEMPTS.with_label_values(&[name, "failed"]).inc();
                }
            }
        }

        if is_cancelled() {
            Outcome::Aborted
        } else {
            Outcome::Exhausted
        }
    }

    fn reject(&self, path_class: PathClass, parts: &Parts) -> Response<ResponseBody> {
        match path_class {
            PathClass::Public => plain_unauthorized(),
            PathClass::TokenEndpoint => self.invalid_client(parts),
            PathClass::Normal | PathClass::Bypass => {
                let lock_override =
                    resolve_challenge(&parts.request_uri(), &parts.user_agent(), &self.config);
                let challenges = build_headers(
                    &self.config.supported_schemes,
                    lock_override,
                    &parts.realm(),
                );

                let mut response = translate_failure(parts);
                challenges.apply(response.headers_mut());
                response
            }
        }
    }

    fn invalid_client(&self, parts: &Parts) -> Response<ResponseBody> {
        let body = json!({ "error": "invalid_client" }).to_string();

        let mut response = Response::new(ResponseBody::fixed(body.into_bytes()));
        *response.status_mut() = StatusCode::UNAUTHORIZED;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        build_headers(
            &self.config.supported_schemes,
            Some(Scheme::Basic),
            &parts.realm(),
        )
        .apply(response.headers_mut());

        response
    }
}

/// Downstream of the authentication middleware.
#[async_trait]
pub trait Handler<B>: Send + Sync
where
    B: Send + 'static,
{
    async fn handle(&self, request: Request<B>) -> Response<ResponseBody>;
}

/// Runs the authentication chain in front of `next`.
pub struct Authentication<H> {
    chain: AuthenticationChain,
    next: H,
}

impl<H> Authentication<H> {
    pub fn new(chain: AuthenticationChain, next: H) -> Self {
        Self { chain, next }
    }

    pub async fn call<B>(&self, request: Request<B>) -> Response<ResponseBody>
    where
        H: Handler<B>,
        B: Send + 'static,
    {
        match self.chain.evaluate(request).await {
            Verdict::Forward(request) => self.next.handle(request).await,
            Verdict::Reject(response) => response,
            Verdict::Aborted => {
                let mut response = Response::new(ResponseBody::empty());
                *response.status_mut() =
                    StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST);
                response
            }
        }
    }
}
