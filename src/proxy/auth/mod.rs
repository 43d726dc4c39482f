pub mod basic_auth;
pub mod oidc;
pub mod public_share;
pub mod signed_url;

use async_trait::async_trait;
use hyper::http::request::Parts;

use crate::proxy::path::PathClass;
use crate::proxy::{ClientIdentity, Error};
pub use basic_auth::BasicAuthValidator;
pub use oidc::OidcValidator;
pub use public_share::PublicShareValidator;
pub use signed_url::SignedUrlValidator;

/// Result of authentication attempt
#[derive(Debug)]
pub enum AuthResult {
    /// Authentication succeeded
    Authenticated(ClientIdentity),
    /// No credentials this authenticator accepts were found, or they did not verify
    NoCredentials,
}

/// A credential scheme the authentication chain can try.
///
/// Implementations only inspect the request head and never consume the body.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Label used in logs and metrics
    fn name(&self) -> &'static str;

    /// Whether the chain consults this authenticator for requests of `path_class`
    fn applies_to(&self, _path_class: PathClass) -> bool {
        true
    }

    /// Returns:
    /// - `Ok(AuthResult::Authenticated)` with the resolved identity
    /// - `Ok(AuthResult::NoCredentials)` if the request does not authenticate with this scheme
    /// - `Err(Error)` if a backend the authenticator depends on failed
    async fn authenticate(&self, parts: &Parts) -> Result<AuthResult, Error>;
}
