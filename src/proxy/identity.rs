use std::collections::HashMap;

use serde::Serialize;

/// The credential scheme an identity was established with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    Bearer,
    Basic,
    SignedUrl,
    PublicShare,
    ClientCredentials,
}

impl AuthMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMethod::Bearer => "bearer",
            AuthMethod::Basic => "basic",
            AuthMethod::SignedUrl => "signed-url",
            AuthMethod::PublicShare => "public-share",
            AuthMethod::ClientCredentials => "client-credentials",
        }
    }
}

/// Identity resolved by the authentication chain.
///
/// Inserted into the request extensions before the request is handed to the
/// downstream handler; it never leaves the process.
#[derive(Clone, Debug, Serialize)]
pub struct ClientIdentity {
    pub id: String,
    pub username: Option<String>,
    pub method: AuthMethod,
    pub claims: HashMap<String, serde_json::Value>,
    pub client_ip: Option<String>,
}

impl ClientIdentity {
    pub fn new(id: impl Into<String>, method: AuthMethod) -> Self {
        Self {
            id: id.into(),
            username: None,
            method,
            claims: HashMap::new(),
            client_ip: None,
        }
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn with_claims(mut self, claims: HashMap<String, serde_json::Value>) -> Self {
        self.claims = claims;
        self
    }
}
