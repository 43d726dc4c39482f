/// Token endpoint of the bundled identity provider.
pub const TOKEN_ENDPOINT: &str = "/konnect/v1/token";

// Identity provider and web UI assets, served without credentials.
const BYPASS_PATHS: &[&str] = &[
    "/",
    "/login",
    "/config.json",
    "/oidc-callback.html",
    "/oidc-callback",
    "/settings.js",
];

const BYPASS_PREFIXES: &[&str] = &["/.well-known", "/js", "/themes", "/signin", "/konnect"];

pub const DEFAULT_PUBLIC_PATHS: &[&str] = &[
    "/dav/public-files/",
    "/remote.php/dav/public-files/",
    "/remote.php/ocs/apps/files_sharing/api/v1/tokeninfo/unprotected",
    "/ocs/v1.php/cloud/capabilities",
    "/data",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathClass {
    /// Forwarded without evaluating any authenticator.
    Bypass,
    /// Authenticators run, but a failure produces a plain 401 without challenges.
    Public,
    /// Client authentication of the identity provider's token endpoint.
    TokenEndpoint,
    Normal,
}

impl PathClass {
    pub fn as_str(self) -> &'static str {
        match self {
            PathClass::Bypass => "bypass",
            PathClass::Public => "public",
            PathClass::TokenEndpoint => "token-endpoint",
            PathClass::Normal => "normal",
        }
    }
}

#[derive(Clone, Debug)]
pub struct PathClassifier {
    public_paths: Vec<String>,
}

impl Default for PathClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLIC_PATHS.iter().map(ToString::to_string).collect())
    }
}

impl PathClassifier {
    pub fn new(public_paths: Vec<String>) -> Self {
        Self { public_paths }
    }

    /// Classifies a request path. The path must not carry the query string.
    pub fn classify(&self, path: &str) -> PathClass {
        if path == TOKEN_ENDPOINT {
            PathClass::TokenEndpoint
        } else if is_bypass_path(path) {
            PathClass::Bypass
        } else if self.is_public_path(path) {
            PathClass::Public
        } else {
            PathClass::Normal
        }
    }

    fn is_public_path(&self, path: &str) -> bool {
        self.public_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

fn is_bypass_path(path: &str) -> bool {
    BYPASS_PATHS.contains(&path) || BYPASS_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}
