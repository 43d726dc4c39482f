use std::fmt;
use std::str::FromStr;

use hyper::header::{HeaderValue, WWW_AUTHENTICATE};
use hyper::HeaderMap;
use serde::Deserialize;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Bearer,
    Basic,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Bearer => "bearer",
            Scheme::Basic => "basic",
        }
    }

    /// Name as it appears in a `WWW-Authenticate` challenge.
    pub fn display_name(self) -> &'static str {
        match self {
            Scheme::Bearer => "Bearer",
            Scheme::Basic => "Basic",
        }
    }

    /// The realm is written as an RFC 9110 quoted string.
    pub fn challenge(self, realm: &str) -> String {
        let realm = realm.replace('\\', "\\\\").replace('"', "\\\"");
        format!(
            "{} realm=\"{realm}\", charset=\"UTF-8\"",
            self.display_name()
        )
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "bearer" => Ok(Scheme::Bearer),
            "basic" => Ok(Scheme::Basic),
            _ => Err(format!("unknown authentication scheme '{value}'")),
        }
    }
}

/// Schemes advertised when no lock-in applies, in advertisement order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SupportedSchemes(Vec<Scheme>);

impl SupportedSchemes {
    pub fn new(bearer_enabled: bool, basic_enabled: bool) -> Self {
        let mut schemes = Vec::with_capacity(2);
        if bearer_enabled {
            schemes.push(Scheme::Bearer);
        }
        if basic_enabled {
            schemes.push(Scheme::Basic);
        }

        Self(schemes)
    }

    pub fn contains(&self, scheme: Scheme) -> bool {
        self.0.contains(&scheme)
    }

    pub fn as_slice(&self) -> &[Scheme] {
        &self.0
    }
}

/// `WWW-Authenticate` values to attach to a rejection, in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChallengeDecision {
    challenges: Vec<String>,
}

impl ChallengeDecision {
    pub fn challenges(&self) -> &[String] {
        &self.challenges
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }

    /// Replaces any `WWW-Authenticate` value already present in `headers`.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.remove(WWW_AUTHENTICATE);

        for challenge in &self.challenges {
            match HeaderValue::from_str(challenge) {
                Ok(value) => {
                    headers.append(WWW_AUTHENTICATE, value);
                }
                Err(error) => warn!("Dropping invalid challenge '{challenge}': {error}"),
            }
        }
    }
}

/// Builds the challenges for a rejected request.
///
/// A lock-in override yields exactly one challenge, whether or not the scheme is
/// otherwise supported. Without it, one challenge is emitted per supported scheme.
pub fn build_headers(
    supported: &SupportedSchemes,
    lock_override: Option<Scheme>,
    realm: &str,
) -> ChallengeDecision {
    let challenges = match lock_override {
        Some(scheme) => vec![scheme.challenge(realm)],
        None => supported
            .as_slice()
            .iter()
            .map(|scheme| scheme.challenge(realm))
            .collect(),
    };

    ChallengeDecision { challenges }
}
