pub mod auth;
mod chain;
mod challenge;
mod config;
mod error;
mod identity;
mod lock_in;
mod path;
pub mod request_ext;
mod response_body;
mod webdav;

pub use chain::{Authentication, AuthenticationChain, Handler};
pub use challenge::Scheme;
pub use config::{AuthConfig, AuthenticatorConfig};
pub use error::Error;
pub use identity::{AuthMethod, ClientIdentity};
pub use response_body::ResponseBody;
