use crate::command::server::UpstreamForwarder;
use crate::configuration::{self, Configuration};
use crate::proxy::{Authentication, AuthenticationChain};

/// Everything a connection needs, rebuilt as a whole on configuration reload.
pub struct ServerContext {
    pub authentication: Authentication<UpstreamForwarder>,
}

impl ServerContext {
    pub fn new(config: &Configuration) -> Result<Self, configuration::Error> {
        let cache = config.cache.to_backend()?;
        let chain = AuthenticationChain::new(&config.auth, &cache)?;
        let upstream = UpstreamForwarder::new(config.upstream.base_uri()?);

        Ok(Self {
            authentication: Authentication::new(chain, upstream),
        })
    }
}
