mod debug;
mod error;
mod http_server;
mod listener;
mod server_context;
mod upstream;

use argh::FromArgs;

use crate::command::server::debug::DebugListener;
use crate::command::server::listener::InsecureListener;
use crate::configuration::Configuration;
use crate::{command, configuration};

pub use error::Error;
pub use server_context::ServerContext;
pub use upstream::UpstreamForwarder;

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "serve",
    description = "Run the authenticating gateway"
)]
pub struct Options {}

pub struct Command {
    listener: InsecureListener,
    debug_listener: Option<DebugListener>,
}

impl Command {
    pub fn new(config: &Configuration) -> Result<Command, configuration::Error> {
        let context = ServerContext::new(config)?;
        let listener = InsecureListener::new(&config.server, context);
        let debug_listener = config.server.debug_address.map(DebugListener::new);

        Ok(Command {
            listener,
            debug_listener,
        })
    }

    pub fn notify_config_change(&self, config: &Configuration) -> Result<(), configuration::Error> {
        let context = ServerContext::new(config)?;
        self.listener.notify_config_change(&config.server, context);
        Ok(())
    }

    pub async fn run(&self) -> Result<(), command::Error> {
        match &self.debug_listener {
            Some(debug_listener) => {
                tokio::try_join!(self.listener.serve(), debug_listener.serve())?;
            }
            None => self.listener.serve().await?,
        }

        Ok(())
    }
}
