use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::command::server::error::Error;
use crate::command::server::http_server::serve_request;
use crate::command::server::ServerContext;
use crate::configuration::ServerConfig;

pub async fn build_listener(binding_address: SocketAddr) -> Result<TcpListener, Error> {
    match TcpListener::bind(binding_address).await {
        Ok(listener) => Ok(listener),
        Err(err) => {
            let msg = format!("Failed to bind to {binding_address}: {err}");
            Err(Error::Initialization(msg))
        }
    }
}

pub async fn accept(listener: &TcpListener) -> Result<(TcpStream, SocketAddr), Error> {
    match listener.accept().await {
        Ok((stream, remote_address)) => {
            debug!("Accepted connection from {remote_address}");
            Ok((stream, remote_address))
        }
        Err(err) => {
            let msg = format!("Failed to accept incoming connection: {err}");
            Err(Error::Execution(msg))
        }
    }
}

fn timeouts(server_config: &ServerConfig) -> [Duration; 2] {
    [
        Duration::from_secs(server_config.query_timeout),
        Duration::from_secs(server_config.query_timeout_grace_period),
    ]
}

/// Plain-HTTP gateway listener; TLS is terminated in front of it.
pub struct InsecureListener {
    binding_address: SocketAddr,
    context: Arc<ArcSwap<ServerContext>>,
    timeouts: ArcSwap<[Duration; 2]>,
}

impl InsecureListener {
    pub fn new(server_config: &ServerConfig, context: ServerContext) -> Self {
        let binding_address = SocketAddr::new(server_config.bind_address, server_config.port);

        Self {
            binding_address,
            context: Arc::new(ArcSwap::from_pointee(context)),
            timeouts: ArcSwap::from_pointee(timeouts(server_config)),
        }
    }

    /// Requests read from now on use the new context, including those on open
    /// connections. Timeouts only apply to connections accepted afterwards.
    pub fn notify_config_change(&self, server_config: &ServerConfig, context: ServerContext) {
        let binding_address = SocketAddr::new(server_config.bind_address, server_config.port);
        if binding_address != self.binding_address {
            info!(
                "Bind address change to {binding_address} requires a restart, still listening on {}",
                self.binding_address
            );
        }

        self.context.store(Arc::new(context));
        self.timeouts.store(Arc::new(timeouts(server_config)));
    }

    pub async fn serve(&self) -> Result<(), Error> {
        info!("Listening on {} (non-TLS)", self.binding_address);
        let listener = build_listener(self.binding_address).await?;

        loop {
            debug!("Waiting for incoming connection");
            let (tcp, remote_address) = accept(&listener).await?;

            let stream = TokioIo::new(tcp);
            let context = Arc::clone(&self.context);
            let timeouts = Arc::clone(&self.timeouts.load());

            tokio::spawn(Box::pin(serve_request(
                stream,
                context,
                timeouts,
                remote_address,
            )));
        }
    }
}
