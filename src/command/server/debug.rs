use std::convert::Infallible;
use std::net::SocketAddr;

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tracing::{debug, info};

use crate::command::server::error::Error;
use crate::command::server::http_server::error_to_response;
use crate::command::server::listener::{accept, build_listener};
use crate::metrics_provider::METRICS_PROVIDER;
use crate::proxy::ResponseBody;

/// Health and metrics endpoints, kept off the authenticated listener.
pub struct DebugListener {
    binding_address: SocketAddr,
}

impl DebugListener {
    pub fn new(binding_address: SocketAddr) -> Self {
        Self { binding_address }
    }

    pub async fn serve(&self) -> Result<(), Error> {
        info!("Debug endpoints listening on {}", self.binding_address);
        let listener = build_listener(self.binding_address).await?;

        loop {
            let (tcp, _) = accept(&listener).await?;
            let stream = TokioIo::new(tcp);

            tokio::spawn(async move {
                let service = service_fn(|request| async move { Ok::<_, Infallible>(route(&request)) });
                if let Err(error) = http1::Builder::new().serve_connection(stream, service).await {
                    debug!("error serving debug connection: {error}");
                }
            });
        }
    }
}

fn route<B>(request: &Request<B>) -> Response<ResponseBody> {
    match (request.method(), request.uri().path()) {
        (&Method::GET, "/healthz") => handle_healthz(),
        (&Method::GET, "/metrics") => handle_metrics(),
        _ => {
            let mut response = Response::new(ResponseBody::empty());
            *response.status_mut() = StatusCode::NOT_FOUND;
            response
        }
    }
}

fn handle_healthz() -> Response<ResponseBody> {
    let mut response = Response::new(ResponseBody::fixed(b"ok".to_vec()));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

fn handle_metrics() -> Response<ResponseBody> {
    let (content_type, metrics) = match METRICS_PROVIDER.gather() {
        Ok(gathered) => gathered,
        Err(error) => return error_to_response(&error, None),
    };

    let mut response = Response::new(ResponseBody::fixed(metrics));
    if let Ok(content_type) = HeaderValue::from_str(&content_type) {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    response
}
