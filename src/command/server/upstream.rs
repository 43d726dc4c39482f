use std::error::Error as StdError;

use async_trait::async_trait;
use hyper::body::{Body, Incoming};
use hyper::http::uri::PathAndQuery;
use hyper::{Request, Response, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{instrument, warn};

use crate::command::server::http_server::{current_trace_id, error_to_response};
use crate::proxy::{Error, Handler, ResponseBody};

/// Relays authenticated requests to the `[upstream]` service, keeping
/// method, path, query, headers and body.
pub struct UpstreamForwarder<B = Incoming> {
    base: Uri,
    client: Client<HttpConnector, B>,
}

impl<B> UpstreamForwarder<B>
where
    B: Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    pub fn new(base: Uri) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { base, client }
    }

    fn target_uri(&self, uri: &Uri) -> Result<Uri, Error> {
        let base_path = self.base.path().trim_end_matches('/');
        let path_and_query = uri.path_and_query().map_or("/", PathAndQuery::as_str);

        let mut parts = self.base.clone().into_parts();
        parts.path_and_query = Some(
            format!("{base_path}{path_and_query}")
                .parse()
                .map_err(|error| Error::Internal(format!("Invalid upstream path: {error}")))?,
        );

        Uri::from_parts(parts)
            .map_err(|error| Error::Internal(format!("Invalid upstream URI: {error}")))
    }

    #[instrument(skip(self, request), fields(uri = %request.uri()))]
    async fn forward(&self, mut request: Request<B>) -> Result<Response<ResponseBody>, Error> {
        *request.uri_mut() = self.target_uri(request.uri())?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|error| Error::Upstream(format!("Unable to reach upstream: {error}")))?;

        Ok(response.map(ResponseBody::from))
    }
}

#[async_trait]
impl<B> Handler<B> for UpstreamForwarder<B>
where
    B: Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    async fn handle(&self, request: Request<B>) -> Response<ResponseBody> {
        match self.forward(request).await {
            Ok(response) => response,
            Err(error) => {
                warn!("{error}");
                error_to_response(&error, current_trace_id().as_ref())
            }
        }
    }
}
