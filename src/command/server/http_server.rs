use std::convert::Infallible;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use opentelemetry::trace::TraceContextExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::pin;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::command::server::ServerContext;
use crate::metrics_provider::METRICS_PROVIDER;
use crate::proxy::{Error, ResponseBody};

/// Serves one connection. Each request is handled with the context current when it
/// is read and carries a clone of the connection's `CancellationToken`, cancelled
/// once the connection is shut down or gone.
pub async fn serve_request<S>(
    stream: TokioIo<S>,
    context: Arc<ArcSwap<ServerContext>>,
    timeouts: Arc<[Duration; 2]>,
    remote_address: SocketAddr,
) where
    S: Unpin + AsyncWrite + AsyncRead + Send + Debug + 'static,
{
    let cancellation = CancellationToken::new();
    let _cancel_on_close = cancellation.clone().drop_guard();

    let request_cancellation = cancellation.clone();
    let conn = http1::Builder::new().serve_connection(
        stream,
        service_fn(move |mut request| {
            request.extensions_mut().insert(remote_address);
            request
                .extensions_mut()
                .insert(request_cancellation.clone());
            handle_request(context.load_full(), request)
        }),
    );
    pin!(conn);

    for (iter, sleep_duration) in timeouts.iter().enumerate() {
        debug!("iter = {iter} sleep_duration = {sleep_duration:?}");
        tokio::select! {
            res = conn.as_mut() => {
                match res {
                    Ok(()) => debug!("after polling conn, no error"),
                    Err(error) =>  debug!("error serving connection: {error}"),
                }
                break;
            }
            () = tokio::time::sleep(*sleep_duration) => {
                debug!("iter = {iter} got timeout_interval, calling conn.graceful_shutdown");
                cancellation.cancel();
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

pub fn current_trace_id() -> Option<String> {
    let context = Span::current().context();
    let span = context.span();
    let span_context = span.span_context();
    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

#[instrument(skip(context, request))]
async fn handle_request(
    context: Arc<ServerContext>,
    request: Request<Incoming>,
) -> Result<Response<ResponseBody>, Infallible> {
    let start_time = Instant::now();
    let method = request.method().to_owned();
    let path = request.uri().path().to_owned();
    let trace_id = current_trace_id();

    METRICS_PROVIDER.metric_http_request_in_flight.inc();
    let response = context.authentication.call(request).await;
    METRICS_PROVIDER.metric_http_request_in_flight.dec();

    #[allow(clippy::cast_precision_loss)]
    let elapsed = start_time.elapsed().as_millis() as f64;
    let status = response.status();

    METRICS_PROVIDER
        .metric_http_request_total
        .with_label_values(&[method.as_str(), status.as_str()])
        .inc();
    METRICS_PROVIDER
        .metric_http_request_duration
        .observe(elapsed);

    let log = if let Some(trace_id) = trace_id {
        format!("{trace_id} {elapsed:?} - {status} {method} {path}")
    } else {
        format!("{elapsed:?} - {status} {method} {path}")
    };

    if status.is_server_error() {
        error!("{log}");
    } else {
        info!("{log}");
    }

    Ok(response)
}

pub fn error_to_response(error: &Error, trace_id: Option<&String>) -> Response<ResponseBody> {
    let body = error.as_json(trace_id).to_string();

    let mut response = Response::new(ResponseBody::fixed(body.into_bytes()));
    *response.status_mut() = error.status_code();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
