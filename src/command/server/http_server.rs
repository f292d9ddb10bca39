use std::convert::Infallible;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use opentelemetry::trace::TraceContextExt;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::pin;
use tracing::{debug, error, info, instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::authentication::certificate::PeerCertificate;
use crate::authentication::{ConnectionInfo, Ticket};
use crate::command::server::error::Error;
use crate::command::server::response_body::ResponseBody;
use crate::command::server::ServerContext;
use crate::metrics_provider::METRICS_PROVIDER;

pub async fn serve_request<S>(
    stream: TokioIo<S>,
    context: Arc<ServerContext>,
    connection: ConnectionInfo,
    peer_certificate: Option<Vec<u8>>,
    timeouts: Arc<[Duration; 2]>,
) where
    S: Unpin + AsyncWrite + AsyncRead + Send + Debug + 'static,
{
    let peer_certificate = peer_certificate.map(|der| PeerCertificate(Arc::new(der)));

    let conn = http1::Builder::new().serve_connection(
        stream,
        service_fn(move |mut request| {
            if let Some(peer_certificate) = &peer_certificate {
                request.extensions_mut().insert(peer_certificate.clone());
            }
            request.extensions_mut().insert(connection);
            handle_request(Arc::clone(&context), request)
        }),
    );
    pin!(conn);

    METRICS_PROVIDER.metric_http_request_in_flight.inc();

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
                conn.as_mut().graceful_shutdown();
            }
        }
    }

    METRICS_PROVIDER.metric_http_request_in_flight.dec();
}

#[instrument(skip(context, request))]
async fn handle_request<B>(
    context: Arc<ServerContext>,
    request: Request<B>,
) -> Result<Response<ResponseBody>, Infallible> {
    let start_time = Instant::now();
    let method = request.method().to_owned();
    let path = request.uri().path().to_owned();

    let trace_id = {
        let context = Span::current().context();
        let span = context.span();
        let span_context = span.span_context();
        if span_context.is_valid() {
            Some(span_context.trace_id().to_string())
        } else {
            None
        }
    };

    let response = match router(&context, request).await {
        Ok(response) => response,
        Err(error) => error_to_response(&error, trace_id.as_ref()),
    };

    #[allow(clippy::cast_precision_loss)]
    let elapsed = start_time.elapsed().as_millis() as f64;
    let status = response.status();

    METRICS_PROVIDER
        .metric_http_request_total
        .with_label_values(&[method.as_str(), status.as_str()])
        .inc();
    METRICS_PROVIDER
        .metric_http_request_duration
        .with_label_values(&[method.as_str()])
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

async fn router<B>(
    context: &ServerContext,
    request: Request<B>,
) -> Result<Response<ResponseBody>, Error> {
    let (mut parts, _body) = request.into_parts();

    match (&parts.method, parts.uri.path()) {
        (&Method::GET, "/health") => return Ok(handle_health()),
        (&Method::GET, "/metrics") => return handle_metrics(),
        _ => {}
    }

    let Some(ticket) = context.authenticate(&mut parts).await? else {
        return context.challenge(&parts);
    };

    match (&parts.method, parts.uri.path()) {
        (&Method::GET, "/") => Ok(handle_principal(&ticket)),
        _ => Err(Error::NotFound(format!(
            "unknown route: {} {}",
            parts.method, parts.uri
        ))),
    }
}

fn json_response(status: StatusCode, value: &serde_json::Value) -> Response<ResponseBody> {
    let mut response = Response::new(ResponseBody::json(value));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn handle_health() -> Response<ResponseBody> {
    json_response(StatusCode::OK, &json!({ "status": "ok" }))
}

fn handle_metrics() -> Result<Response<ResponseBody>, Error> {
    let (content_type, metrics) = METRICS_PROVIDER.gather()?;
    let content_type = HeaderValue::from_str(&content_type)
        .map_err(|error| Error::Internal(format!("Invalid metrics content type: {error}")))?;

    let mut response = Response::new(ResponseBody::fixed(metrics));
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    Ok(response)
}

fn handle_principal(ticket: &Ticket) -> Response<ResponseBody> {
    let principal = &ticket.principal;
    let body = json!({
        "scheme": ticket.scheme,
        "authentication_type": principal.authentication_type,
        "name": principal.name(),
        "claims": principal.claims,
    });

    json_response(StatusCode::OK, &body)
}

pub fn error_to_response(error: &Error, request_id: Option<&String>) -> Response<ResponseBody> {
    json_response(error.status_code(), &error.as_json(request_id))
}
