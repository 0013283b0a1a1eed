//! Inbound side: the HTTP listener.
//!
//! For `PUT /{service}/{method}` with a serialized argument array, the
//! listener resolves the service in the registry, invokes the method and
//! writes back the serialized result, or the serialized error.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use corelib::serialization::{check_depth, deserialize_args, serialize};
use corelib::{Error, Routes, Status, Value};

/// Largest request body accepted (1 MiB).
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Resolves and invokes inbound calls against the local registry.
pub struct Dispatcher {
    routes: Arc<Routes>,
    status: Arc<Status>,
}

impl Dispatcher {
    pub fn new(routes: Arc<Routes>, status: Arc<Status>) -> Self {
        Self { routes, status }
    }

    /// Handles one HTTP request; failures become error bodies, never faults.
    pub async fn handle(&self, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
        metrics::counter!("node_requests_total").increment(1);
        let (status, value) = match self.process(req).await {
            Ok(value) => (StatusCode::OK, value),
            Err((status, err)) => {
                metrics::counter!("node_request_failures_total", "kind" => err.kind())
                    .increment(1);
                debug!(error = %err, %status, "call failed");
                (status, err.to_value())
            }
        };
        Ok(reply(status, &value))
    }

    async fn process(&self, req: Request<Incoming>) -> Result<Value, (StatusCode, Error)> {
        if *req.method() != Method::PUT {
            return Err((
                StatusCode::METHOD_NOT_ALLOWED,
                Error::validation(format!("method {} not allowed, use PUT", req.method())),
            ));
        }

        let (service, method) = parse_target(req.uri().path()).map_err(with_status)?;

        let body = Limited::new(req.into_body(), MAX_BODY_SIZE)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    (
                        StatusCode::PAYLOAD_TOO_LARGE,
                        Error::validation(format!("body exceeds {} bytes", MAX_BODY_SIZE)),
                    )
                } else {
                    (StatusCode::BAD_REQUEST, Error::transport(format!("reading body: {}", e)))
                }
            })?
            .to_bytes();
        let body = std::str::from_utf8(&body)
            .map_err(|_| with_status(Error::deserialization("body is not UTF-8")))?;
        let args = deserialize_args(body).map_err(with_status)?;

        self.status.record_message();
        let value = self
            .routes
            .dispatch(&service, &method, args)
            .await
            .map_err(with_status)?;
        // A result the caller could not decode is reported instead of sent.
        check_depth(&value).map_err(with_status)?;
        Ok(value)
    }
}

/// Splits `/{service}/{method}` into its two segments.
fn parse_target(path: &str) -> corelib::Result<(String, String)> {
    let mut segments = path.trim_matches('/').split('/');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(service), Some(method), None) if !service.is_empty() && !method.is_empty() => {
            Ok((service.to_string(), method.to_string()))
        }
        _ => Err(Error::not_found(format!("no route for path '{}'", path))),
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Validation(_) | Error::Deserialization(_) => StatusCode::BAD_REQUEST,
        Error::Transport(_) => StatusCode::BAD_GATEWAY,
        Error::Remote(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn with_status(err: Error) -> (StatusCode, Error) {
    (status_for(&err), err)
}

fn reply(status: StatusCode, value: &Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(serialize(value))));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}

/// Accepts connections until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("listener shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(err) => {
                        warn!(error = %err, "accept failed");
                        continue;
                    }
                };
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let dispatcher = Arc::clone(&dispatcher);
                        async move { dispatcher.handle(req).await }
                    });
                    if let Err(err) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        debug!(%peer, error = %err, "connection ended with error");
                    }
                });
            }
        }
    }
}
