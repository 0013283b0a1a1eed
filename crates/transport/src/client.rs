//! HTTP client side of the exchange.
//!
//! Each call opens its own connection, sends a single `PUT /{service}/{method}`
//! and reads the whole response, up to [`MAX_BODY_SIZE`]. No pooling, retries
//! or timeouts happen here.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::{header, Method, Request};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::debug;

use corelib::{Error, NodeAddress, Response, Result, Transport};

use crate::server::MAX_BODY_SIZE;

#[derive(Clone, Copy, Debug, Default)]
pub struct HttpTransport;

impl HttpTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exchange(&self, node: &NodeAddress, path: &str, body: String) -> Result<Response> {
        let stream = TcpStream::connect((node.ip.as_str(), node.port))
            .await
            .map_err(|e| Error::transport(format!("connect to {}: {}", node, e)))?;
        let io = TokioIo::new(stream);

        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| Error::transport(format!("handshake with {}: {}", node, e)))?;
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                debug!(error = %err, "client connection ended with error");
            }
        });

        let request = Request::builder()
            .method(Method::PUT)
            .uri(path)
            .header(header::HOST, node.to_string())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONNECTION, "close")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| Error::transport(format!("invalid request to {}{}: {}", node, path, e)))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| Error::transport(format!("request to {}{}: {}", node, path, e)))?;
        let status = response.status().as_u16();
        let bytes = Limited::new(response.into_body(), MAX_BODY_SIZE)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    Error::transport(format!(
                        "response from {} exceeds {} bytes",
                        node, MAX_BODY_SIZE
                    ))
                } else {
                    Error::transport(format!("reading response from {}: {}", node, e))
                }
            })?
            .to_bytes();

        let body = String::from_utf8(bytes.to_vec()).map_err(|_| {
            if (200..300).contains(&status) {
                Error::deserialization(format!("response body from {} is not UTF-8", node))
            } else {
                Error::transport(format!(
                    "response from {} with status {} is not UTF-8",
                    node, status
                ))
            }
        })?;

        Ok(Response { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::{Communicator, Remote, Value};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one connection with a fixed raw HTTP response.
    async fn raw_responder(status_line: &'static str, body: Vec<u8>) -> NodeAddress {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; 4096];
            let _ = stream.read(&mut request).await;
            let mut response = format!(
                "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                status_line,
                body.len()
            )
            .into_bytes();
            response.extend_from_slice(&body);
            let _ = stream.write_all(&response).await;
            let _ = stream.shutdown().await;
        });
        NodeAddress::new("127.0.0.1", port)
    }

    #[tokio::test]
    async fn test_invalid_utf8_success_body_is_deserialization_error() {
        let node = raw_responder("200 OK", b"{\"type\":\"string\",\"value\":\"a\xFFb\"}".to_vec()).await;
        let comm = Communicator::new(Arc::new(HttpTransport::new()));
        let out = comm.send(Value::from("x"), &Remote::new(node, "echo", "ping")).await;
        assert!(matches!(out, Err(Error::Deserialization(_))), "got {:?}", out);
    }

    #[tokio::test]
    async fn test_invalid_utf8_error_body_is_transport_error() {
        let node = raw_responder("500 Internal Server Error", vec![0xFF, 0xFE]).await;
        let out = HttpTransport::new().exchange(&node, "/echo/ping", "[]".to_string()).await;
        assert!(matches!(out, Err(Error::Transport(_))), "got {:?}", out);
    }

    #[tokio::test]
    async fn test_oversized_response_is_transport_error() {
        let node = raw_responder("200 OK", vec![b'x'; MAX_BODY_SIZE + 1]).await;
        let out = HttpTransport::new().exchange(&node, "/echo/ping", "[]".to_string()).await;
        assert!(matches!(out, Err(Error::Transport(_))), "got {:?}", out);
    }
}
