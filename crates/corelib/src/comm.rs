//! Message communication ("comm").
//!
//! Turns a method call into one request/response exchange with a remote node:
//! normalize the message into an argument list, serialize it, hand it to the
//! [`Transport`], and map whatever comes back into `Ok(value)` or one of the
//! error kinds. The communicator keeps no per-call state.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::network::{Remote, Response, Transport};
use crate::serialization::{deserialize, serialize_message};
use crate::service::{arg, Service};
use crate::value::Value;

#[derive(Clone)]
pub struct Communicator {
    transport: Arc<dyn Transport>,
}

impl Communicator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Calls `remote.service/remote.method` on `remote.node` with `message`.
    ///
    /// A non-array message is sent as a single argument. The remote's return
    /// value comes back as one value, never spread.
    pub async fn send(&self, message: impl Into<Value>, remote: &Remote) -> Result<Value> {
        let path = remote.path();
        metrics::counter!("comm_send_total").increment(1);

        let outcome = match serialize_message(message.into()) {
            Ok(body) => {
                debug!(node = %remote.node, %path, bytes = body.len(), "sending message");
                match self.transport.exchange(&remote.node, &path, body).await {
                    Ok(response) => interpret(response),
                    Err(err) => Err(err),
                }
            }
            Err(err) => Err(err),
        };

        if let Err(err) = &outcome {
            metrics::counter!("comm_send_failures_total", "kind" => err.kind()).increment(1);
            warn!(node = %remote.node, %path, error = %err, "send failed");
        }
        outcome
    }

    /// Callback form of [`send`](Self::send).
    ///
    /// The exchange runs on a spawned task and `callback` fires exactly once
    /// with its outcome. Dropping the handle does not cancel the exchange.
    pub fn send_with_callback<F>(&self, message: Value, remote: Remote, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        let comm = self.clone();
        tokio::spawn(async move {
            let outcome = comm.send(message, &remote).await;
            callback(outcome);
        })
    }

    /// Remotely reachable face of this communicator.
    pub fn service(&self) -> CommService {
        CommService { comm: self.clone() }
    }
}

/// Maps a raw response into the call's outcome.
fn interpret(response: Response) -> Result<Value> {
    let success = response.is_success();
    match deserialize(&response.body) {
        Ok(Value::Error(err)) => Err(Error::Remote(err)),
        Ok(value) if success => Ok(value),
        Ok(_) => Err(Error::transport(format!(
            "remote answered with status {}",
            response.status
        ))),
        Err(err) if success => Err(err),
        Err(_) => Err(Error::transport(format!(
            "remote answered with status {} and an unreadable body",
            response.status
        ))),
    }
}

/// `comm/send(message, remote)`: relays a call through this node.
pub struct CommService {
    comm: Communicator,
}

#[async_trait]
impl Service for CommService {
    fn methods(&self) -> Vec<String> {
        vec!["send".to_string()]
    }

    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        match method {
            "send" => {
                let remote = Remote::from_value(&arg(&args, 1))?;
                self.comm.send(arg(&args, 0), &remote).await
            }
            other => Err(Error::not_found(format!("method '{}' on service 'comm'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NodeAddress;
    use crate::serialization::{deserialize_args, serialize};
    use crate::value::ErrorValue;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every exchange with a canned outcome and records request bodies.
    struct CannedTransport {
        outcome: Result<Response>,
        bodies: Mutex<Vec<(String, String)>>,
    }

    impl CannedTransport {
        fn new(outcome: Result<Response>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                bodies: Mutex::new(Vec::new()),
            })
        }

        fn reply(status: u16, value: &Value) -> Arc<Self> {
            Self::new(Ok(Response {
                status,
                body: serialize(value),
            }))
        }
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn exchange(&self, _node: &NodeAddress, path: &str, body: String) -> Result<Response> {
            self.bodies.lock().push((path.to_string(), body));
            self.outcome.clone()
        }
    }

    fn remote() -> Remote {
        Remote::new(NodeAddress::new("127.0.0.1", 9), "echo", "ping")
    }

    #[tokio::test]
    async fn test_send_success() {
        let transport = CannedTransport::reply(200, &Value::from("pong"));
        let comm = Communicator::new(transport.clone());
        let out = comm.send(vec![Value::from("pong")], &remote()).await.unwrap();
        assert_eq!(out, Value::from("pong"));

        let bodies = transport.bodies.lock();
        assert_eq!(bodies[0].0, "/echo/ping");
        assert_eq!(deserialize_args(&bodies[0].1).unwrap(), vec![Value::from("pong")]);
    }

    #[tokio::test]
    async fn test_single_value_and_singleton_list_send_same_payload() {
        let transport = CannedTransport::reply(200, &Value::Null);
        let comm = Communicator::new(transport.clone());
        comm.send("hello", &remote()).await.unwrap();
        comm.send(vec![Value::from("hello")], &remote()).await.unwrap();
        let bodies = transport.bodies.lock();
        assert_eq!(bodies[0], bodies[1]);
    }

    #[tokio::test]
    async fn test_falsy_result_is_success() {
        for value in [Value::Bool(false), Value::Null, Value::Undefined, Value::Number(0.0)] {
            let comm = Communicator::new(CannedTransport::reply(200, &value));
            assert_eq!(comm.send(Value::Null, &remote()).await.unwrap(), value);
        }
    }

    #[tokio::test]
    async fn test_remote_error() {
        let err = ErrorValue::with_kind("NotFoundError", "service 'echo'");
        let comm = Communicator::new(CannedTransport::reply(404, &Value::Error(err.clone())));
        assert_eq!(comm.send(Value::Null, &remote()).await, Err(Error::Remote(err.clone())));

        // An error value is a remote failure even under a 200.
        let comm = Communicator::new(CannedTransport::reply(200, &Value::Error(err.clone())));
        assert_eq!(comm.send(Value::Null, &remote()).await, Err(Error::Remote(err)));
    }

    #[tokio::test]
    async fn test_transport_failure_passes_through() {
        let comm = Communicator::new(CannedTransport::new(Err(Error::transport("refused"))));
        assert_eq!(
            comm.send(Value::Null, &remote()).await,
            Err(Error::transport("refused"))
        );
    }

    #[tokio::test]
    async fn test_bad_status_without_readable_body() {
        let comm = Communicator::new(CannedTransport::new(Ok(Response {
            status: 502,
            body: "<html>bad gateway</html>".to_string(),
        })));
        assert!(matches!(comm.send(Value::Null, &remote()).await, Err(Error::Transport(_))));

        let comm = Communicator::new(CannedTransport::reply(500, &Value::from("odd")));
        assert!(matches!(comm.send(Value::Null, &remote()).await, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn test_garbled_success_body() {
        let comm = Communicator::new(CannedTransport::new(Ok(Response {
            status: 200,
            body: "{\"type\":".to_string(),
        })));
        assert!(matches!(
            comm.send(Value::Null, &remote()).await,
            Err(Error::Deserialization(_))
        ));
    }

    #[tokio::test]
    async fn test_callback_fires_exactly_once_on_every_path() {
        let transports = vec![
            CannedTransport::reply(200, &Value::from("ok")),
            CannedTransport::reply(404, &Error::not_found("x").to_value()),
            CannedTransport::new(Err(Error::transport("refused"))),
            CannedTransport::new(Ok(Response {
                status: 200,
                body: "garbage".to_string(),
            })),
        ];
        for transport in transports {
            let fired = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&fired);
            let comm = Communicator::new(transport);
            comm.send_with_callback(Value::from("m"), remote(), move |_outcome| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
            assert_eq!(fired.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_too_deep_message_never_reaches_the_wire() {
        let transport = CannedTransport::reply(200, &Value::Null);
        let comm = Communicator::new(transport.clone());
        let mut message = Value::from("leaf");
        for _ in 0..64 {
            message = Value::Array(vec![message]);
        }
        let out = comm.send(message, &remote()).await;
        assert!(matches!(out, Err(Error::Validation(_))), "got {:?}", out);
        assert!(transport.bodies.lock().is_empty());
    }

    #[tokio::test]
    async fn test_comm_service_relays() {
        let transport = CannedTransport::reply(200, &Value::from("relayed"));
        let service = Communicator::new(transport.clone()).service();
        let out = service
            .call("send", vec![Value::from("hi"), remote().to_value()])
            .await
            .unwrap();
        assert_eq!(out, Value::from("relayed"));
        assert_eq!(transport.bodies.lock()[0].0, "/echo/ping");

        let err = service.call("send", vec![Value::from("hi")]).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
