//! Node bootstrap.
//!
//! Starting a node binds its listener, snapshots its status from the address
//! actually bound, and registers the built-in services:
//!
//! ```text
//! service  methods  description
//! status   get      facts about this node
//! routes   get      what is registered here
//! comm     send     relay a call to another node
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use corelib::routes::{COMM, ROUTES, STATUS};
use corelib::{Communicator, NodeAddress, NodeConfig, Remote, Result, Routes, Service, Status, Value};

use crate::client::HttpTransport;
use crate::error::{NodeError, NodeResult};
use crate::server::{serve, Dispatcher};

/// A running node.
///
/// Dropping it stops the listener; [`Node::stop`] does the same and waits
/// for the accept loop to exit.
pub struct Node {
    config: Arc<NodeConfig>,
    address: NodeAddress,
    routes: Arc<Routes>,
    status: Arc<Status>,
    comm: Communicator,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    /// Binds `config.ip:config.port` and starts serving.
    pub async fn start(config: NodeConfig) -> NodeResult<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let bind_to = config.address().to_string();
        let listener = TcpListener::bind((config.ip.as_str(), config.port))
            .await
            .map_err(|source| NodeError::Bind {
                address: bind_to.clone(),
                source,
            })?;
        let port = listener
            .local_addr()
            .map_err(|source| NodeError::Bind {
                address: bind_to,
                source,
            })?
            .port();
        let address = NodeAddress::new(config.ip.clone(), port);

        let status = Arc::new(Status::new(&address));
        let routes = Arc::new(Routes::new());
        let comm = Communicator::new(Arc::new(HttpTransport::new()));

        routes.put(Arc::clone(&status) as Arc<dyn Service>, STATUS)?;
        routes.put(Arc::new(routes.service()), ROUTES)?;
        routes.put(Arc::new(comm.service()), COMM)?;

        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&routes), Arc::clone(&status)));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(serve(listener, dispatcher, shutdown_rx));

        let nid = status.get(corelib::status::NID)?;
        info!(%address, %nid, "node listening");

        Ok(Self {
            config,
            address,
            routes,
            status,
            comm,
            shutdown: Mutex::new(Some(shutdown_tx)),
            listener: Mutex::new(Some(task)),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Address peers use to reach this node.
    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    pub fn routes(&self) -> &Arc<Routes> {
        &self.routes
    }

    pub fn status(&self) -> &Arc<Status> {
        &self.status
    }

    pub fn comm(&self) -> &Communicator {
        &self.comm
    }

    /// Registers an application service on this node.
    pub fn register(&self, name: &str, service: impl Service) -> Result<Arc<dyn Service>> {
        self.routes.put(Arc::new(service), name)
    }

    /// Calls `service/method` on `node` through this node's communicator.
    pub async fn call(
        &self,
        node: &NodeAddress,
        service: &str,
        method: &str,
        message: impl Into<Value>,
    ) -> Result<Value> {
        let remote = Remote::new(node.clone(), service, method);
        self.comm.send(message, &remote).await
    }

    /// Signals the listener to stop accepting connections.
    pub fn shutdown(&self) {
        if let Some(tx) = self.shutdown.lock().take() {
            let _ = tx.send(());
        }
    }

    /// Stops the listener and waits for it to exit.
    pub async fn stop(self) {
        self.shutdown();
        let task = self.listener.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        info!(address = %self.address, "node stopped");
    }
}
