//! Service registry ("routes").
//!
//! Maps service names to live [`Service`] objects. Entries are swapped as
//! whole `Arc`s, so a lookup racing a registration sees either the old or the
//! new service, never a mix of both.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::service::{str_arg, Service};
use crate::value::Value;

/// Well-known service names.
pub const STATUS: &str = "status";
pub const ROUTES: &str = "routes";
pub const COMM: &str = "comm";

#[derive(Default)]
pub struct Routes {
    services: DashMap<String, Arc<dyn Service>>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a registered service.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Service>> {
        self.services
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::not_found(format!("service '{}'", name)))
    }

    /// Registers `service` under `name`, replacing any previous entry.
    ///
    /// Returns the stored service so the caller can confirm what is active.
    pub fn put(&self, service: Arc<dyn Service>, name: &str) -> Result<Arc<dyn Service>> {
        if name.trim().is_empty() {
            return Err(Error::validation("service name is empty"));
        }
        if name.contains('/') {
            return Err(Error::validation(format!(
                "service name '{}' contains '/'",
                name
            )));
        }
        let methods = service.methods();
        if methods.is_empty() {
            return Err(Error::validation(format!(
                "service '{}' exposes no methods",
                name
            )));
        }

        let replaced = self
            .services
            .insert(name.to_string(), Arc::clone(&service))
            .is_some();
        info!(service = name, ?methods, replaced, "registered service");
        Ok(service)
    }

    /// Registered service names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Resolves `service` and invokes `method` on it.
    ///
    /// This is the get/invoke step inbound calls go through; an unknown
    /// service or method fails with `NotFound` before any handler runs.
    pub async fn dispatch(&self, service: &str, method: &str, args: Vec<Value>) -> Result<Value> {
        let target = self.get(service)?;
        if !target.has_method(method) {
            return Err(Error::not_found(format!(
                "method '{}' on service '{}'",
                method, service
            )));
        }
        debug!(service, method, argc = args.len(), "dispatching call");
        target.call(method, args).await
    }

    /// The remotely reachable face of this registry.
    pub fn service(self: &Arc<Self>) -> RoutesService {
        RoutesService {
            routes: Arc::downgrade(self),
        }
    }
}

/// Remote view of [`Routes`].
///
/// Only `get` is exposed: it answers with a descriptor
/// `{name, methods: [...]}`. Registration stays local because services are
/// code and cannot be sent as values.
pub struct RoutesService {
    routes: Weak<Routes>,
}

#[async_trait]
impl Service for RoutesService {
    fn methods(&self) -> Vec<String> {
        vec!["get".to_string()]
    }

    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        match method {
            "get" => {
                let routes = self
                    .routes
                    .upgrade()
                    .ok_or_else(|| Error::not_found("routes registry is gone"))?;
                let name = str_arg(&args, 0, "service name")?;
                let service = routes.get(name)?;
                let methods = service.methods().into_iter().map(Value::from).collect();
                Ok(Value::object([
                    ("name", Value::from(name)),
                    ("methods", Value::Array(methods)),
                ]))
            }
            other => Err(Error::not_found(format!("method '{}' on service 'routes'", other))),
        }
    }
}
