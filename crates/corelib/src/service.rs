//! Service abstractions.
//!
//! A service is a named capability exposing a fixed set of methods. Every
//! method takes positional [`Value`] arguments and completes exactly once with
//! a `Result<Value>`; the future returned by [`Service::call`] plays the role
//! of the `(error, value)` completion callback.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::value::Value;

/// Future returned by a method handler.
pub type MethodFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// Shareable method handler.
pub type Handler = Arc<dyn Fn(Vec<Value>) -> MethodFuture + Send + Sync>;

/// A capability that can be registered in [`Routes`](crate::routes::Routes)
/// and invoked remotely.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Names of the methods this service answers to.
    fn methods(&self) -> Vec<String>;

    /// Invokes `method` with positional `args`.
    ///
    /// Callers go through [`Routes::dispatch`](crate::routes::Routes::dispatch),
    /// which rejects unlisted methods before this runs.
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value>;

    fn has_method(&self, method: &str) -> bool {
        self.methods().iter().any(|m| m == method)
    }
}

/// Positional argument `index`, or `Undefined` when the caller passed fewer.
pub fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// Positional string argument, or a validation error naming `what`.
pub fn str_arg<'a>(args: &'a [Value], index: usize, what: &str) -> Result<&'a str> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(Error::validation(format!(
            "{} must be a string, found {}",
            what,
            other.type_name()
        ))),
        None => Err(Error::validation(format!("{} is required", what))),
    }
}

/// Method-table service assembled from closures.
///
/// ```rust
/// use corelib::service::ServiceObject;
/// use corelib::Value;
///
/// let echo = ServiceObject::builder("echo")
///     .method("ping", |args: Vec<Value>| async move {
///         Ok(args.into_iter().next().unwrap_or_default())
///     })
///     .build();
/// ```
#[derive(Clone)]
pub struct ServiceObject {
    name: String,
    handlers: BTreeMap<String, Handler>,
}

impl ServiceObject {
    pub fn builder(name: impl Into<String>) -> ServiceObjectBuilder {
        ServiceObjectBuilder {
            name: name.into(),
            handlers: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ServiceObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceObject")
            .field("name", &self.name)
            .field("methods", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl Service for ServiceObject {
    fn methods(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        let handler = self.handlers.get(method).ok_or_else(|| {
            Error::not_found(format!("method '{}' on service '{}'", method, self.name))
        })?;
        handler(args).await
    }
}

pub struct ServiceObjectBuilder {
    name: String,
    handlers: BTreeMap<String, Handler>,
}

impl ServiceObjectBuilder {
    /// Adds a method; a later method with the same name replaces the earlier one.
    pub fn method<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let handler: Handler =
            Arc::new(move |args: Vec<Value>| -> MethodFuture { Box::pin(handler(args)) });
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn build(self) -> ServiceObject {
        ServiceObject {
            name: self.name,
            handlers: self.handlers,
        }
    }
}
