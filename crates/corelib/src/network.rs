//! Core networking abstractions shared across the workspace.
//!
//! Node addresses, call targets, and the transport-agnostic exchange contract
//! the [`Communicator`](crate::comm::Communicator) is written against.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::Value;

/// Reachable address of a node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    pub ip: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }

    /// Parses `host:port`, optionally prefixed with `http://` or `https://`.
    ///
    /// Nodes only speak plain HTTP; `https://` is read as the same address.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let rest = match trimmed.split_once("://") {
            Some(("http" | "https", rest)) => rest,
            Some((scheme, _)) => {
                return Err(Error::validation(format!(
                    "address {:?} has unsupported scheme {:?}",
                    text, scheme
                )))
            }
            None => trimmed,
        };
        let rest = rest.trim_end_matches('/');
        let (ip, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| Error::validation(format!("address {:?} has no port", text)))?;
        if ip.is_empty() {
            return Err(Error::validation(format!("address {:?} has no host", text)));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| Error::validation(format!("address {:?} has an invalid port", text)))?;
        Ok(Self::new(ip, port))
    }

    pub fn to_value(&self) -> Value {
        Value::object([("ip", Value::from(self.ip.as_str())), ("port", Value::from(self.port))])
    }

    /// Reads `{ip, port}` from a value.
    pub fn from_value(value: &Value) -> Result<Self> {
        let ip = value
            .get("ip")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::validation("node address needs a string 'ip'"))?;
        let port = value
            .get("port")
            .and_then(Value::as_f64)
            .filter(|p| p.fract() == 0.0 && *p >= 0.0 && *p <= f64::from(u16::MAX))
            .ok_or_else(|| Error::validation("node address needs a numeric 'port'"))?;
        Ok(Self::new(ip, port as u16))
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Target of one remote call: which node, and which service method on it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    pub node: NodeAddress,
    pub service: String,
    pub method: String,
}

impl Remote {
    pub fn new(node: NodeAddress, service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            node,
            service: service.into(),
            method: method.into(),
        }
    }

    /// Request path on the remote node: `/{service}/{method}`.
    pub fn path(&self) -> String {
        format!("/{}/{}", self.service, self.method)
    }

    pub fn to_value(&self) -> Value {
        Value::object([
            ("node", self.node.to_value()),
            ("service", Value::from(self.service.as_str())),
            ("method", Value::from(self.method.as_str())),
        ])
    }

    /// Reads `{node: {ip, port}, service, method}` from a value.
    pub fn from_value(value: &Value) -> Result<Self> {
        let node = value
            .get("node")
            .ok_or_else(|| Error::validation("remote needs a 'node'"))?;
        let service = value
            .get("service")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::validation("remote needs a string 'service'"))?;
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::validation("remote needs a string 'method'"))?;
        Ok(Self::new(NodeAddress::from_value(node)?, service, method))
    }
}

/// Raw outcome of one exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single request/response exchange with a remote node.
///
/// Implementations report every failure to complete the exchange as
/// [`Error::Transport`]. They do not retry and do not time out.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn exchange(&self, node: &NodeAddress, path: &str, body: String) -> Result<Response>;
}
