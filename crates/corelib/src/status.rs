//! Status service: read-only facts about the local node.
//!
//! Facts are fixed when the node starts, except `uptime`, computed on every
//! read, and `counts`, which the node's own listener bumps for each inbound
//! call. Nothing reachable from the network can change them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::id;
use crate::network::NodeAddress;
use crate::service::{str_arg, Service};
use crate::value::Value;

pub const NID: &str = "nid";
pub const SID: &str = "sid";
pub const IP: &str = "ip";
pub const PORT: &str = "port";
pub const VERSION: &str = "version";
pub const START_TIME: &str = "startTime";
pub const UPTIME: &str = "uptime";
pub const COUNTS: &str = "counts";

pub struct Status {
    facts: BTreeMap<String, Value>,
    started: Instant,
    counts: AtomicU64,
}

impl Status {
    /// Snapshots the facts of a node listening on `address`.
    pub fn new(address: &NodeAddress) -> Self {
        let nid = id::node_id(address);
        let start_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();

        let mut facts = BTreeMap::new();
        facts.insert(SID.to_string(), Value::from(id::short_id(&nid)));
        facts.insert(NID.to_string(), Value::from(nid));
        facts.insert(IP.to_string(), Value::from(address.ip.as_str()));
        facts.insert(PORT.to_string(), Value::from(address.port));
        facts.insert(VERSION.to_string(), Value::from(env!("CARGO_PKG_VERSION")));
        facts.insert(START_TIME.to_string(), Value::Date(start_ms));

        Self {
            facts,
            started: Instant::now(),
            counts: AtomicU64::new(0),
        }
    }

    /// Returns the value of fact `id`.
    pub fn get(&self, id: &str) -> Result<Value> {
        match id {
            UPTIME => Ok(Value::Number(self.started.elapsed().as_secs_f64())),
            COUNTS => Ok(Value::from(self.counts())),
            other => self
                .facts
                .get(other)
                .cloned()
                .ok_or_else(|| Error::not_found(format!("status fact '{}'", other))),
        }
    }

    /// Every fact name `get` answers to, sorted.
    pub fn fact_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.facts.keys().cloned().collect();
        names.push(UPTIME.to_string());
        names.push(COUNTS.to_string());
        names.sort();
        names
    }

    /// Records one inbound message handled by this node.
    pub fn record_message(&self) {
        self.counts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counts(&self) -> u64 {
        self.counts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Service for Status {
    fn methods(&self) -> Vec<String> {
        vec!["get".to_string()]
    }

    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        match method {
            "get" => self.get(str_arg(&args, 0, "status id")?),
            other => Err(Error::not_found(format!("method '{}' on service 'status'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> Status {
        Status::new(&NodeAddress::new("127.0.0.1", 8080))
    }

    #[test]
    fn test_identity_facts() {
        let status = status();
        let nid = status.get(NID).unwrap();
        let nid = nid.as_str().unwrap();
        assert_eq!(nid, id::node_id(&NodeAddress::new("127.0.0.1", 8080)));
        assert_eq!(status.get(SID).unwrap(), Value::from(id::short_id(nid)));
        assert_eq!(status.get(IP).unwrap(), Value::from("127.0.0.1"));
        assert_eq!(status.get(PORT).unwrap(), Value::Number(8080.0));
        assert!(matches!(status.get(START_TIME).unwrap(), Value::Date(ms) if ms > 0));
    }

    #[test]
    fn test_unknown_fact() {
        assert!(matches!(status().get("heapTotal"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_live_facts() {
        let status = status();
        assert_eq!(status.get(COUNTS).unwrap(), Value::Number(0.0));
        status.record_message();
        status.record_message();
        assert_eq!(status.get(COUNTS).unwrap(), Value::Number(2.0));
        assert!(status.get(UPTIME).unwrap().as_f64().unwrap() >= 0.0);
    }

    #[test]
    fn test_fact_names() {
        let names = status().fact_names();
        for name in [NID, SID, IP, PORT, VERSION, START_TIME, UPTIME, COUNTS] {
            assert!(names.iter().any(|n| n == name), "missing {}", name);
        }
    }

    #[tokio::test]
    async fn test_service_get() {
        let status = status();
        let out = status.call("get", vec![Value::from(IP)]).await.unwrap();
        assert_eq!(out, Value::from("127.0.0.1"));
        let err = status.call("get", vec![Value::Number(1.0)]).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(status.methods(), vec!["get".to_string()]);
    }
}
