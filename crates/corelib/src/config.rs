//! Node configuration.
//!
//! Built once at startup and handed to the components that need it; nothing
//! reads configuration from global state.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::network::NodeAddress;

pub const DEFAULT_IP: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Interface to listen on.
    pub ip: String,
    /// Port to listen on; `0` picks a free one.
    pub port: u16,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ip: DEFAULT_IP.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl NodeConfig {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }

    /// Parses a JSON object such as `{"ip": "127.0.0.1", "port": 8080}`.
    /// Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: NodeConfig = serde_json::from_str(text)
            .map_err(|e| Error::validation(format!("invalid node config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ip.trim().is_empty() {
            return Err(Error::validation("node config has an empty ip"));
        }
        Ok(())
    }

    pub fn address(&self) -> NodeAddress {
        NodeAddress::new(self.ip.clone(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::from_json("{}").unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.address().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_partial_override() {
        let config = NodeConfig::from_json(r#"{"port": 9001}"#).unwrap();
        assert_eq!(config.ip, DEFAULT_IP);
        assert_eq!(config.port, 9001);
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(matches!(NodeConfig::from_json(r#"{"ip": ""}"#), Err(Error::Validation(_))));
        assert!(matches!(NodeConfig::from_json(r#"{"port": -1}"#), Err(Error::Validation(_))));
        assert!(matches!(NodeConfig::from_json("nope"), Err(Error::Validation(_))));
    }
}
