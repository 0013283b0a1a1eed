//! HTTP binding for the node runtime.
//!
//! This crate connects the core library to the network:
//! - An HTTP client implementing the communicator's `Transport`
//! - The inbound listener that resolves and invokes local services
//! - Node bootstrap wiring `status`, `routes` and `comm` together

pub mod client;
pub mod error;
pub mod node;
pub mod server;

pub use client::HttpTransport;
pub use error::NodeError;
pub use node::Node;
