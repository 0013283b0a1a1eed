//! Core library for the distributed node runtime.
//!
//! This crate provides the pieces every node is built from:
//! - Values and their wire serialization
//! - Identifier generation
//! - Services and the service registry ("routes")
//! - The status service
//! - The communicator used to call services on remote nodes

pub mod comm;
pub mod config;
pub mod error;
pub mod id;
pub mod network;
pub mod routes;
pub mod serialization;
pub mod service;
pub mod status;
pub mod value;

pub use comm::{CommService, Communicator};
pub use config::NodeConfig;
pub use error::{Error, Result};
pub use network::{NodeAddress, Remote, Response, Transport};
pub use routes::{Routes, RoutesService};
pub use serialization::{deserialize, serialize};
pub use service::{Service, ServiceObject};
pub use status::Status;
pub use value::{ErrorValue, Value};
