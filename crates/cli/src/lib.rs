//! CLI tool for operating nodes.
//!
//! Provides commands for:
//! - Sending a call to a service on a remote node
//! - Running a node

pub mod commands;
pub mod config;

pub use commands::{Command, CommandResult};
pub use config::CliConfig;
