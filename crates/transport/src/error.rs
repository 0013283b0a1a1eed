//! Error types for node bootstrap.

use thiserror::Error;

/// Errors that can occur while starting a node.
#[derive(Error, Debug)]
pub enum NodeError {
    /// The listening socket could not be bound
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration or registration was rejected
    #[error(transparent)]
    Core(#[from] corelib::Error),
}

/// Result type for node bootstrap.
pub type NodeResult<T> = Result<T, NodeError>;
