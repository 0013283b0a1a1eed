//! Error types for the core library.
//!
//! Every failure a node can observe is mapped into one of five kinds before it
//! reaches a caller. The kinds double as wire classification tags so a failure
//! raised on one node can be matched on another.

use std::fmt;

use crate::value::{ErrorValue, Value};

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Unknown service, method or status fact
    #[error("not found: {0}")]
    NotFound(String),
    /// Malformed registration or call input
    #[error("validation failed: {0}")]
    Validation(String),
    /// Corrupt wire payload
    #[error("deserialization failed: {0}")]
    Deserialization(String),
    /// The exchange with the remote node could not complete
    #[error("transport failed: {0}")]
    Transport(String),
    /// The remote node executed the call and reported a failure
    #[error("remote error: {0}")]
    Remote(ErrorValue),
}

/// Wire classification tags, one per [`Error`] variant.
pub mod kind {
    pub const NOT_FOUND: &str = "NotFoundError";
    pub const VALIDATION: &str = "ValidationError";
    pub const DESERIALIZATION: &str = "DeserializationError";
    pub const TRANSPORT: &str = "TransportError";
    pub const REMOTE: &str = "RemoteError";
}

impl Error {
    pub fn not_found(what: impl fmt::Display) -> Self {
        Error::NotFound(what.to_string())
    }

    pub fn validation(what: impl fmt::Display) -> Self {
        Error::Validation(what.to_string())
    }

    pub fn deserialization(what: impl fmt::Display) -> Self {
        Error::Deserialization(what.to_string())
    }

    pub fn transport(what: impl fmt::Display) -> Self {
        Error::Transport(what.to_string())
    }

    /// Classification tag carried on the wire for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => kind::NOT_FOUND,
            Error::Validation(_) => kind::VALIDATION,
            Error::Deserialization(_) => kind::DESERIALIZATION,
            Error::Transport(_) => kind::TRANSPORT,
            Error::Remote(_) => kind::REMOTE,
        }
    }

    /// Converts this error into a wire-safe value.
    ///
    /// A `Remote` error keeps the tag it was raised with, so relaying a failure
    /// through an intermediate node does not rewrite its classification.
    pub fn to_value(&self) -> Value {
        let err = match self {
            Error::Remote(inner) => inner.clone(),
            Error::NotFound(msg)
            | Error::Validation(msg)
            | Error::Deserialization(msg)
            | Error::Transport(msg) => ErrorValue::with_kind(self.kind(), msg.clone()),
        };
        Value::Error(err)
    }

    /// The classification of the failure at its origin.
    ///
    /// For `Remote` errors this is the tag the remote node attached, if any.
    pub fn origin_kind(&self) -> Option<&str> {
        match self {
            Error::Remote(inner) => inner.kind.as_deref(),
            other => Some(other.kind()),
        }
    }
}

impl From<ErrorValue> for Error {
    fn from(value: ErrorValue) -> Self {
        Error::Remote(value)
    }
}
