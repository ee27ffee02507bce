// src/messaging/error.rs
use thiserror::Error;

use crate::action::ActionError;
use crate::transport::errors::TransportError;

/// Errors surfaced by request/reply operations.
///
/// A reply that does not arrive in time is not an error: the operations
/// return `Ok(None)` for that case.
#[derive(Error, Debug)]
pub enum ReplyError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid action: {0}")]
    Action(#[from] ActionError),

    #[error("Failed to serialize/deserialize payload: {0}")]
    Serialization(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("A correlated request is already pending on this connection ({0} outstanding)")]
    RequestPending(usize),

    #[error("Connection closed before a reply arrived")]
    ConnectionClosed,

    #[error("Blocking call made from a current_thread runtime; use the async variant")]
    BlockingInAsyncContext,

    #[error("No tokio runtime available to drive a blocking call")]
    NoRuntime,
}

impl From<serde_json::Error> for ReplyError {
    fn from(error: serde_json::Error) -> Self {
        ReplyError::Serialization(error.to_string())
    }
}

// Custom Result type for request/reply operations
pub type Result<T> = std::result::Result<T, ReplyError>;
