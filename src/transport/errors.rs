// src/transport/errors.rs

use thiserror::Error;
use tokio::time::error::Elapsed;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Message of {0} bytes exceeds the maximum frame length")]
    MessageTooLarge(usize),

    #[error("Connection is closed")]
    Closed,

    #[error("Connection timeout: {0}")]
    ConnectTimeout(String),

    #[error("Gave up connecting after {0} attempts")]
    ReconnectExhausted(u32),
}

// Custom Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl From<Elapsed> for TransportError {
    fn from(_: Elapsed) -> Self {
        TransportError::ConnectTimeout("Connection timed out".to_string())
    }
}
