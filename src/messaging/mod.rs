// src/messaging/mod.rs
pub mod error;
pub mod types;

pub use error::{ReplyError, Result};
pub use types::RequestId;
