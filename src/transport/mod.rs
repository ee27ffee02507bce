// src/transport/mod.rs
// Message-oriented connections and request/reply correlation over them

pub mod errors;
pub mod connection;
pub mod dispatcher;
pub mod framing;
pub mod handlers;
pub mod request_response;
pub mod tokio_exec;

// Re-export specific items to simplify imports elsewhere
pub use connection::{Connection, ConnectionManager, ConnectionOptions, StreamConnection};
pub use dispatcher::{Dispatcher, DEFAULT_MAX_PENDING};
pub use errors::TransportError;
pub use handlers::{ActionRouter, ChannelHandler, InboundHandler, LogHandler};
pub use request_response::{send_and_get_reply, DEFAULT_REPLY_TIMEOUT};
pub use tokio_exec::BlockingExecutor;
