// src/lib.rs
// Request/reply correlation over persistent, message-oriented TCP connections.

pub mod action;
pub mod client;
pub mod config;
pub mod env;
pub mod message;
pub mod messaging;
pub mod payload;
pub mod transport;
pub mod utils;

pub use action::{to_action_code, Action, ActionCode, ActionError};
pub use client::{ClientSettings, EasyClient, RequestOptions};
pub use message::Message;
pub use messaging::{ReplyError, Result};
pub use payload::{JsonSerializer, Packet, Payload, Serializer, TextEncoding};
pub use transport::{
    Connection, ConnectionManager, InboundHandler, StreamConnection, TransportError,
    DEFAULT_REPLY_TIMEOUT,
};
