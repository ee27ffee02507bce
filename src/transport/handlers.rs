// src/transport/handlers.rs
// Default inbound handlers: what a connection does with messages nobody is
// waiting for.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::action::{Action, ActionCode, ActionError};
use crate::message::Message;

/// Receives inbound messages that no correlated request claimed.
///
/// Handlers run on the connection's reader task and must not block.
pub trait InboundHandler: Send + Sync {
    fn on_message(&self, message: Message);
}

impl<F> InboundHandler for F
where
    F: Fn(Message) + Send + Sync,
{
    fn on_message(&self, message: Message) {
        self(message)
    }
}

/// Logs and drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl InboundHandler for LogHandler {
    fn on_message(&self, message: Message) {
        debug!(
            connection_id = %message.connection_id(),
            len = message.len(),
            "Unsolicited message dropped"
        );
    }
}

/// Forwards every message into an unbounded channel, so a task can consume
/// inbound traffic as a stream.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<Message>,
}

impl ChannelHandler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl InboundHandler for ChannelHandler {
    fn on_message(&self, message: Message) {
        if self.tx.send(message).is_err() {
            warn!("Inbound message receiver dropped; message discarded");
        }
    }
}

/// Routes action-tagged messages to the handler registered for their code.
/// The handler receives the message body without the code.
#[derive(Default)]
pub struct ActionRouter {
    handlers: HashMap<ActionCode, Arc<dyn InboundHandler>>,
    fallback: Option<Arc<dyn InboundHandler>>,
}

impl ActionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    // Register a handler for a specific action
    pub fn register<H>(&mut self, action: impl Into<Action>, handler: H) -> Result<&mut Self, ActionError>
    where
        H: InboundHandler + 'static,
    {
        let code = action.into().code()?;
        self.handlers.insert(code, Arc::new(handler));
        Ok(self)
    }

    /// Handler for messages with no registered action, or too short to carry
    /// one. Receives the full, undecoded message.
    pub fn fallback<H>(&mut self, handler: H) -> &mut Self
    where
        H: InboundHandler + 'static,
    {
        self.fallback = Some(Arc::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl InboundHandler for ActionRouter {
    fn on_message(&self, message: Message) {
        let routed = message
            .action()
            .ok()
            .and_then(|(code, body)| self.handlers.get(&code).map(|handler| (code, handler, body)));

        match routed {
            Some((code, handler, body)) => {
                debug!(connection_id = %message.connection_id(), action = %code, "Routing action message");
                handler.on_message(body);
            }
            None => match &self.fallback {
                Some(fallback) => fallback.on_message(message),
                None => warn!(
                    connection_id = %message.connection_id(),
                    len = message.len(),
                    "No handler registered for action message"
                ),
            },
        }
    }
}
