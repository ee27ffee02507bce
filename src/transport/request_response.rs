// src/transport/request_response.rs
// Correlated request/reply on top of a fire-and-forget connection.

use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::connection::Connection;
use crate::message::Message;
use crate::messaging::error::Result;

/// Used when a caller does not specify a timeout.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Sends `frames` as one message and waits for the next inbound message on
/// the connection.
///
/// Returns `Ok(None)` if nothing arrives within `timeout` (default
/// [`DEFAULT_REPLY_TIMEOUT`]); a missing reply is not an error. Whatever the
/// outcome, the request is unregistered before this returns, so later
/// messages go to the connection's default handler.
///
/// # Errors
///
/// * `ReplyError::RequestPending` if the connection already has its maximum
///   number of outstanding requests.
/// * `ReplyError::ConnectionClosed` if the connection is, or becomes, closed.
/// * `ReplyError::Transport` if the send fails.
#[instrument(skip(connection, frames), fields(connection_id = %connection.id()))]
pub async fn send_and_get_reply<C>(
    connection: &C,
    frames: &[Bytes],
    timeout: Option<Duration>,
) -> Result<Option<Message>>
where
    C: Connection + ?Sized,
{
    let timeout = timeout.unwrap_or(DEFAULT_REPLY_TIMEOUT);

    // Register before sending so an immediate reply cannot slip past.
    let pending = connection.dispatcher().register()?;
    let request_id = pending.id();

    if let Err(e) = connection.send(frames).await {
        warn!(request_id, "Send failed, request withdrawn: {}", e);
        return Err(e.into());
    }

    let reply = pending.wait(timeout).await?;
    match &reply {
        Some(message) => debug!(request_id, len = message.len(), "Reply received"),
        None => debug!(request_id, ?timeout, "No reply before timeout"),
    }
    Ok(reply)
}

/// Sends `frames` as one message without waiting for anything.
pub async fn send<C>(connection: &C, frames: &[Bytes]) -> Result<()>
where
    C: Connection + ?Sized,
{
    connection.send(frames).await?;
    Ok(())
}
