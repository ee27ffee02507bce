// src/messaging/types.rs
use std::collections::BTreeMap;
use tokio::sync::oneshot;

use crate::message::Message;

/// Identifies one correlated request on a connection. Monotonically
/// increasing, never reused for the lifetime of the connection.
pub type RequestId = u64;

pub type ReplySender = oneshot::Sender<Message>;
pub type ReplyReceiver = oneshot::Receiver<Message>;

/// Ordered so that the oldest outstanding request is answered first.
pub type CorrelationMap = BTreeMap<RequestId, ReplySender>;
