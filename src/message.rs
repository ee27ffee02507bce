use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::action::{self, ActionCode, ActionError};
use crate::messaging::error::Result;
use crate::payload::{Serializer, TextEncoding};
use crate::utils::compression;

/// One inbound unit of data, as delivered by the connection's framing layer.
///
/// Immutable once constructed. Cloning is cheap: the body is reference
/// counted.
#[derive(Clone, Debug)]
pub struct Message {
    data: Bytes,
    received_at: DateTime<Utc>,
    connection_id: Uuid,
}

impl Message {
    /// Creates a new Message stamped with the current time.
    pub fn new(data: impl Into<Bytes>, connection_id: Uuid) -> Self {
        Message {
            data: data.into(),
            received_at: Utc::now(),
            connection_id,
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn into_data(self) -> Bytes {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// The connection this message arrived on.
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Decodes the body as text. Invalid sequences are replaced rather than
    /// rejected.
    pub fn to_text(&self, encoding: TextEncoding) -> String {
        encoding.decode(&self.data)
    }

    /// Deserializes the body with the given serializer.
    pub fn deserialize<T: DeserializeOwned, S: Serializer>(&self, serializer: &S) -> Result<T> {
        serializer.deserialize(&self.data)
    }

    /// Returns a copy with the body decompressed, or an unchanged copy if the
    /// body does not look compressed.
    pub fn decompress(&self) -> Result<Message> {
        if !compression::is_compressed(&self.data) {
            return Ok(self.clone());
        }

        let data = compression::decompress(&self.data)?;
        Ok(self.with_data(Bytes::from(data)))
    }

    /// Splits an action-tagged message into its code and a message holding
    /// only the body.
    pub fn action(&self) -> std::result::Result<(ActionCode, Message), ActionError> {
        let (code, body) = action::decode(&self.data)?;
        Ok((code, self.with_data(body)))
    }

    fn with_data(&self, data: Bytes) -> Message {
        Message {
            data,
            received_at: self.received_at,
            connection_id: self.connection_id,
        }
    }
}
