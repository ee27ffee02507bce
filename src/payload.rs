// src/payload.rs
// Everything a caller can hand to the client reduces to a byte body here.

use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::str::FromStr;

use crate::action::{self, ActionCode};
use crate::message::Message;
use crate::messaging::error::Result;
use crate::utils::compression;

/// Character encoding used to turn text payloads into bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    /// 7-bit ASCII; anything outside the range is sent as `?`.
    Ascii,
    /// ISO-8859-1; anything outside the range is sent as `?`.
    Latin1,
}

impl TextEncoding {
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            TextEncoding::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            TextEncoding::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }

    pub fn decode(self, data: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(data).into_owned(),
            TextEncoding::Utf16Le => decode_utf16(data, u16::from_le_bytes),
            TextEncoding::Utf16Be => decode_utf16(data, u16::from_be_bytes),
            TextEncoding::Ascii => data
                .iter()
                .map(|&b| if b.is_ascii() { char::from(b) } else { char::REPLACEMENT_CHARACTER })
                .collect(),
            TextEncoding::Latin1 => data.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

fn decode_utf16(data: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units = data.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "utf8" => Ok(TextEncoding::Utf8),
            "utf16" | "utf16le" | "unicode" => Ok(TextEncoding::Utf16Le),
            "utf16be" => Ok(TextEncoding::Utf16Be),
            "ascii" | "usascii" => Ok(TextEncoding::Ascii),
            "latin1" | "iso88591" => Ok(TextEncoding::Latin1),
            other => Err(format!("Unknown text encoding: {}", other)),
        }
    }
}

/// A structured packet that can expose its wire body.
pub trait Packet {
    fn data(&self) -> Bytes;
}

impl Packet for Message {
    fn data(&self) -> Bytes {
        Message::data(self).clone()
    }
}

/// Pluggable object serialization for object payloads and replies.
pub trait Serializer: Send + Sync {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    fn deserialize<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn deserialize<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// The body of an outgoing message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Payload {
    /// No body at all, e.g. a ping-style action.
    #[default]
    Empty,
    Bytes(Bytes),
    Text { text: String, encoding: TextEncoding },
    /// Body taken from a [`Packet`].
    Packet(Bytes),
    /// Body produced by a [`Serializer`].
    Object(Bytes),
}

impl Payload {
    pub fn text(text: impl Into<String>, encoding: TextEncoding) -> Self {
        Payload::Text {
            text: text.into(),
            encoding,
        }
    }

    pub fn packet<P: Packet + ?Sized>(packet: &P) -> Self {
        Payload::Packet(packet.data())
    }

    /// Serializes `value` now, so a serializer failure is reported before
    /// anything touches the connection.
    pub fn object<S, T>(serializer: &S, value: &T) -> Result<Self>
    where
        S: Serializer,
        T: Serialize + ?Sized,
    {
        Ok(Payload::Object(Bytes::from(serializer.serialize(value)?)))
    }

    /// Like [`Payload::object`], but `None` becomes an empty body.
    pub fn optional_object<S, T>(serializer: &S, value: Option<&T>) -> Result<Self>
    where
        S: Serializer,
        T: Serialize + ?Sized,
    {
        match value {
            Some(value) => Payload::object(serializer, value),
            None => Ok(Payload::Empty),
        }
    }

    pub fn into_body(self) -> Bytes {
        match self {
            Payload::Empty => Bytes::new(),
            Payload::Bytes(data) | Payload::Packet(data) | Payload::Object(data) => data,
            Payload::Text { text, encoding } => Bytes::from(encoding.encode(&text)),
        }
    }

    /// Builds the frame set for one logical send: the optional action code
    /// followed by the (optionally compressed) body. An empty body is never
    /// compressed and never produces a frame.
    pub fn into_frames(self, action: Option<ActionCode>, compress: bool) -> Result<Vec<Bytes>> {
        let mut body = self.into_body();
        if compress && !body.is_empty() {
            body = Bytes::from(compression::compress(&body)?);
        }

        let mut frames = Vec::with_capacity(2);
        if let Some(code) = action {
            frames.push(action::encode(code));
        }
        if !body.is_empty() {
            frames.push(body);
        }
        Ok(frames)
    }
}

impl From<&[u8]> for Payload {
    fn from(data: &[u8]) -> Self {
        Payload::Bytes(Bytes::copy_from_slice(data))
    }
}

impl<const N: usize> From<&[u8; N]> for Payload {
    fn from(data: &[u8; N]) -> Self {
        Payload::Bytes(Bytes::copy_from_slice(data))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(data))
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Payload::Bytes(data)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::text(text, TextEncoding::Utf8)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::text(text, TextEncoding::Utf8)
    }
}

impl<P: Into<Payload>> From<Option<P>> for Payload {
    fn from(value: Option<P>) -> Self {
        value.map_or(Payload::Empty, Into::into)
    }
}
