// src/action.rs
// Action codes: a 4-byte tag in front of a payload that tells the peer which
// handler should process it.

use bytes::{Buf, Bytes};
use std::fmt;
use thiserror::Error;

/// Length of an encoded action code on the wire.
pub const ACTION_CODE_LEN: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("Action name cannot be empty")]
    EmptyName,

    #[error("Frame too short to carry an action code ({0} bytes)")]
    Truncated(usize),
}

/// Integer routing tag carried in the first four bytes of an action message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionCode(pub i32);

impl ActionCode {
    pub fn value(self) -> i32 {
        self.0
    }

    /// Little-endian wire representation.
    pub fn to_bytes(self) -> [u8; ACTION_CODE_LEN] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for ActionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ActionCode {
    fn from(code: i32) -> Self {
        ActionCode(code)
    }
}

/// An action as supplied by a caller: either the code itself or a name that
/// hashes to one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Code(ActionCode),
    Name(String),
}

impl Action {
    pub fn code(&self) -> Result<ActionCode, ActionError> {
        match self {
            Action::Code(code) => Ok(*code),
            Action::Name(name) => to_action_code(name),
        }
    }
}

impl From<i32> for Action {
    fn from(code: i32) -> Self {
        Action::Code(ActionCode(code))
    }
}

impl From<ActionCode> for Action {
    fn from(code: ActionCode) -> Self {
        Action::Code(code)
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        Action::Name(name.to_string())
    }
}

impl From<String> for Action {
    fn from(name: String) -> Self {
        Action::Name(name)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Code(code) => write!(f, "{}", code),
            Action::Name(name) => write!(f, "{:?}", name),
        }
    }
}

/// Hash an action name with djb2a.
///
/// Every UTF-16 code unit of the name is truncated to its low byte before it
/// is mixed in, and the arithmetic wraps at 32 bits. Peers written against
/// the same convention compute identical codes, so this must never change.
pub fn to_action_code(name: &str) -> Result<ActionCode, ActionError> {
    if name.is_empty() {
        return Err(ActionError::EmptyName);
    }

    let hash = name.encode_utf16().fold(5381i32, |hash, unit| {
        (hash << 5).wrapping_add(hash) ^ i32::from(unit as u8)
    });

    Ok(ActionCode(hash))
}

pub fn encode(code: ActionCode) -> Bytes {
    Bytes::copy_from_slice(&code.to_bytes())
}

/// Split an inbound frame into its action code and body.
pub fn decode(frame: &Bytes) -> Result<(ActionCode, Bytes), ActionError> {
    if frame.len() < ACTION_CODE_LEN {
        return Err(ActionError::Truncated(frame.len()));
    }

    let mut head = frame.slice(..ACTION_CODE_LEN);
    let code = ActionCode(head.get_i32_le());
    Ok((code, frame.slice(ACTION_CODE_LEN..)))
}
