//! Protocol definitions for client-server communication
//!
//! Every frame is a JSON object carrying a `type` discriminator. Chat frames
//! from clients are relayed verbatim; the server only generates `info` and
//! `user_list` frames itself.

mod message;

pub use message::{ClientMessage, Route, ServerMessage, TYPE_JOIN, TYPE_PRIVATE};

use thiserror::Error;

/// Close code sent when a join is missing, malformed in intent, or the name is taken
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Close code sent when a frame is not a decodable JSON object
pub const CLOSE_INVALID_PAYLOAD: u16 = 1007;

pub const REASON_BAD_USERNAME: &str = "Username is required or already taken.";
pub const REASON_MALFORMED: &str = "Malformed message.";

/// Maximum inbound message size accepted by default (2 MiB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 2 * 1024 * 1024;

/// Protocol-specific errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Missing or non-string field '{0}'")]
    MissingField(&'static str),

    #[error("Expected a join message, got type '{0}'")]
    NotAJoin(String),

    #[error("Username must not be empty")]
    EmptyUsername,

    #[error("Message received before join completed")]
    NotJoined,

    #[error("Session has already joined")]
    AlreadyJoined,

    #[error("Session is closed")]
    SessionClosed,

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Close code a client should see when this error ends its connection
    pub fn close_code(&self) -> u16 {
        match self {
            ProtocolError::MalformedMessage(_) | ProtocolError::Encode(_) => CLOSE_INVALID_PAYLOAD,
            ProtocolError::MissingField(_)
            | ProtocolError::NotAJoin(_)
            | ProtocolError::EmptyUsername
            | ProtocolError::NotJoined
            | ProtocolError::AlreadyJoined
            | ProtocolError::SessionClosed => CLOSE_POLICY_VIOLATION,
        }
    }
}

/// Encode a server message as a JSON text frame
pub fn encode(msg: &ServerMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

/// Decode a client text frame
pub fn parse_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    ClientMessage::parse(text)
}
