//! Message types for the chat wire protocol

use super::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Discriminator value of a join request
pub const TYPE_JOIN: &str = "join";

/// Discriminator value of a private message
pub const TYPE_PRIVATE: &str = "pm";

/// Messages generated by the server itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Human-readable system announcement
    Info { text: String },

    /// Snapshot of every name currently online
    UserList { users: Vec<String> },
}

impl ServerMessage {
    pub fn joined(name: &str) -> Self {
        ServerMessage::Info {
            text: format!("{} has joined the chat!", name),
        }
    }

    pub fn left(name: &str) -> Self {
        ServerMessage::Info {
            text: format!("{} has left the chat.", name),
        }
    }
}

/// A parsed client frame.
///
/// The original text is kept alongside the decoded object because chat
/// messages are relayed to peers exactly as the client sent them; only the
/// routing fields are interpreted by the server.
#[derive(Debug, Clone)]
pub struct ClientMessage {
    raw: Arc<str>,
    body: Map<String, Value>,
}

/// Where a joined client's message should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Deliver to `recipient`, plus an echo to `sender`
    Private {
        sender: String,
        recipient: String,
        raw: Arc<str>,
    },

    /// Deliver to everyone except `sender`
    Group { sender: String, raw: Arc<str> },
}

impl ClientMessage {
    /// Decode a text frame. Anything other than a JSON object is malformed.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?;

        match value {
            Value::Object(body) => Ok(Self {
                raw: Arc::from(text),
                body,
            }),
            other => Err(ProtocolError::MalformedMessage(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// The `type` field, if present and a string
    pub fn kind(&self) -> Option<&str> {
        self.body.get("type").and_then(Value::as_str)
    }

    /// The exact text the client sent
    pub fn raw(&self) -> &Arc<str> {
        &self.raw
    }

    fn string_field(&self, field: &'static str) -> Result<&str, ProtocolError> {
        self.body
            .get(field)
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingField(field))
    }

    /// Interpret this frame as the opening join request and return the
    /// requested name.
    pub fn into_join(self) -> Result<String, ProtocolError> {
        match self.kind() {
            Some(TYPE_JOIN) => {}
            other => {
                return Err(ProtocolError::NotAJoin(
                    other.unwrap_or("<missing>").to_string(),
                ))
            }
        }

        let username = self.string_field("username")?;
        if username.is_empty() {
            return Err(ProtocolError::EmptyUsername);
        }
        Ok(username.to_string())
    }

    /// Interpret this frame as a chat message from a joined client.
    ///
    /// `pm` frames need `sender` and `recipient`; every other type is a group
    /// message and needs `sender`.
    pub fn into_route(self) -> Result<Route, ProtocolError> {
        let sender = self.string_field("sender")?.to_string();

        if self.kind() == Some(TYPE_PRIVATE) {
            let recipient = self.string_field("recipient")?.to_string();
            Ok(Route::Private {
                sender,
                recipient,
                raw: self.raw,
            })
        } else {
            Ok(Route::Group {
                sender,
                raw: self.raw,
            })
        }
    }
}

impl Route {
    /// Name the client claimed in the payload
    pub fn sender(&self) -> &str {
        match self {
            Route::Private { sender, .. } | Route::Group { sender, .. } => sender,
        }
    }

    pub fn raw(&self) -> &Arc<str> {
        match self {
            Route::Private { raw, .. } | Route::Group { raw, .. } => raw,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
