//! Chat history model and faucet HTTP bodies

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{ProtocolError, ProtocolResult};

/// Field names owned by [`ChatMessage`] itself
const RESERVED_FIELDS: [&str; 2] = ["role", "content"];

/// Unique identifier attached to one client round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single chat turn
///
/// `role` and `content` are always present. Any other fields the caller sets
/// are carried in `extra` and serialized after them in sorted key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            extra: Map::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    /// Reject `extra` entries that would serialize a second `role` or `content`
    pub fn validate(&self) -> ProtocolResult<()> {
        match RESERVED_FIELDS.iter().find(|k| self.extra.contains_key(**k)) {
            Some(field) => Err(ProtocolError::ReservedField(field.to_string())),
            None => Ok(()),
        }
    }
}

/// Ordered conversation sent to the faucet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatHistory(Vec<ChatMessage>);

impl ChatHistory {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.0.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize to the canonical JSON bytes that get encrypted
    pub fn to_canonical_json(&self) -> ProtocolResult<Vec<u8>> {
        for message in &self.0 {
            message.validate()?;
        }
        Ok(serde_json::to_vec(&self.0)?)
    }

    /// Parse a JSON array of messages
    pub fn from_json(data: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

impl From<Vec<ChatMessage>> for ChatHistory {
    fn from(messages: Vec<ChatMessage>) -> Self {
        Self(messages)
    }
}

impl FromIterator<ChatMessage> for ChatHistory {
    fn from_iter<I: IntoIterator<Item = ChatMessage>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Body of a successful `GET` on the public key endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerKeyResponse {
    /// Base64 of the server's encoded public key
    pub server_public_key: String,
}

/// Body `POST`ed to the submission endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaucetSubmission {
    /// Base64 of the framed encryption envelope
    pub encrypted_chat_history: String,
    /// Base64 of the server key the envelope was sealed to
    pub server_public_key: String,
    /// Base64 of the client's PEM public key, used to encrypt the reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_public_key: Option<String>,
}

/// Encrypted faucet reply, inline in the submission response or polled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaucetReply {
    /// Base64 of the framed encryption envelope
    pub encrypted_response: String,
}
