//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol. Outbound events use Serde's
//! tagged enum; inbound frames are decoded by hand so that an unknown or
//! missing `type` can be ignored while a missing field is still reported.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::types::{ConversationId, ParticipantId, ParticipantRole};

/// Acknowledgment text sent after a successful `auth`
pub const AUTH_SUCCESS_MESSAGE: &str = "Connected successfully";

/// `auth` payload: join a conversation as a participant
#[derive(Debug, Clone, PartialEq)]
pub struct AuthRequest {
    pub conversation_id: ConversationId,
    pub participant_id: ParticipantId,
    pub role: ParticipantRole,
}

/// `message` payload: a chat message for a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub conversation_id: ConversationId,
    pub sender_id: ParticipantId,
    pub body: String,
}

/// Client → Server message
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Auth(AuthRequest),
    Message(ChatRequest),
}

impl ClientMessage {
    /// Decode one text frame
    ///
    /// Returns `Ok(None)` when the `type` field is missing or not one this
    /// server understands; such frames are dropped without a reply.
    pub fn parse(text: &str) -> Result<Option<Self>, AppError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(fields) = value else {
            return Err(AppError::InvalidField {
                field: "frame",
                reason: "expected a JSON object".to_string(),
            });
        };

        let msg = match fields.get("type").and_then(Value::as_str) {
            Some("auth") => ClientMessage::Auth(AuthRequest {
                conversation_id: required(&fields, "queryId")?,
                participant_id: required(&fields, "userId")?,
                role: required(&fields, "userType")?,
            }),
            Some("message") => ClientMessage::Message(ChatRequest {
                conversation_id: required(&fields, "queryId")?,
                sender_id: required(&fields, "userId")?,
                body: required(&fields, "message")?,
            }),
            _ => return Ok(None),
        };

        Ok(Some(msg))
    }
}

fn required<T: DeserializeOwned>(fields: &Map<String, Value>, field: &'static str) -> Result<T, AppError> {
    match fields.get(field) {
        None | Some(Value::Null) => Err(AppError::MissingField(field)),
        Some(value) => T::deserialize(value).map_err(|e| AppError::InvalidField {
            field,
            reason: e.to_string(),
        }),
    }
}

/// Server → Client message
///
/// All messages from server to client. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// `auth` accepted
    AuthSuccess { message: String },
    /// Chat message from a peer
    Message {
        sender_id: ParticipantId,
        message: String,
        created_at: DateTime<Utc>,
    },
    /// Error occurred while handling a frame from this client
    Error { message: String },
}

impl ServerMessage {
    pub fn auth_success() -> Self {
        ServerMessage::AuthSuccess {
            message: AUTH_SUCCESS_MESSAGE.to_string(),
        }
    }
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        ServerMessage::Error {
            message: err.to_string(),
        }
    }
}
