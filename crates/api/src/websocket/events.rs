//! Chat wire format
//!
//! The same JSON shape travels in both directions. Inbound payloads only
//! contribute `content`; every other field is stamped by the server.

use helpdesk_shared::{Identity, Role, TicketId};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A chat message as broadcast to every participant of a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub content: String,
    pub room: TicketId,
    pub username: String,
    pub user_role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ChatMessage {
    /// Build a message from client content and server-known author/room values
    pub fn stamped(content: String, room: TicketId, author: &Identity, now: OffsetDateTime) -> Self {
        Self {
            content,
            room,
            username: author.username.clone(),
            user_role: author.role,
            created_at: now,
        }
    }
}

/// Client payload. `room`, `username`, `userRole` and `createdAt` may be present
/// but are never read.
#[derive(Debug, Deserialize)]
pub struct InboundChat {
    pub content: String,
}

impl InboundChat {
    /// Parse a text frame. Empty or whitespace-only content is rejected.
    pub fn parse(text: &str) -> Result<Self, InboundError> {
        let inbound: InboundChat =
            serde_json::from_str(text).map_err(|e| InboundError::Malformed(e.to_string()))?;
        if inbound.content.trim().is_empty() {
            return Err(InboundError::EmptyContent);
        }
        Ok(inbound)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("Malformed chat payload: {0}")]
    Malformed(String),
    #[error("Chat message has no content")]
    EmptyContent,
}
