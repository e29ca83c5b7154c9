//! Error types for BloxTrade core

use thiserror::Error;

use crate::types::{ChatId, MessageId, UserId};

/// Result type alias
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error types
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed identifier
    #[error("Invalid id: {0}")]
    InvalidId(String),

    /// Chat not found
    #[error("Chat not found: {0}")]
    ChatNotFound(ChatId),

    /// Message not found
    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    /// Caller is not an active participant of the chat
    #[error("User {0} is not an active participant")]
    NotParticipant(UserId),

    /// Caller lacks the admin role required for the operation
    #[error("User {0} is not an admin")]
    NotAdmin(UserId),

    /// Removing or demoting the last active admin
    #[error("User {0} is the last admin of the group")]
    LastAdmin(UserId),

    /// Field validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Conflicting state (duplicate participant, self-chat)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller may not perform the operation (e.g. editing another user's
    /// message)
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
