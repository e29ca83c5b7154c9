//! Core types for BloxTrade chat
//!
//! Shared data model for chats, messages, participants, and the realtime
//! event vocabulary. Consumed by the store, the realtime hub, the chat
//! service, and the client runtime.

pub mod chat;
pub mod error;
pub mod event;
pub mod message;
pub mod types;

pub use chat::{Chat, ChatSettings, ChatType, LastMessage, Participant, ParticipantRole};
pub use error::{CoreError, Result};
pub use event::{EventKind, MessageNotification, RealtimeEvent};
pub use message::{FileInfo, Message, MessageType, Reaction, ReplyRef};
pub use types::{ChatId, MessageId, Timestamp, UserId};

/// Maximum message content length in characters
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// Maximum group chat display name length
pub const MAX_CHAT_NAME_LENGTH: usize = 128;

/// Minimum invited participants for a group chat, besides the creator
pub const MIN_GROUP_PARTICIPANTS: usize = 2;
