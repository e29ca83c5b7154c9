//! Realtime event vocabulary
//!
//! Every event pushed over the realtime channel is one variant of
//! [`RealtimeEvent`]. Payloads are validated at the boundary by serde;
//! clients never see untyped data.

use serde::{Deserialize, Serialize};

use crate::message::{Message, Reaction};
use crate::types::{ChatId, MessageId, Timestamp, UserId};

/// Account-wide notification about a message in a chat the user is not
/// currently viewing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageNotification {
    /// Chat the message belongs to
    pub chat_id: ChatId,
    /// Message reference
    pub message_id: MessageId,
    /// Sender reference
    pub sender_id: UserId,
    /// Content preview
    pub preview: String,
    /// When the message was sent
    pub sent_at: Timestamp,
}

/// An event delivered over the realtime channel
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// A message was sent to a chat the client has joined
    NewMessage(Message),
    /// A message's content changed
    MessageEdited {
        message_id: MessageId,
        content: String,
        edited: bool,
        edited_at: Option<Timestamp>,
    },
    /// A message was deleted
    MessageDeleted {
        message_id: MessageId,
        chat_id: ChatId,
    },
    /// A reaction was added to a message
    ReactionAdded {
        message_id: MessageId,
        reaction: Reaction,
    },
    /// A reaction was removed from a message
    ReactionRemoved {
        message_id: MessageId,
        user_id: UserId,
        emoji: String,
    },
    /// A participant left or was removed from a group chat
    UserLeftGroup { chat_id: ChatId, user_id: UserId },
    /// Account-wide new-message notification
    MessageNotification(MessageNotification),
    /// A participant started typing
    TypingStarted { chat_id: ChatId, user_id: UserId },
    /// A participant stopped typing
    TypingStopped { chat_id: ChatId, user_id: UserId },
}

/// Discriminant of a realtime event, used for listener registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NewMessage,
    MessageEdited,
    MessageDeleted,
    ReactionAdded,
    ReactionRemoved,
    UserLeftGroup,
    MessageNotification,
    TypingStarted,
    TypingStopped,
}

impl RealtimeEvent {
    /// The event's discriminant
    pub fn kind(&self) -> EventKind {
        match self {
            Self::NewMessage(_) => EventKind::NewMessage,
            Self::MessageEdited { .. } => EventKind::MessageEdited,
            Self::MessageDeleted { .. } => EventKind::MessageDeleted,
            Self::ReactionAdded { .. } => EventKind::ReactionAdded,
            Self::ReactionRemoved { .. } => EventKind::ReactionRemoved,
            Self::UserLeftGroup { .. } => EventKind::UserLeftGroup,
            Self::MessageNotification(_) => EventKind::MessageNotification,
            Self::TypingStarted { .. } => EventKind::TypingStarted,
            Self::TypingStopped { .. } => EventKind::TypingStopped,
        }
    }

    /// Chat the event concerns, when it carries one
    pub fn chat_id(&self) -> Option<&ChatId> {
        match self {
            Self::NewMessage(m) => Some(&m.chat_id),
            Self::MessageDeleted { chat_id, .. }
            | Self::UserLeftGroup { chat_id, .. }
            | Self::TypingStarted { chat_id, .. }
            | Self::TypingStopped { chat_id, .. } => Some(chat_id),
            Self::MessageNotification(n) => Some(&n.chat_id),
            Self::MessageEdited { .. }
            | Self::ReactionAdded { .. }
            | Self::ReactionRemoved { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_tagging() {
        let event = RealtimeEvent::MessageDeleted {
            message_id: MessageId::from_string("m1"),
            chat_id: ChatId::from_string("c1"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "message_deleted");
        assert_eq!(json["data"]["message_id"], "m1");
        assert_eq!(json["data"]["chat_id"], "c1");
    }

    #[test]
    fn test_unknown_event_rejected() {
        let raw = r#"{"event":"mystery","data":{}}"#;
        assert!(serde_json::from_str::<RealtimeEvent>(raw).is_err());
    }

    #[test]
    fn test_event_kind_roundtrip() {
        let event = RealtimeEvent::TypingStarted {
            chat_id: ChatId::from_string("c1"),
            user_id: UserId::from_string("u1"),
        };
        assert_eq!(event.kind(), EventKind::TypingStarted);

        let json = serde_json::to_string(&event).unwrap();
        let back: RealtimeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), EventKind::TypingStarted);
    }
}
