//! Message model: content, reply references, and reactions

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::{ChatId, MessageId, Timestamp, UserId};
use crate::MAX_MESSAGE_LENGTH;

/// Message content kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    File,
}

impl Default for MessageType {
    fn default() -> Self {
        Self::Text
    }
}

/// Attachment metadata for image/file messages
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileInfo {
    /// Original file name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type
    pub mime_type: String,
    /// Download URL
    pub url: String,
}

/// Denormalized reference to a replied-to message
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplyRef {
    /// Replied-to message
    pub message_id: MessageId,
    /// Snippet of the replied-to content, for rendering without a lookup
    pub snippet: String,
}

impl ReplyRef {
    const SNIPPET_LENGTH: usize = 80;

    /// Build a reference to a message, truncating its content to a snippet
    pub fn to_message(message: &Message) -> Self {
        let snippet = message.content.chars().take(Self::SNIPPET_LENGTH).collect();
        Self {
            message_id: message.id.clone(),
            snippet,
        }
    }
}

/// A single emoji reaction on a message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    /// Reacting user
    pub user_id: UserId,
    /// Emoji string
    pub emoji: String,
    /// When the reaction was added
    pub reacted_at: Timestamp,
}

/// A chat message
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Message ID
    pub id: MessageId,
    /// Owning chat
    pub chat_id: ChatId,
    /// Sender reference
    pub sender_id: UserId,
    /// Content (text, or caption for attachments)
    pub content: String,
    /// Content kind
    pub message_type: MessageType,
    /// Attachment metadata, for image/file messages
    pub file_info: Option<FileInfo>,
    /// Whether the counterpart has read the message
    pub read: bool,
    /// Whether the message was edited
    pub edited: bool,
    /// Last edit time
    pub edited_at: Option<Timestamp>,
    /// Reply reference, if this message replies to another
    pub reply_to: Option<ReplyRef>,
    /// Reactions, unique per (user, emoji)
    pub reactions: Vec<Reaction>,
    /// Creation time
    pub created_at: Timestamp,
}

impl Message {
    /// Create a new message
    pub fn new(
        chat_id: ChatId,
        sender_id: UserId,
        content: impl Into<String>,
        message_type: MessageType,
    ) -> Result<Self> {
        let content = content.into();
        if content.is_empty() {
            return Err(CoreError::Validation("message content is empty".to_string()));
        }
        if content.len() > MAX_MESSAGE_LENGTH {
            return Err(CoreError::Validation(format!(
                "message content exceeds {} characters",
                MAX_MESSAGE_LENGTH
            )));
        }
        Ok(Self {
            id: MessageId::new(),
            chat_id,
            sender_id,
            content,
            message_type,
            file_info: None,
            read: false,
            edited: false,
            edited_at: None,
            reply_to: None,
            reactions: Vec::new(),
            created_at: Timestamp::now(),
        })
    }

    /// Create a text message
    pub fn text(chat_id: ChatId, sender_id: UserId, content: impl Into<String>) -> Result<Self> {
        Self::new(chat_id, sender_id, content, MessageType::Text)
    }

    /// Attach a reply reference
    pub fn with_reply(mut self, reply: ReplyRef) -> Self {
        self.reply_to = Some(reply);
        self
    }

    /// Replace the content, marking the message edited
    pub fn edit(&mut self, content: impl Into<String>) -> Result<()> {
        let content = content.into();
        if content.is_empty() {
            return Err(CoreError::Validation("message content is empty".to_string()));
        }
        self.content = content;
        self.edited = true;
        self.edited_at = Some(Timestamp::now());
        Ok(())
    }

    /// Add a reaction; idempotent per (user, emoji)
    pub fn add_reaction(&mut self, user_id: UserId, emoji: impl Into<String>) -> Option<&Reaction> {
        let emoji = emoji.into();
        if self
            .reactions
            .iter()
            .any(|r| r.user_id == user_id && r.emoji == emoji)
        {
            return None;
        }
        self.reactions.push(Reaction {
            user_id,
            emoji,
            reacted_at: Timestamp::now(),
        });
        self.reactions.last()
    }

    /// Remove a reaction by (user, emoji); returns whether one was removed
    pub fn remove_reaction(&mut self, user_id: &UserId, emoji: &str) -> bool {
        let before = self.reactions.len();
        self.reactions
            .retain(|r| !(r.user_id == *user_id && r.emoji == emoji));
        self.reactions.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> Message {
        Message::text(ChatId::new(), UserId::from_string("a"), "hello").unwrap()
    }

    #[test]
    fn test_empty_content_rejected() {
        assert!(Message::text(ChatId::new(), UserId::from_string("a"), "").is_err());
    }

    #[test]
    fn test_oversized_content_rejected() {
        let big = "x".repeat(MAX_MESSAGE_LENGTH + 1);
        assert!(Message::text(ChatId::new(), UserId::from_string("a"), big).is_err());
    }

    #[test]
    fn test_edit_sets_flags() {
        let mut m = message();
        m.edit("revised").unwrap();
        assert_eq!(m.content, "revised");
        assert!(m.edited);
        assert!(m.edited_at.is_some());
    }

    #[test]
    fn test_reaction_idempotent_per_user_emoji() {
        let mut m = message();
        let u = UserId::from_string("b");
        assert!(m.add_reaction(u.clone(), "🔥").is_some());
        assert!(m.add_reaction(u.clone(), "🔥").is_none());
        assert_eq!(m.reactions.len(), 1);

        // Same emoji from another user is a distinct reaction
        assert!(m.add_reaction(UserId::from_string("c"), "🔥").is_some());
        assert_eq!(m.reactions.len(), 2);
    }

    #[test]
    fn test_reaction_removal() {
        let mut m = message();
        let u = UserId::from_string("b");
        m.add_reaction(u.clone(), "🔥");
        assert!(m.remove_reaction(&u, "🔥"));
        assert!(!m.remove_reaction(&u, "🔥"));
    }

    #[test]
    fn test_reply_snippet_truncated() {
        let long = "y".repeat(200);
        let original = Message::text(ChatId::new(), UserId::from_string("a"), long).unwrap();
        let reply = ReplyRef::to_message(&original);
        assert_eq!(reply.snippet.chars().count(), 80);
        assert_eq!(reply.message_id, original.id);
    }
}
