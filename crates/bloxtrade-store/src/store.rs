//! Storage trait for chats and messages

use bloxtrade_core::{Chat, ChatId, Message, MessageId, Result, UserId};

/// Statistics over the stored data
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of chats, including soft-deleted ones
    pub chat_count: usize,
    /// Number of stored messages
    pub message_count: usize,
}

/// Aggregate unread state for one user
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnreadTotal {
    /// Sum of unread counters across all active chats
    pub total: u64,
    /// Number of chats with at least one unread message
    pub chat_count: usize,
}

/// Chat storage trait
///
/// Stands in for the external document database. Implementations must be
/// safe to share across request handlers.
pub trait ChatStore: Send + Sync {
    /// Insert a new chat
    fn insert_chat(&self, chat: Chat) -> Result<()>;

    /// Fetch a chat by id
    fn chat(&self, id: &ChatId) -> Result<Option<Chat>>;

    /// Replace a stored chat
    fn update_chat(&self, chat: Chat) -> Result<()>;

    /// Find an active direct chat by its unordered pair key
    fn find_direct(&self, pair_key: &str) -> Result<Option<Chat>>;

    /// Active chats the user actively participates in, most recent
    /// activity first, truncated to `limit`
    fn chats_for_user(&self, user_id: &UserId, limit: usize) -> Result<Vec<Chat>>;

    /// Append a message to a chat
    fn append_message(&self, message: Message) -> Result<()>;

    /// Fetch a single message
    fn message(&self, chat_id: &ChatId, message_id: &MessageId) -> Result<Option<Message>>;

    /// The most recent `limit` messages of a chat, in chronological order
    fn messages(&self, chat_id: &ChatId, limit: usize) -> Result<Vec<Message>>;

    /// Replace a stored message
    fn update_message(&self, message: Message) -> Result<()>;

    /// Delete a message; returns whether one existed
    fn remove_message(&self, chat_id: &ChatId, message_id: &MessageId) -> Result<bool>;

    /// Increment the unread counter of `user_id` in `chat_id`
    fn increment_unread(&self, chat_id: &ChatId, user_id: &UserId) -> Result<()>;

    /// Reset the unread counter of `user_id` in `chat_id`, returning the
    /// prior value
    fn reset_unread(&self, chat_id: &ChatId, user_id: &UserId) -> Result<u32>;

    /// Aggregate unread state for a user across all active chats
    fn total_unread(&self, user_id: &UserId) -> Result<UnreadTotal>;

    /// Storage statistics
    fn stats(&self) -> Result<StoreStats>;
}
