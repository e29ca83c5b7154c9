//! In-memory chat store

use std::collections::HashMap;
use parking_lot::RwLock;
use tracing::debug;

use bloxtrade_core::{Chat, ChatId, CoreError, Message, MessageId, Result, UserId};

use crate::store::{ChatStore, StoreStats, UnreadTotal};

#[derive(Default)]
struct Inner {
    chats: HashMap<ChatId, Chat>,
    /// Unordered-pair key -> direct chat id
    direct_index: HashMap<String, ChatId>,
    /// Chat id -> messages in send order
    messages: HashMap<ChatId, Vec<Message>>,
}

/// In-memory [`ChatStore`] implementation
#[derive(Default)]
pub struct MemoryChatStore {
    inner: RwLock<Inner>,
}

impl MemoryChatStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatStore for MemoryChatStore {
    fn insert_chat(&self, chat: Chat) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(key) = chat.pair_key() {
            inner.direct_index.insert(key, chat.id.clone());
        }
        debug!(chat_id = %chat.id, "storing chat");
        inner.messages.entry(chat.id.clone()).or_default();
        inner.chats.insert(chat.id.clone(), chat);
        Ok(())
    }

    fn chat(&self, id: &ChatId) -> Result<Option<Chat>> {
        Ok(self.inner.read().chats.get(id).cloned())
    }

    fn update_chat(&self, chat: Chat) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.chats.contains_key(&chat.id) {
            return Err(CoreError::ChatNotFound(chat.id.clone()));
        }
        inner.chats.insert(chat.id.clone(), chat);
        Ok(())
    }

    fn find_direct(&self, pair_key: &str) -> Result<Option<Chat>> {
        let inner = self.inner.read();
        Ok(inner
            .direct_index
            .get(pair_key)
            .and_then(|id| inner.chats.get(id))
            .filter(|c| c.is_active)
            .cloned())
    }

    fn chats_for_user(&self, user_id: &UserId, limit: usize) -> Result<Vec<Chat>> {
        let inner = self.inner.read();
        let mut chats: Vec<Chat> = inner
            .chats
            .values()
            .filter(|c| c.is_active && c.is_active_participant(user_id))
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        chats.truncate(limit);
        Ok(chats)
    }

    fn append_message(&self, message: Message) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.chats.contains_key(&message.chat_id) {
            return Err(CoreError::ChatNotFound(message.chat_id.clone()));
        }
        debug!(chat_id = %message.chat_id, message_id = %message.id, "storing message");
        inner
            .messages
            .entry(message.chat_id.clone())
            .or_default()
            .push(message);
        Ok(())
    }

    fn message(&self, chat_id: &ChatId, message_id: &MessageId) -> Result<Option<Message>> {
        let inner = self.inner.read();
        Ok(inner
            .messages
            .get(chat_id)
            .and_then(|msgs| msgs.iter().find(|m| &m.id == message_id))
            .cloned())
    }

    fn messages(&self, chat_id: &ChatId, limit: usize) -> Result<Vec<Message>> {
        let inner = self.inner.read();
        let msgs = inner.messages.get(chat_id).map(Vec::as_slice).unwrap_or(&[]);
        let start = msgs.len().saturating_sub(limit);
        Ok(msgs[start..].to_vec())
    }

    fn update_message(&self, message: Message) -> Result<()> {
        let mut inner = self.inner.write();
        let msgs = inner
            .messages
            .get_mut(&message.chat_id)
            .ok_or_else(|| CoreError::ChatNotFound(message.chat_id.clone()))?;
        let slot = msgs
            .iter_mut()
            .find(|m| m.id == message.id)
            .ok_or_else(|| CoreError::MessageNotFound(message.id.clone()))?;
        *slot = message;
        Ok(())
    }

    fn remove_message(&self, chat_id: &ChatId, message_id: &MessageId) -> Result<bool> {
        let mut inner = self.inner.write();
        let Some(msgs) = inner.messages.get_mut(chat_id) else {
            return Ok(false);
        };
        let before = msgs.len();
        msgs.retain(|m| &m.id != message_id);
        Ok(msgs.len() != before)
    }

    fn increment_unread(&self, chat_id: &ChatId, user_id: &UserId) -> Result<()> {
        let mut inner = self.inner.write();
        let chat = inner
            .chats
            .get_mut(chat_id)
            .ok_or_else(|| CoreError::ChatNotFound(chat_id.clone()))?;
        chat.increment_unread(user_id);
        Ok(())
    }

    fn reset_unread(&self, chat_id: &ChatId, user_id: &UserId) -> Result<u32> {
        let mut inner = self.inner.write();
        let chat = inner
            .chats
            .get_mut(chat_id)
            .ok_or_else(|| CoreError::ChatNotFound(chat_id.clone()))?;
        Ok(chat.reset_unread(user_id))
    }

    fn total_unread(&self, user_id: &UserId) -> Result<UnreadTotal> {
        let inner = self.inner.read();
        let mut total = UnreadTotal::default();
        for chat in inner.chats.values() {
            if !chat.is_active || !chat.is_active_participant(user_id) {
                continue;
            }
            let count = chat.unread_for(user_id);
            if count > 0 {
                total.total += u64::from(count);
                total.chat_count += 1;
            }
        }
        Ok(total)
    }

    fn stats(&self) -> Result<StoreStats> {
        let inner = self.inner.read();
        Ok(StoreStats {
            chat_count: inner.chats.len(),
            message_count: inner.messages.values().map(Vec::len).sum(),
        })
    }
}
