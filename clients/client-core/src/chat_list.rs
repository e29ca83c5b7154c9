//! Chat list view state
//!
//! Mirrors the user's chat collection: most recent activity first, cached
//! last message, and a per-chat unread counter that only grows while the
//! chat is not the active one.

use bloxtrade_core::{Chat, ChatId, LastMessage, RealtimeEvent, UserId};

/// View state of the chat list screen
pub struct ChatList {
    user_id: UserId,
    chats: Vec<Chat>,
    active_chat: Option<ChatId>,
}

impl ChatList {
    /// Create an empty list for a user
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            chats: Vec::new(),
            active_chat: None,
        }
    }

    /// Replace the list with a REST-fetched page
    pub fn load(&mut self, mut chats: Vec<Chat>) {
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        self.chats = chats;
    }

    /// Chats, most recent activity first
    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    /// The chat currently open, if any
    pub fn active_chat(&self) -> Option<&ChatId> {
        self.active_chat.as_ref()
    }

    /// Unread count of one chat
    pub fn unread(&self, chat_id: &ChatId) -> u32 {
        self.chats
            .iter()
            .find(|c| c.id == *chat_id)
            .map(|c| c.unread_for(&self.user_id))
            .unwrap_or(0)
    }

    /// Open a chat: marks it active and zeroes its unread counter
    ///
    /// Returns the prior unread count so the owner can decrement the
    /// process-wide total by exactly that amount.
    pub fn open_chat(&mut self, chat_id: &ChatId) -> u32 {
        self.active_chat = Some(chat_id.clone());
        let user_id = self.user_id.clone();
        self.chats
            .iter_mut()
            .find(|c| c.id == *chat_id)
            .map(|c| c.reset_unread(&user_id))
            .unwrap_or(0)
    }

    /// Close the active chat (navigation back to the list)
    pub fn close_chat(&mut self) {
        self.active_chat = None;
    }

    /// Apply one realtime event to the list
    pub fn apply_event(&mut self, event: &RealtimeEvent) {
        match event {
            RealtimeEvent::NewMessage(message) => {
                let is_active = self.active_chat.as_ref() == Some(&message.chat_id);
                let own = message.sender_id == self.user_id;
                let user_id = self.user_id.clone();
                if let Some(chat) = self.chat_mut(&message.chat_id) {
                    chat.last_message = Some(LastMessage {
                        message_id: message.id.clone(),
                        sender_id: message.sender_id.clone(),
                        content: message.content.clone(),
                        sent_at: message.created_at,
                    });
                    chat.updated_at = message.created_at;
                    if !is_active && !own {
                        chat.increment_unread(&user_id);
                    }
                    self.bump_to_front(&message.chat_id);
                }
            }
            RealtimeEvent::MessageNotification(n) => {
                let is_active = self.active_chat.as_ref() == Some(&n.chat_id);
                let user_id = self.user_id.clone();
                if let Some(chat) = self.chat_mut(&n.chat_id) {
                    chat.last_message = Some(LastMessage {
                        message_id: n.message_id.clone(),
                        sender_id: n.sender_id.clone(),
                        content: n.preview.clone(),
                        sent_at: n.sent_at,
                    });
                    chat.updated_at = n.sent_at;
                    if !is_active {
                        chat.increment_unread(&user_id);
                    }
                    self.bump_to_front(&n.chat_id);
                }
            }
            RealtimeEvent::UserLeftGroup { chat_id, user_id } => {
                let left_is_me = *user_id == self.user_id;
                if left_is_me {
                    self.chats.retain(|c| c.id != *chat_id);
                } else if let Some(chat) = self.chat_mut(chat_id) {
                    if let Some(p) = chat
                        .participants
                        .iter_mut()
                        .find(|p| p.user_id == *user_id)
                    {
                        p.is_active = false;
                    }
                }
            }
            _ => {}
        }
    }

    fn chat_mut(&mut self, chat_id: &ChatId) -> Option<&mut Chat> {
        self.chats.iter_mut().find(|c| c.id == *chat_id)
    }

    fn bump_to_front(&mut self, chat_id: &ChatId) {
        if let Some(index) = self.chats.iter().position(|c| c.id == *chat_id) {
            let chat = self.chats.remove(index);
            self.chats.insert(0, chat);
        }
    }
}
