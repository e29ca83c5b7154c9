//! Chat service core logic
//!
//! Orchestrates the store and the realtime hub: every mutation persists
//! first, then fans out the corresponding event to the chat room and, for
//! new messages, account-wide notifications to participants who are not
//! currently viewing the chat.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use bloxtrade_core::{
    Chat, ChatId, ChatType, CoreError, FileInfo, Message, MessageId, MessageNotification,
    MessageType, ParticipantRole, RealtimeEvent, ReplyRef, Result, UserId,
};
use bloxtrade_realtime::RealtimeHub;
use bloxtrade_store::{ChatStore, UnreadTotal};

/// Input for sending a message
#[derive(Clone, Debug)]
pub struct SendMessage {
    /// Message content
    pub content: String,
    /// Content kind
    pub message_type: MessageType,
    /// Attachment metadata for image/file messages
    pub file_info: Option<FileInfo>,
    /// Message being replied to
    pub reply_to: Option<MessageId>,
}

impl SendMessage {
    /// Plain text message
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            message_type: MessageType::Text,
            file_info: None,
            reply_to: None,
        }
    }

    /// Attach a reply target
    pub fn replying_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}

/// Group metadata update
#[derive(Clone, Debug, Default)]
pub struct GroupUpdate {
    /// New display name
    pub name: Option<String>,
    /// New avatar URL
    pub avatar_url: Option<String>,
    /// New member-invite setting
    pub allow_member_invites: Option<bool>,
}

/// Chat service
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    hub: Arc<RealtimeHub>,
}

impl ChatService {
    /// Create a chat service over a store and a realtime hub
    pub fn new(store: Arc<dyn ChatStore>, hub: Arc<RealtimeHub>) -> Self {
        Self { store, hub }
    }

    /// The realtime hub clients connect through
    pub fn hub(&self) -> &Arc<RealtimeHub> {
        &self.hub
    }

    /// The caller's chats, most recent activity first
    pub fn list_chats(&self, caller: &UserId, limit: usize) -> Result<Vec<Chat>> {
        self.store.chats_for_user(caller, limit)
    }

    /// Fetch a chat, enforcing that the caller is an active participant
    pub fn get_chat(&self, caller: &UserId, chat_id: &ChatId) -> Result<Chat> {
        let chat = self
            .store
            .chat(chat_id)?
            .filter(|c| c.is_active)
            .ok_or_else(|| CoreError::ChatNotFound(chat_id.clone()))?;
        if !chat.is_active_participant(caller) {
            return Err(CoreError::NotParticipant(caller.clone()));
        }
        Ok(chat)
    }

    /// Find or create the direct chat between the caller and another user
    ///
    /// Idempotent on the unordered user pair; the second create returns the
    /// existing chat. Returns whether a chat was created.
    #[instrument(skip(self))]
    pub fn create_direct(&self, caller: &UserId, other: &UserId) -> Result<(Chat, bool)> {
        let key = Chat::direct_pair_key(caller, other);
        if caller == other {
            return Err(CoreError::Validation(
                "cannot create a direct chat with yourself".to_string(),
            ));
        }
        if let Some(existing) = self.store.find_direct(&key)? {
            debug!(chat_id = %existing.id, "direct chat already exists");
            return Ok((existing, false));
        }
        let chat = Chat::direct(caller.clone(), other.clone())?;
        self.store.insert_chat(chat.clone())?;
        info!(chat_id = %chat.id, "created direct chat");
        Ok((chat, true))
    }

    /// Create a group chat; the caller becomes its first admin
    #[instrument(skip(self, participant_ids))]
    pub fn create_group(
        &self,
        caller: &UserId,
        name: &str,
        participant_ids: Vec<UserId>,
    ) -> Result<Chat> {
        let chat = Chat::group(caller.clone(), participant_ids, name)?;
        self.store.insert_chat(chat.clone())?;
        info!(chat_id = %chat.id, members = chat.participants.len(), "created group chat");
        Ok(chat)
    }

    /// Update group metadata; admin-only
    pub fn update_group(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        update: GroupUpdate,
    ) -> Result<Chat> {
        let mut chat = self.get_chat(caller, chat_id)?;
        if chat.chat_type != ChatType::Group {
            return Err(CoreError::Validation(
                "direct chats have no editable metadata".to_string(),
            ));
        }
        if !chat.is_admin(caller) {
            return Err(CoreError::NotAdmin(caller.clone()));
        }
        if let Some(name) = update.name {
            if name.is_empty() {
                return Err(CoreError::Validation("group name is empty".to_string()));
            }
            chat.name = Some(name);
        }
        if let Some(url) = update.avatar_url {
            chat.avatar_url = Some(url);
        }
        if let Some(allow) = update.allow_member_invites {
            chat.settings.allow_member_invites = allow;
        }
        self.store.update_chat(chat.clone())?;
        Ok(chat)
    }

    /// Soft-delete a chat
    ///
    /// Direct chats: any active participant. Group chats: admin only.
    #[instrument(skip(self))]
    pub fn delete_chat(&self, caller: &UserId, chat_id: &ChatId) -> Result<()> {
        let mut chat = self.get_chat(caller, chat_id)?;
        if chat.chat_type == ChatType::Group && !chat.is_admin(caller) {
            return Err(CoreError::NotAdmin(caller.clone()));
        }
        chat.is_active = false;
        self.store.update_chat(chat)?;
        info!(chat_id = %chat_id, "chat soft-deleted");
        Ok(())
    }

    /// Add a participant to a group chat
    ///
    /// Admins always may; members may when the chat allows member invites.
    pub fn add_participant(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        user_id: UserId,
    ) -> Result<Chat> {
        let mut chat = self.get_chat(caller, chat_id)?;
        if chat.chat_type != ChatType::Group {
            return Err(CoreError::Validation(
                "cannot add participants to a direct chat".to_string(),
            ));
        }
        if !chat.is_admin(caller) && !chat.settings.allow_member_invites {
            return Err(CoreError::NotAdmin(caller.clone()));
        }
        chat.add_participant(user_id)?;
        self.store.update_chat(chat.clone())?;
        Ok(chat)
    }

    /// Soft-remove a participant
    ///
    /// Admins may remove anyone but the last admin; any member may remove
    /// themselves ("leave"). Remaining viewers of a group chat are notified.
    #[instrument(skip(self))]
    pub fn remove_participant(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        user_id: &UserId,
    ) -> Result<Chat> {
        let mut chat = self.get_chat(caller, chat_id)?;
        if caller != user_id && !chat.is_admin(caller) {
            return Err(CoreError::NotAdmin(caller.clone()));
        }
        chat.remove_participant(user_id)?;
        self.store.update_chat(chat.clone())?;

        if chat.chat_type == ChatType::Group {
            self.hub.broadcast_to_chat(
                chat_id,
                &RealtimeEvent::UserLeftGroup {
                    chat_id: chat_id.clone(),
                    user_id: user_id.clone(),
                },
            );
        }
        info!(chat_id = %chat_id, user = %user_id, "participant removed");
        Ok(chat)
    }

    /// Change a participant's role; admin-only
    pub fn set_role(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        user_id: &UserId,
        role: ParticipantRole,
    ) -> Result<Chat> {
        let mut chat = self.get_chat(caller, chat_id)?;
        if chat.chat_type != ChatType::Group {
            return Err(CoreError::Validation(
                "direct chats have no roles".to_string(),
            ));
        }
        if !chat.is_admin(caller) {
            return Err(CoreError::NotAdmin(caller.clone()));
        }
        chat.set_role(user_id, role)?;
        self.store.update_chat(chat.clone())?;
        Ok(chat)
    }

    /// The most recent messages of a chat, oldest first
    ///
    /// Opening a chat this way resets the caller's unread counter and
    /// stamps their last-seen time.
    pub fn list_messages(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let mut chat = self.get_chat(caller, chat_id)?;
        let cleared = chat.reset_unread(caller);
        chat.touch_seen(caller);
        self.store.update_chat(chat)?;
        if cleared > 0 {
            debug!(chat_id = %chat_id, user = %caller, cleared, "unread counter reset on open");
        }
        self.store.messages(chat_id, limit)
    }

    /// Send a message
    ///
    /// Persists the message, refreshes the chat's last-message cache,
    /// increments unread counters for participants not viewing the chat,
    /// and fans out `new_message` plus per-user `message_notification`s.
    #[instrument(skip(self, input))]
    pub fn send_message(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        input: SendMessage,
    ) -> Result<Message> {
        let mut chat = self.get_chat(caller, chat_id)?;

        let mut message = Message::new(
            chat_id.clone(),
            caller.clone(),
            input.content,
            input.message_type,
        )?;
        message.file_info = input.file_info;
        if let Some(reply_id) = input.reply_to {
            let original = self
                .store
                .message(chat_id, &reply_id)?
                .ok_or_else(|| CoreError::MessageNotFound(reply_id.clone()))?;
            message = message.with_reply(ReplyRef::to_message(&original));
        }

        self.store.append_message(message.clone())?;
        chat.record_message(&message);
        self.store.update_chat(chat.clone())?;

        let viewers = self.hub.chat_viewers(chat_id);
        for participant in chat.active_participants() {
            if participant.user_id == *caller || viewers.contains(&participant.user_id) {
                continue;
            }
            self.store.increment_unread(chat_id, &participant.user_id)?;
            self.hub.notify_user(
                &participant.user_id,
                &RealtimeEvent::MessageNotification(MessageNotification {
                    chat_id: chat_id.clone(),
                    message_id: message.id.clone(),
                    sender_id: caller.clone(),
                    preview: message.content.chars().take(120).collect(),
                    sent_at: message.created_at,
                }),
            );
        }
        self.hub
            .broadcast_to_chat(chat_id, &RealtimeEvent::NewMessage(message.clone()));

        debug!(chat_id = %chat_id, message_id = %message.id, "message sent");
        Ok(message)
    }

    /// Edit a message's content; sender-only
    pub fn edit_message(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        message_id: &MessageId,
        content: &str,
    ) -> Result<Message> {
        self.get_chat(caller, chat_id)?;
        let mut message = self
            .store
            .message(chat_id, message_id)?
            .ok_or_else(|| CoreError::MessageNotFound(message_id.clone()))?;
        if message.sender_id != *caller {
            return Err(CoreError::PermissionDenied(
                "only the sender may edit a message".to_string(),
            ));
        }
        message.edit(content)?;
        self.store.update_message(message.clone())?;

        self.hub.broadcast_to_chat(
            chat_id,
            &RealtimeEvent::MessageEdited {
                message_id: message.id.clone(),
                content: message.content.clone(),
                edited: message.edited,
                edited_at: message.edited_at,
            },
        );
        Ok(message)
    }

    /// Delete a message; sender-only
    pub fn delete_message(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        message_id: &MessageId,
    ) -> Result<()> {
        self.get_chat(caller, chat_id)?;
        let message = self
            .store
            .message(chat_id, message_id)?
            .ok_or_else(|| CoreError::MessageNotFound(message_id.clone()))?;
        if message.sender_id != *caller {
            return Err(CoreError::PermissionDenied(
                "only the sender may delete a message".to_string(),
            ));
        }
        self.store.remove_message(chat_id, message_id)?;

        self.hub.broadcast_to_chat(
            chat_id,
            &RealtimeEvent::MessageDeleted {
                message_id: message_id.clone(),
                chat_id: chat_id.clone(),
            },
        );
        Ok(())
    }

    /// Add a reaction to a message; idempotent per (user, emoji)
    pub fn add_reaction(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        message_id: &MessageId,
        emoji: &str,
    ) -> Result<Message> {
        if emoji.is_empty() {
            return Err(CoreError::Validation("emoji is empty".to_string()));
        }
        self.get_chat(caller, chat_id)?;
        let mut message = self
            .store
            .message(chat_id, message_id)?
            .ok_or_else(|| CoreError::MessageNotFound(message_id.clone()))?;

        let added = message.add_reaction(caller.clone(), emoji).cloned();
        if let Some(reaction) = added {
            self.store.update_message(message.clone())?;
            self.hub.broadcast_to_chat(
                chat_id,
                &RealtimeEvent::ReactionAdded {
                    message_id: message_id.clone(),
                    reaction,
                },
            );
        }
        Ok(message)
    }

    /// Remove the caller's reaction from a message
    pub fn remove_reaction(
        &self,
        caller: &UserId,
        chat_id: &ChatId,
        message_id: &MessageId,
        emoji: &str,
    ) -> Result<Message> {
        self.get_chat(caller, chat_id)?;
        let mut message = self
            .store
            .message(chat_id, message_id)?
            .ok_or_else(|| CoreError::MessageNotFound(message_id.clone()))?;

        if message.remove_reaction(caller, emoji) {
            self.store.update_message(message.clone())?;
            self.hub.broadcast_to_chat(
                chat_id,
                &RealtimeEvent::ReactionRemoved {
                    message_id: message_id.clone(),
                    user_id: caller.clone(),
                    emoji: emoji.to_string(),
                },
            );
        }
        Ok(message)
    }

    /// Aggregate unread state for the caller
    pub fn total_unread(&self, caller: &UserId) -> Result<UnreadTotal> {
        self.store.total_unread(caller)
    }

    /// Broadcast a typing indicator to the chat's room
    pub fn typing(&self, caller: &UserId, chat_id: &ChatId, started: bool) -> Result<()> {
        self.get_chat(caller, chat_id)?;
        let event = if started {
            RealtimeEvent::TypingStarted {
                chat_id: chat_id.clone(),
                user_id: caller.clone(),
            }
        } else {
            RealtimeEvent::TypingStopped {
                chat_id: chat_id.clone(),
                user_id: caller.clone(),
            }
        };
        self.hub.broadcast_to_chat(chat_id, &event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloxtrade_store::MemoryChatStore;

    fn user(s: &str) -> UserId {
        UserId::from_string(s)
    }

    fn service() -> ChatService {
        ChatService::new(
            Arc::new(MemoryChatStore::new()),
            Arc::new(RealtimeHub::new()),
        )
    }

    #[test]
    fn test_create_direct_idempotent() {
        let svc = service();
        let (first, created) = svc.create_direct(&user("u1"), &user("u2")).unwrap();
        assert!(created);
        // Reversed pair resolves to the same chat
        let (second, created) = svc.create_direct(&user("u2"), &user("u1")).unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_self_direct_rejected() {
        let svc = service();
        assert!(matches!(
            svc.create_direct(&user("u1"), &user("u1")),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_group_minimum_participants() {
        let svc = service();
        assert!(svc.create_group(&user("u1"), "Trades", vec![user("u2")]).is_err());
        let chat = svc
            .create_group(&user("u1"), "Trades", vec![user("u2"), user("u3")])
            .unwrap();
        assert!(chat.is_admin(&user("u1")));
    }

    #[test]
    fn test_detail_fetch_requires_participant() {
        let svc = service();
        let (chat, _) = svc.create_direct(&user("u1"), &user("u2")).unwrap();
        assert!(matches!(
            svc.get_chat(&user("intruder"), &chat.id),
            Err(CoreError::NotParticipant(_))
        ));
        assert!(matches!(
            svc.get_chat(&user("u1"), &ChatId::new()),
            Err(CoreError::ChatNotFound(_))
        ));
    }

    #[test]
    fn test_send_updates_last_message_and_unread() {
        let svc = service();
        let (chat, _) = svc.create_direct(&user("u1"), &user("u2")).unwrap();
        let message = svc
            .send_message(&user("u1"), &chat.id, SendMessage::text("hello"))
            .unwrap();

        let fetched = svc.get_chat(&user("u2"), &chat.id).unwrap();
        let last = fetched.last_message.clone().unwrap();
        assert_eq!(last.content, "hello");
        assert_eq!(last.message_id, message.id);
        assert_eq!(fetched.message_count, 1);
        // u2 was not viewing the chat
        assert_eq!(fetched.unread_for(&user("u2")), 1);
        assert_eq!(fetched.unread_for(&user("u1")), 0);
    }

    #[test]
    fn test_viewing_participant_gets_no_unread() {
        let svc = service();
        let (chat, _) = svc.create_direct(&user("u1"), &user("u2")).unwrap();

        let conn = svc.hub().connect(user("u2"));
        svc.hub().join_chat(conn.id, &chat.id);
        svc.send_message(&user("u1"), &chat.id, SendMessage::text("hi"))
            .unwrap();

        let fetched = svc.get_chat(&user("u2"), &chat.id).unwrap();
        assert_eq!(fetched.unread_for(&user("u2")), 0);
    }

    #[test]
    fn test_opening_chat_resets_unread() {
        let svc = service();
        let (chat, _) = svc.create_direct(&user("u1"), &user("u2")).unwrap();
        svc.send_message(&user("u1"), &chat.id, SendMessage::text("one"))
            .unwrap();
        svc.send_message(&user("u1"), &chat.id, SendMessage::text("two"))
            .unwrap();

        let total = svc.total_unread(&user("u2")).unwrap();
        assert_eq!(total.total, 2);
        assert_eq!(total.chat_count, 1);

        let messages = svc.list_messages(&user("u2"), &chat.id, 50).unwrap();
        assert_eq!(messages.len(), 2);

        let total = svc.total_unread(&user("u2")).unwrap();
        assert_eq!(total.total, 0);
        assert_eq!(total.chat_count, 0);
    }

    #[test]
    fn test_new_message_event_reaches_chat_room() {
        let svc = service();
        let (chat, _) = svc.create_direct(&user("u1"), &user("u2")).unwrap();

        let mut conn = svc.hub().connect(user("u2"));
        svc.hub().join_chat(conn.id, &chat.id);
        svc.send_message(&user("u1"), &chat.id, SendMessage::text("hello"))
            .unwrap();

        match conn.try_recv().unwrap() {
            RealtimeEvent::NewMessage(m) => {
                assert_eq!(m.content, "hello");
                assert_eq!(m.sender_id, user("u1"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_notification_reaches_user_room_when_not_viewing() {
        let svc = service();
        let (chat, _) = svc.create_direct(&user("u1"), &user("u2")).unwrap();

        // Connected, but not viewing the chat
        let mut conn = svc.hub().connect(user("u2"));
        svc.send_message(&user("u1"), &chat.id, SendMessage::text("ping"))
            .unwrap();

        match conn.try_recv().unwrap() {
            RealtimeEvent::MessageNotification(n) => {
                assert_eq!(n.chat_id, chat.id);
                assert_eq!(n.sender_id, user("u1"));
                assert_eq!(n.preview, "ping");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_edit_is_sender_only() {
        let svc = service();
        let (chat, _) = svc.create_direct(&user("u1"), &user("u2")).unwrap();
        let message = svc
            .send_message(&user("u1"), &chat.id, SendMessage::text("hello"))
            .unwrap();

        assert!(matches!(
            svc.edit_message(&user("u2"), &chat.id, &message.id, "hacked"),
            Err(CoreError::PermissionDenied(_))
        ));
        let edited = svc
            .edit_message(&user("u1"), &chat.id, &message.id, "hello!")
            .unwrap();
        assert!(edited.edited);
        assert_eq!(edited.content, "hello!");
    }

    #[test]
    fn test_reply_carries_snippet() {
        let svc = service();
        let (chat, _) = svc.create_direct(&user("u1"), &user("u2")).unwrap();
        let original = svc
            .send_message(&user("u1"), &chat.id, SendMessage::text("want to trade?"))
            .unwrap();
        let reply = svc
            .send_message(
                &user("u2"),
                &chat.id,
                SendMessage::text("sure").replying_to(original.id.clone()),
            )
            .unwrap();

        let reply_ref = reply.reply_to.unwrap();
        assert_eq!(reply_ref.message_id, original.id);
        assert_eq!(reply_ref.snippet, "want to trade?");
    }

    #[test]
    fn test_leave_broadcasts_user_left_group() {
        let svc = service();
        let chat = svc
            .create_group(&user("u1"), "Trades", vec![user("u2"), user("u3")])
            .unwrap();

        let mut conn = svc.hub().connect(user("u3"));
        svc.hub().join_chat(conn.id, &chat.id);

        svc.remove_participant(&user("u2"), &chat.id, &user("u2"))
            .unwrap();
        match conn.try_recv().unwrap() {
            RealtimeEvent::UserLeftGroup { user_id, .. } => assert_eq!(user_id, user("u2")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_last_admin_removal_rejected() {
        let svc = service();
        let chat = svc
            .create_group(&user("u1"), "Trades", vec![user("u2"), user("u3")])
            .unwrap();
        assert!(matches!(
            svc.remove_participant(&user("u1"), &chat.id, &user("u1")),
            Err(CoreError::LastAdmin(_))
        ));

        // Promote a second admin, then the original may leave
        svc.set_role(&user("u1"), &chat.id, &user("u2"), ParticipantRole::Admin)
            .unwrap();
        svc.remove_participant(&user("u1"), &chat.id, &user("u1"))
            .unwrap();
    }

    #[test]
    fn test_group_delete_is_admin_only() {
        let svc = service();
        let chat = svc
            .create_group(&user("u1"), "Trades", vec![user("u2"), user("u3")])
            .unwrap();
        assert!(matches!(
            svc.delete_chat(&user("u2"), &chat.id),
            Err(CoreError::NotAdmin(_))
        ));
        svc.delete_chat(&user("u1"), &chat.id).unwrap();
        assert!(matches!(
            svc.get_chat(&user("u1"), &chat.id),
            Err(CoreError::ChatNotFound(_))
        ));
    }

    #[test]
    fn test_member_invite_setting() {
        let svc = service();
        let chat = svc
            .create_group(&user("u1"), "Trades", vec![user("u2"), user("u3")])
            .unwrap();
        assert!(matches!(
            svc.add_participant(&user("u2"), &chat.id, user("u4")),
            Err(CoreError::NotAdmin(_))
        ));

        let update = GroupUpdate {
            allow_member_invites: Some(true),
            ..Default::default()
        };
        svc.update_group(&user("u1"), &chat.id, update).unwrap();
        svc.add_participant(&user("u2"), &chat.id, user("u4")).unwrap();
    }

    #[test]
    fn test_reaction_add_remove_broadcasts() {
        let svc = service();
        let (chat, _) = svc.create_direct(&user("u1"), &user("u2")).unwrap();
        let message = svc
            .send_message(&user("u1"), &chat.id, SendMessage::text("rate my offer"))
            .unwrap();

        let mut conn = svc.hub().connect(user("u1"));
        svc.hub().join_chat(conn.id, &chat.id);

        svc.add_reaction(&user("u2"), &chat.id, &message.id, "🔥")
            .unwrap();
        assert!(matches!(
            conn.try_recv().unwrap(),
            RealtimeEvent::ReactionAdded { .. }
        ));

        // Duplicate add is a no-op, no event
        svc.add_reaction(&user("u2"), &chat.id, &message.id, "🔥")
            .unwrap();
        assert!(conn.try_recv().is_none());

        svc.remove_reaction(&user("u2"), &chat.id, &message.id, "🔥")
            .unwrap();
        assert!(matches!(
            conn.try_recv().unwrap(),
            RealtimeEvent::ReactionRemoved { .. }
        ));
    }
}
