//! Chat window view state
//!
//! Reconciles a REST-fetched message page with incoming realtime events.
//! The message list holds each message id exactly once regardless of
//! duplicate deliveries; edits, deletions, and reactions apply in place
//! without reordering.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::debug;

use bloxtrade_core::{ChatId, Message, MessageId, RealtimeEvent, ReplyRef, UserId};

/// Load state of an open chat
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
}

/// A message composed for sending
#[derive(Clone, Debug, PartialEq)]
pub struct OutgoingMessage {
    /// Content to send
    pub content: String,
    /// Message being replied to, if reply composition was active
    pub reply_to: Option<MessageId>,
}

/// Typing debounce signal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypingSignal {
    /// Send `start_typing` to the chat room
    Started,
    /// Send `stop_typing` to the chat room
    Stopped,
}

/// Debounced typing indicator
///
/// Each input keystroke resets the quiesce timer; one second without
/// input produces a `Stopped` signal. The clock is passed in so tests
/// run without sleeping.
#[derive(Debug)]
pub struct TypingTracker {
    quiesce: Duration,
    deadline: Option<Instant>,
}

impl TypingTracker {
    /// Quiesce interval after the last keystroke
    pub const DEFAULT_QUIESCE: Duration = Duration::from_secs(1);

    /// Create a tracker with the default 1 second quiesce interval
    pub fn new() -> Self {
        Self::with_quiesce(Self::DEFAULT_QUIESCE)
    }

    /// Create a tracker with a custom quiesce interval
    pub fn with_quiesce(quiesce: Duration) -> Self {
        Self {
            quiesce,
            deadline: None,
        }
    }

    /// Record a keystroke; returns `Started` on the first one
    pub fn on_input(&mut self, now: Instant) -> Option<TypingSignal> {
        let started = self.deadline.is_none();
        self.deadline = Some(now + self.quiesce);
        started.then_some(TypingSignal::Started)
    }

    /// Check the timer; returns `Stopped` once the quiesce interval passed
    pub fn poll(&mut self, now: Instant) -> Option<TypingSignal> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                Some(TypingSignal::Stopped)
            }
            _ => None,
        }
    }

    /// Force-stop, e.g. when the composed message is sent
    pub fn stop(&mut self) -> Option<TypingSignal> {
        self.deadline.take().map(|_| TypingSignal::Stopped)
    }

    /// Whether a typing announcement is outstanding
    pub fn is_typing(&self) -> bool {
        self.deadline.is_some()
    }
}

impl Default for TypingTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// View state of one open chat
pub struct ChatWindow {
    chat_id: ChatId,
    state: LoadState,
    messages: Vec<Message>,
    reply_context: Option<ReplyRef>,
    typing_users: HashSet<UserId>,
}

impl ChatWindow {
    /// Create the window in the idle state
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            state: LoadState::Idle,
            messages: Vec::new(),
            reply_context: None,
            typing_users: HashSet::new(),
        }
    }

    /// The chat being viewed
    pub fn chat_id(&self) -> &ChatId {
        &self.chat_id
    }

    /// Current load state
    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Messages in chronological order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Users currently typing
    pub fn typing_users(&self) -> &HashSet<UserId> {
        &self.typing_users
    }

    /// Mark the REST fetch as in flight
    pub fn begin_load(&mut self) {
        self.state = LoadState::Loading;
    }

    /// Merge the REST-fetched page; events received while loading stay
    pub fn finish_load(&mut self, page: Vec<Message>) {
        // Page first, then anything realtime delivered in the meantime
        let pending = std::mem::take(&mut self.messages);
        self.messages = page;
        for message in pending {
            self.insert_message(message);
        }
        self.state = LoadState::Loaded;
    }

    /// Apply one realtime event to the view state
    pub fn apply_event(&mut self, event: &RealtimeEvent) {
        match event {
            RealtimeEvent::NewMessage(message) => {
                if message.chat_id == self.chat_id {
                    // The sender stopped typing by sending
                    self.typing_users.remove(&message.sender_id);
                    self.insert_message(message.clone());
                }
            }
            RealtimeEvent::MessageEdited {
                message_id,
                content,
                edited,
                edited_at,
            } => {
                if let Some(m) = self.message_mut(message_id) {
                    m.content = content.clone();
                    m.edited = *edited;
                    m.edited_at = *edited_at;
                }
            }
            RealtimeEvent::MessageDeleted { message_id, chat_id } => {
                if *chat_id == self.chat_id {
                    self.messages.retain(|m| m.id != *message_id);
                }
            }
            RealtimeEvent::ReactionAdded {
                message_id,
                reaction,
            } => {
                if let Some(m) = self.message_mut(message_id) {
                    let duplicate = m
                        .reactions
                        .iter()
                        .any(|r| r.user_id == reaction.user_id && r.emoji == reaction.emoji);
                    if !duplicate {
                        m.reactions.push(reaction.clone());
                    }
                }
            }
            RealtimeEvent::ReactionRemoved {
                message_id,
                user_id,
                emoji,
            } => {
                if let Some(m) = self.message_mut(message_id) {
                    m.reactions
                        .retain(|r| !(r.user_id == *user_id && r.emoji == *emoji));
                }
            }
            RealtimeEvent::TypingStarted { chat_id, user_id } => {
                if *chat_id == self.chat_id {
                    self.typing_users.insert(user_id.clone());
                }
            }
            RealtimeEvent::TypingStopped { chat_id, user_id } => {
                if *chat_id == self.chat_id {
                    self.typing_users.remove(user_id);
                }
            }
            RealtimeEvent::UserLeftGroup { .. } | RealtimeEvent::MessageNotification(_) => {}
        }
    }

    /// Begin composing a reply to a message
    pub fn set_reply(&mut self, message: &Message) {
        self.reply_context = Some(ReplyRef::to_message(message));
    }

    /// Drop the reply context without sending
    pub fn clear_reply(&mut self) {
        self.reply_context = None;
    }

    /// Reply currently being composed against
    pub fn reply_context(&self) -> Option<&ReplyRef> {
        self.reply_context.as_ref()
    }

    /// Compose the next outgoing message, consuming the reply context
    pub fn compose(&mut self, content: impl Into<String>) -> OutgoingMessage {
        OutgoingMessage {
            content: content.into(),
            reply_to: self.reply_context.take().map(|r| r.message_id),
        }
    }

    /// Messages grouped by calendar day for display
    pub fn grouped_by_date(&self) -> Vec<(NaiveDate, Vec<&Message>)> {
        let mut groups: Vec<(NaiveDate, Vec<&Message>)> = Vec::new();
        for message in &self.messages {
            let date = message.created_at.as_date();
            match groups.last_mut() {
                Some((day, msgs)) if *day == date => msgs.push(message),
                _ => groups.push((date, vec![message])),
            }
        }
        groups
    }

    fn message_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == *id)
    }

    fn insert_message(&mut self, message: Message) {
        if self.messages.iter().any(|m| m.id == message.id) {
            debug!(message_id = %message.id, "duplicate message delivery ignored");
            return;
        }
        self.messages.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloxtrade_core::Timestamp;

    fn user(s: &str) -> UserId {
        UserId::from_string(s)
    }

    fn message(chat_id: &ChatId, content: &str) -> Message {
        Message::text(chat_id.clone(), user("a"), content).unwrap()
    }

    #[test]
    fn test_load_state_machine() {
        let chat_id = ChatId::new();
        let mut window = ChatWindow::new(chat_id.clone());
        assert_eq!(window.state(), LoadState::Idle);

        window.begin_load();
        assert_eq!(window.state(), LoadState::Loading);

        window.finish_load(vec![message(&chat_id, "one")]);
        assert_eq!(window.state(), LoadState::Loaded);
        assert_eq!(window.messages().len(), 1);
    }

    #[test]
    fn test_duplicate_new_message_deduplicated() {
        let chat_id = ChatId::new();
        let mut window = ChatWindow::new(chat_id.clone());
        window.finish_load(Vec::new());

        let m = message(&chat_id, "hello");
        let event = RealtimeEvent::NewMessage(m.clone());
        window.apply_event(&event);
        window.apply_event(&event);
        window.apply_event(&event);
        assert_eq!(window.messages().len(), 1);
        assert_eq!(window.messages()[0].id, m.id);
    }

    #[test]
    fn test_page_and_event_merge_deduplicates() {
        let chat_id = ChatId::new();
        let mut window = ChatWindow::new(chat_id.clone());
        window.begin_load();

        // Delivered over the realtime channel while the page is in flight
        let live = message(&chat_id, "live");
        window.apply_event(&RealtimeEvent::NewMessage(live.clone()));

        // The page already contains the same message
        window.finish_load(vec![message(&chat_id, "old"), live.clone()]);
        assert_eq!(window.messages().len(), 2);
    }

    #[test]
    fn test_other_chats_events_ignored() {
        let mut window = ChatWindow::new(ChatId::new());
        window.finish_load(Vec::new());

        let other = ChatId::new();
        window.apply_event(&RealtimeEvent::NewMessage(message(&other, "elsewhere")));
        assert!(window.messages().is_empty());
    }

    #[test]
    fn test_edit_in_place_keeps_position() {
        let chat_id = ChatId::new();
        let mut window = ChatWindow::new(chat_id.clone());
        let first = message(&chat_id, "first");
        let second = message(&chat_id, "second");
        let third = message(&chat_id, "third");
        window.finish_load(vec![first, second.clone(), third]);

        window.apply_event(&RealtimeEvent::MessageEdited {
            message_id: second.id.clone(),
            content: "second, edited".to_string(),
            edited: true,
            edited_at: Some(Timestamp::now()),
        });

        assert_eq!(window.messages()[1].id, second.id);
        assert_eq!(window.messages()[1].content, "second, edited");
        assert!(window.messages()[1].edited);
        assert_eq!(window.messages().len(), 3);
    }

    #[test]
    fn test_delete_removes_from_list() {
        let chat_id = ChatId::new();
        let mut window = ChatWindow::new(chat_id.clone());
        let m = message(&chat_id, "going away");
        window.finish_load(vec![m.clone()]);

        window.apply_event(&RealtimeEvent::MessageDeleted {
            message_id: m.id.clone(),
            chat_id: chat_id.clone(),
        });
        assert!(window.messages().is_empty());
    }

    #[test]
    fn test_reaction_transforms() {
        let chat_id = ChatId::new();
        let mut window = ChatWindow::new(chat_id.clone());
        let m = message(&chat_id, "offer");
        window.finish_load(vec![m.clone()]);

        let reaction = bloxtrade_core::Reaction {
            user_id: user("b"),
            emoji: "🔥".to_string(),
            reacted_at: Timestamp::now(),
        };
        let added = RealtimeEvent::ReactionAdded {
            message_id: m.id.clone(),
            reaction: reaction.clone(),
        };
        window.apply_event(&added);
        window.apply_event(&added);
        assert_eq!(window.messages()[0].reactions.len(), 1);

        window.apply_event(&RealtimeEvent::ReactionRemoved {
            message_id: m.id.clone(),
            user_id: user("b"),
            emoji: "🔥".to_string(),
        });
        assert!(window.messages()[0].reactions.is_empty());
    }

    #[test]
    fn test_reply_composition_cleared_after_send() {
        let chat_id = ChatId::new();
        let mut window = ChatWindow::new(chat_id.clone());
        let original = message(&chat_id, "want to trade?");
        window.finish_load(vec![original.clone()]);

        window.set_reply(&original);
        assert!(window.reply_context().is_some());

        let outgoing = window.compose("sure");
        assert_eq!(outgoing.reply_to, Some(original.id));
        assert!(window.reply_context().is_none());

        // Next send carries no reply
        let outgoing = window.compose("when?");
        assert_eq!(outgoing.reply_to, None);
    }

    #[test]
    fn test_grouping_by_calendar_date() {
        let chat_id = ChatId::new();
        let mut window = ChatWindow::new(chat_id.clone());

        let mut day1a = message(&chat_id, "a");
        day1a.created_at = Timestamp::from_millis(1_700_000_000_000);
        let mut day1b = message(&chat_id, "b");
        day1b.created_at = Timestamp::from_millis(1_700_000_060_000);
        let mut day2 = message(&chat_id, "c");
        day2.created_at = Timestamp::from_millis(1_700_100_000_000);
        window.finish_load(vec![day1a, day1b, day2]);

        let groups = window.grouped_by_date();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].1.len(), 1);
    }

    #[test]
    fn test_typing_users_follow_events() {
        let chat_id = ChatId::new();
        let mut window = ChatWindow::new(chat_id.clone());
        window.finish_load(Vec::new());

        window.apply_event(&RealtimeEvent::TypingStarted {
            chat_id: chat_id.clone(),
            user_id: user("b"),
        });
        assert!(window.typing_users().contains(&user("b")));

        // A message from the typist clears the indicator
        let mut m = message(&chat_id, "done typing");
        m.sender_id = user("b");
        window.apply_event(&RealtimeEvent::NewMessage(m));
        assert!(window.typing_users().is_empty());
    }

    #[test]
    fn test_typing_tracker_debounce() {
        let mut tracker = TypingTracker::new();
        let t0 = Instant::now();

        assert_eq!(tracker.on_input(t0), Some(TypingSignal::Started));
        // Further keystrokes within the window do not re-signal
        assert_eq!(tracker.on_input(t0 + Duration::from_millis(300)), None);
        assert!(tracker.is_typing());

        // Quiesce measured from the last keystroke
        assert_eq!(tracker.poll(t0 + Duration::from_millis(900)), None);
        assert_eq!(
            tracker.poll(t0 + Duration::from_millis(1301)),
            Some(TypingSignal::Stopped)
        );
        assert!(!tracker.is_typing());

        // A new keystroke starts a fresh cycle
        assert_eq!(
            tracker.on_input(t0 + Duration::from_secs(5)),
            Some(TypingSignal::Started)
        );
        assert_eq!(tracker.stop(), Some(TypingSignal::Stopped));
        assert_eq!(tracker.stop(), None);
    }
}
