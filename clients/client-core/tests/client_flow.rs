//! End-to-end client reconciliation flow
//!
//! Drives the full client stack against the realtime hub the way the chat
//! service does: chat-room broadcasts for viewers, user-room notifications
//! for everyone else.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bloxtrade_client::{
    ChatList, ChatWindow, LoadState, NotificationCenter, SocketService, UnreadApi, UnreadSnapshot,
};
use bloxtrade_core::{
    Chat, ChatId, EventKind, Message, MessageNotification, RealtimeEvent, UserId,
};
use bloxtrade_realtime::RealtimeHub;

fn user(s: &str) -> UserId {
    UserId::from_string(s)
}

/// Emit the events the chat service produces for one sent message
fn server_send(hub: &RealtimeHub, chat: &Chat, message: &Message) {
    let viewers = hub.chat_viewers(&message.chat_id);
    for participant in chat.active_participants() {
        if participant.user_id == message.sender_id || viewers.contains(&participant.user_id) {
            continue;
        }
        hub.notify_user(
            &participant.user_id,
            &RealtimeEvent::MessageNotification(MessageNotification {
                chat_id: message.chat_id.clone(),
                message_id: message.id.clone(),
                sender_id: message.sender_id.clone(),
                preview: message.content.clone(),
                sent_at: message.created_at,
            }),
        );
    }
    hub.broadcast_to_chat(&message.chat_id, &RealtimeEvent::NewMessage(message.clone()));
}

struct StaticApi(UnreadSnapshot);

#[async_trait]
impl UnreadApi for StaticApi {
    async fn fetch_unread_total(&self) -> bloxtrade_client::Result<UnreadSnapshot> {
        Ok(self.0)
    }
}

#[tokio::test]
async fn viewer_receives_message_into_window() {
    let hub = Arc::new(RealtimeHub::new());
    let chat = Chat::direct(user("u1"), user("u2")).unwrap();

    // U2 opens the chat: joins the room and loads the (empty) page
    let mut socket = SocketService::new(hub.clone());
    socket.connect(user("u2"));
    socket.join_chat(&chat.id).unwrap();

    let window = Arc::new(Mutex::new(ChatWindow::new(chat.id.clone())));
    {
        let mut w = window.lock().unwrap();
        w.begin_load();
        w.finish_load(Vec::new());
        assert_eq!(w.state(), LoadState::Loaded);
    }
    let sink = window.clone();
    socket.on(EventKind::NewMessage, move |event| {
        sink.lock().unwrap().apply_event(event);
    });

    // U1 sends "hello"
    let message = Message::text(chat.id.clone(), user("u1"), "hello").unwrap();
    server_send(&hub, &chat, &message);
    // Duplicate delivery over a flaky transport
    server_send(&hub, &chat, &message);

    assert_eq!(socket.pump(), 2);
    let w = window.lock().unwrap();
    assert_eq!(w.messages().len(), 1);
    assert_eq!(w.messages()[0].content, "hello");
    assert_eq!(w.messages()[0].sender_id, user("u1"));
}

#[tokio::test]
async fn absent_user_sees_badge_and_list_update() {
    let hub = Arc::new(RealtimeHub::new());
    let chat = Chat::direct(user("u1"), user("u2")).unwrap();

    // U2 is logged in but on the marketplace screen, not the chat screen
    let mut socket = SocketService::new(hub.clone());
    socket.connect(user("u2"));

    let list = Arc::new(Mutex::new(ChatList::new(user("u2"))));
    list.lock().unwrap().load(vec![chat.clone()]);

    let center = Arc::new(NotificationCenter::new(Arc::new(StaticApi(
        UnreadSnapshot::default(),
    ))));

    let list_sink = list.clone();
    let center_sink = center.clone();
    socket.on(EventKind::MessageNotification, move |event| {
        list_sink.lock().unwrap().apply_event(event);
        center_sink.apply_event(event);
    });

    let first = Message::text(chat.id.clone(), user("u1"), "one").unwrap();
    let second = Message::text(chat.id.clone(), user("u1"), "two").unwrap();
    server_send(&hub, &chat, &first);
    server_send(&hub, &chat, &second);
    socket.pump();

    assert_eq!(center.total(), 2);
    {
        let l = list.lock().unwrap();
        assert_eq!(l.unread(&chat.id), 2);
        assert_eq!(
            l.chats()[0].last_message.as_ref().unwrap().content,
            "two"
        );
    }

    // Opening the chat zeroes its counter and the badge drops by as much
    let prior = list.lock().unwrap().open_chat(&chat.id);
    assert_eq!(prior, 2);
    center.decrement(u64::from(prior));
    assert_eq!(center.total(), 0);
}

#[tokio::test]
async fn poll_overwrites_event_drift() {
    let center = NotificationCenter::new(Arc::new(StaticApi(UnreadSnapshot {
        total_unread_count: 4,
        chat_count: 2,
    })));

    // Optimistic arithmetic drifted
    center.increment(9);
    assert_eq!(center.total(), 9);

    center.refresh().await.unwrap();
    assert_eq!(center.total(), 4);
}
