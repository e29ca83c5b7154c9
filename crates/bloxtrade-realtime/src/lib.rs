//! Realtime fan-out hub
//!
//! Connected clients hold a [`ClientConn`]; the hub routes
//! [`RealtimeEvent`]s to broadcast rooms. Every connection implicitly joins
//! its user room (account-wide notifications); chat rooms are joined while
//! the client is viewing that chat and left on navigation away.
//!
//! Delivery is transport-order only. There is no replay after a gap;
//! clients re-fetch over REST after reconnecting.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use bloxtrade_core::{ChatId, RealtimeEvent, UserId};

/// Connection identifier, unique per hub
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Broadcast room key
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RoomId {
    /// Clients currently viewing a chat
    Chat(ChatId),
    /// All connections of one user
    User(UserId),
}

struct ConnEntry {
    user_id: UserId,
    tx: mpsc::UnboundedSender<RealtimeEvent>,
}

/// Hub statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Open connections
    pub connections: usize,
    /// Rooms with at least one member
    pub rooms: usize,
}

/// Client side of a hub connection
pub struct ClientConn {
    /// Connection id
    pub id: ConnId,
    /// Authenticated user
    pub user_id: UserId,
    rx: mpsc::UnboundedReceiver<RealtimeEvent>,
}

impl ClientConn {
    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<RealtimeEvent> {
        self.rx.recv().await
    }

    /// Take the next event if one is queued
    pub fn try_recv(&mut self) -> Option<RealtimeEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain every currently queued event
    pub fn drain(&mut self) -> Vec<RealtimeEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Realtime fan-out hub
#[derive(Default)]
pub struct RealtimeHub {
    next_conn: AtomicU64,
    conns: DashMap<ConnId, ConnEntry>,
    rooms: DashMap<RoomId, HashSet<ConnId>>,
}

impl RealtimeHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection for a user
    ///
    /// The connection joins the user's account-wide room immediately.
    pub fn connect(&self, user_id: UserId) -> ClientConn {
        let id = ConnId(self.next_conn.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.conns.insert(
            id,
            ConnEntry {
                user_id: user_id.clone(),
                tx,
            },
        );
        self.rooms
            .entry(RoomId::User(user_id.clone()))
            .or_default()
            .insert(id);
        debug!(conn = %id, user = %user_id, "realtime connection opened");
        ClientConn { id, user_id, rx }
    }

    /// Tear down a connection, leaving every room it joined
    pub fn disconnect(&self, conn_id: ConnId) {
        self.conns.remove(&conn_id);
        self.rooms.retain(|_, members| {
            members.remove(&conn_id);
            !members.is_empty()
        });
        debug!(conn = %conn_id, "realtime connection closed");
    }

    /// Join the room of a chat the client is viewing
    pub fn join_chat(&self, conn_id: ConnId, chat_id: &ChatId) {
        if !self.conns.contains_key(&conn_id) {
            warn!(conn = %conn_id, "join_chat on unknown connection");
            return;
        }
        self.rooms
            .entry(RoomId::Chat(chat_id.clone()))
            .or_default()
            .insert(conn_id);
    }

    /// Leave a chat room
    pub fn leave_chat(&self, conn_id: ConnId, chat_id: &ChatId) {
        let room = RoomId::Chat(chat_id.clone());
        let emptied = self
            .rooms
            .get_mut(&room)
            .map(|mut members| {
                members.remove(&conn_id);
                members.is_empty()
            })
            .unwrap_or(false);
        if emptied {
            self.rooms.remove_if(&room, |_, members| members.is_empty());
        }
    }

    /// Users with at least one connection currently viewing the chat
    pub fn chat_viewers(&self, chat_id: &ChatId) -> HashSet<UserId> {
        let Some(members) = self.rooms.get(&RoomId::Chat(chat_id.clone())) else {
            return HashSet::new();
        };
        members
            .iter()
            .filter_map(|conn_id| self.conns.get(conn_id).map(|e| e.user_id.clone()))
            .collect()
    }

    /// Broadcast an event to every connection in the chat's room
    ///
    /// Returns the number of connections reached.
    pub fn broadcast_to_chat(&self, chat_id: &ChatId, event: &RealtimeEvent) -> usize {
        self.deliver(RoomId::Chat(chat_id.clone()), event)
    }

    /// Deliver an event to every connection of one user
    pub fn notify_user(&self, user_id: &UserId, event: &RealtimeEvent) -> usize {
        self.deliver(RoomId::User(user_id.clone()), event)
    }

    /// Hub statistics
    pub fn stats(&self) -> HubStats {
        HubStats {
            connections: self.conns.len(),
            rooms: self.rooms.len(),
        }
    }

    fn deliver(&self, room: RoomId, event: &RealtimeEvent) -> usize {
        let targets: Vec<ConnId> = match self.rooms.get(&room) {
            Some(members) => members.iter().copied().collect(),
            None => return 0,
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for conn_id in targets {
            let Some(entry) = self.conns.get(&conn_id) else {
                continue;
            };
            if entry.tx.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(conn_id);
            }
        }

        // Receivers dropped without an explicit disconnect
        for conn_id in dead {
            warn!(conn = %conn_id, "dropping dead realtime connection");
            self.disconnect(conn_id);
        }
        debug!(?room, kind = ?event.kind(), delivered, "event fan-out");
        delivered
    }
}
