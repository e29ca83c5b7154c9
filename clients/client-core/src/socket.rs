//! Client socket service
//!
//! One realtime connection per authenticated session, opened on login and
//! torn down on logout. Listeners register per event name; multiple
//! handlers per event are dispatched in registration order. There is no
//! automatic reconnect: after a gap the owner calls `connect` again and
//! re-fetches over REST.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use bloxtrade_core::{ChatId, EventKind, RealtimeEvent, UserId};
use bloxtrade_realtime::{ClientConn, RealtimeHub};

use crate::error::{ClientError, Result};

/// Handle for unregistering a listener
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Box<dyn Fn(&RealtimeEvent) + Send>;

/// Client socket service
pub struct SocketService {
    hub: Arc<RealtimeHub>,
    conn: Option<ClientConn>,
    handlers: HashMap<EventKind, Vec<(HandlerId, Handler)>>,
    next_handler: u64,
}

impl SocketService {
    /// Create a socket service over the realtime hub
    pub fn new(hub: Arc<RealtimeHub>) -> Self {
        Self {
            hub,
            conn: None,
            handlers: HashMap::new(),
            next_handler: 0,
        }
    }

    /// Open the session's connection
    ///
    /// Replaces any previous connection; the authenticated user is the one
    /// the session token resolved to.
    pub fn connect(&mut self, user_id: UserId) {
        if let Some(conn) = self.conn.take() {
            self.hub.disconnect(conn.id);
        }
        self.conn = Some(self.hub.connect(user_id));
    }

    /// Tear the connection down (logout)
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.hub.disconnect(conn.id);
        }
    }

    /// Whether a connection is open
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Register a handler for one event name
    pub fn on(&mut self, kind: EventKind, handler: impl Fn(&RealtimeEvent) + Send + 'static) -> HandlerId {
        let id = HandlerId(self.next_handler);
        self.next_handler += 1;
        self.handlers
            .entry(kind)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Unregister a handler
    pub fn off(&mut self, id: HandlerId) -> bool {
        let mut removed = false;
        for handlers in self.handlers.values_mut() {
            let before = handlers.len();
            handlers.retain(|(h, _)| *h != id);
            removed |= handlers.len() != before;
        }
        removed
    }

    /// Join a chat's broadcast room while viewing it
    pub fn join_chat(&self, chat_id: &ChatId) -> Result<()> {
        let conn = self.conn.as_ref().ok_or(ClientError::NotConnected)?;
        self.hub.join_chat(conn.id, chat_id);
        Ok(())
    }

    /// Leave a chat's broadcast room on navigation away
    pub fn leave_chat(&self, chat_id: &ChatId) -> Result<()> {
        let conn = self.conn.as_ref().ok_or(ClientError::NotConnected)?;
        self.hub.leave_chat(conn.id, chat_id);
        Ok(())
    }

    /// Announce typing to a chat's room
    pub fn start_typing(&self, chat_id: &ChatId) -> Result<()> {
        self.send_typing(chat_id, true)
    }

    /// Withdraw the typing announcement
    pub fn stop_typing(&self, chat_id: &ChatId) -> Result<()> {
        self.send_typing(chat_id, false)
    }

    fn send_typing(&self, chat_id: &ChatId, started: bool) -> Result<()> {
        let conn = self.conn.as_ref().ok_or(ClientError::NotConnected)?;
        let event = if started {
            RealtimeEvent::TypingStarted {
                chat_id: chat_id.clone(),
                user_id: conn.user_id.clone(),
            }
        } else {
            RealtimeEvent::TypingStopped {
                chat_id: chat_id.clone(),
                user_id: conn.user_id.clone(),
            }
        };
        self.hub.broadcast_to_chat(chat_id, &event);
        Ok(())
    }

    /// Drain queued events and dispatch them to registered handlers
    ///
    /// Returns the number of events dispatched.
    pub fn pump(&mut self) -> usize {
        let Some(conn) = self.conn.as_mut() else {
            return 0;
        };
        let events = conn.drain();
        let count = events.len();
        for event in events {
            if let Some(handlers) = self.handlers.get(&event.kind()) {
                for (_, handler) in handlers {
                    handler(&event);
                }
            } else {
                debug!(kind = ?event.kind(), "no listener for event");
            }
        }
        count
    }

    /// Wait for the next event and dispatch it
    pub async fn pump_next(&mut self) -> Result<()> {
        let conn = self.conn.as_mut().ok_or(ClientError::NotConnected)?;
        let Some(event) = conn.recv().await else {
            return Err(ClientError::NotConnected);
        };
        if let Some(handlers) = self.handlers.get(&event.kind()) {
            for (_, handler) in handlers {
                handler(&event);
            }
        }
        Ok(())
    }
}

impl Drop for SocketService {
    fn drop(&mut self) {
        self.disconnect();
    }
}
