//! Unread-count notification center
//!
//! One owner per session: created at login, disposed at logout. The total
//! is refreshed two ways: an authoritative REST fetch (on login and every
//! poll interval) that always overwrites, and optimistic event-driven
//! arithmetic while the user is away from the chat screen. Drift between
//! the two is corrected at the next poll.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use bloxtrade_core::{EventKind, RealtimeEvent};

use crate::error::Result;

/// Authoritative unread state fetched from the server
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnreadSnapshot {
    /// Sum of unread counters across all chats
    pub total_unread_count: u64,
    /// Number of chats with unread messages
    pub chat_count: usize,
}

/// REST seam for the unread-count endpoint
#[async_trait]
pub trait UnreadApi: Send + Sync {
    /// `GET /notifications/unread-count/total`
    async fn fetch_unread_total(&self) -> Result<UnreadSnapshot>;
}

/// Process-wide unread counter
pub struct NotificationCenter {
    api: Arc<dyn UnreadApi>,
    total: AtomicU64,
    on_chat_screen: AtomicBool,
}

impl NotificationCenter {
    /// Interval of the authoritative poll
    pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

    /// Create a center over the REST seam
    pub fn new(api: Arc<dyn UnreadApi>) -> Self {
        Self {
            api,
            total: AtomicU64::new(0),
            on_chat_screen: AtomicBool::new(false),
        }
    }

    /// Current total
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    /// Record whether the user is on the chat screen; events do not
    /// increment the total while they are
    pub fn set_on_chat_screen(&self, on: bool) {
        self.on_chat_screen.store(on, Ordering::SeqCst);
    }

    /// Fetch the authoritative total and overwrite the estimate
    pub async fn refresh(&self) -> Result<u64> {
        let snapshot = self.api.fetch_unread_total().await?;
        self.total
            .store(snapshot.total_unread_count, Ordering::SeqCst);
        debug!(total = snapshot.total_unread_count, "unread total refreshed");
        Ok(snapshot.total_unread_count)
    }

    /// Optimistically add to the total
    pub fn increment(&self, by: u64) {
        self.total.fetch_add(by, Ordering::SeqCst);
    }

    /// Optimistically subtract from the total, saturating at zero
    pub fn decrement(&self, by: u64) {
        let mut current = self.total.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_sub(by);
            match self.total.compare_exchange(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return,
                Err(seen) => current = seen,
            }
        }
    }

    /// Zero the total
    pub fn reset(&self) {
        self.total.store(0, Ordering::SeqCst);
    }

    /// Apply a realtime event: new-message traffic increments the total
    /// while the user is away from the chat screen
    pub fn apply_event(&self, event: &RealtimeEvent) {
        if self.on_chat_screen.load(Ordering::SeqCst) {
            return;
        }
        if matches!(
            event.kind(),
            EventKind::NewMessage | EventKind::MessageNotification
        ) {
            self.increment(1);
        }
    }

    /// Run the authoritative poll until the handle is aborted
    ///
    /// A failed refresh is logged and skipped; the badge stays stale until
    /// the next round.
    pub fn spawn_poller(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let center = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately: login refresh
            loop {
                ticker.tick().await;
                if let Err(e) = center.refresh().await {
                    warn!(error = %e, "unread poll failed");
                }
            }
        })
    }
}
