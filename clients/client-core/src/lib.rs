//! Client runtime for BloxTrade chat
//!
//! Mirrors server state into view state: a socket service with named-event
//! listeners, chat-list and chat-window reconciliation, a typing-debounce
//! tracker, and the unread-count notification center.

pub mod chat_list;
pub mod chat_window;
pub mod error;
pub mod notifications;
pub mod socket;

pub use chat_list::ChatList;
pub use chat_window::{ChatWindow, LoadState, OutgoingMessage, TypingSignal, TypingTracker};
pub use error::{ClientError, Result};
pub use notifications::{NotificationCenter, UnreadApi, UnreadSnapshot};
pub use socket::{HandlerId, SocketService};
