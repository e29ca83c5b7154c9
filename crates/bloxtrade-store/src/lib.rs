//! Chat storage for BloxTrade
//!
//! The [`ChatStore`] trait is the seam toward the document database that
//! backs the marketplace. [`MemoryChatStore`] is the in-process
//! implementation used by the chat service and by tests.

mod memory;
mod store;

pub use memory::MemoryChatStore;
pub use store::{ChatStore, StoreStats, UnreadTotal};
