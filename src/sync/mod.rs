//! The synchronization core: per-conversation state, change detection and
//! the dedup/dispatch engine shared by the poll and push ingestion paths.

pub mod delta;
pub mod engine;
pub mod state;

pub use engine::SyncEngine;
pub use state::{ConversationState, StateTracker};
