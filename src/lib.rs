//! Message synchronization and delivery core for a Beekeeper-style chat bot.
//!
//! Inbound messages reach application callbacks through two ingestion paths:
//! a poll scheduler that lists conversations and delta-fetches new messages
//! ([`bot::Bot`]), and a push listener that decrypts realtime channel events
//! ([`push::PushListener`]). Both paths converge on one dedup/dispatch engine
//! ([`sync::SyncEngine`]) so a message is delivered to callbacks at most once
//! per run regardless of which path saw it first.

pub mod api;
pub mod bot;
pub mod config;
pub mod error;
pub mod model;
pub mod push;
pub mod sync;
