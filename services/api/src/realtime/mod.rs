//! services/api/src/realtime/mod.rs
//!
//! The realtime fan-out channel: per-user delivery groups of live WebSocket
//! connections.

pub mod hub;

pub use hub::{ConnectionId, Outbox, RealtimeHub};
