//! `arena_server`
//!
//! Server-side systems:
//! - Fixed-tick loop owning the entity store and session registry
//! - Per-connection reader/writer tasks
//! - Delta-compressed snapshot broadcast
//! - Join/leave announcements
//!
//! Concurrency model:
//! - One task per connection direction, suspended on socket I/O
//! - One tick loop, suspended only on its timer and event channel

pub mod console;
pub mod gateway;
pub mod registry;
pub mod server;
pub mod session;
pub mod simulation;
pub mod store;
pub mod tick;

pub use server::GameServer;
