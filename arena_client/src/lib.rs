//! `arena_client`
//!
//! Client-side systems:
//! - Framed connection to the arena server
//! - Snapshot mirror (full sync, then deltas)
//! - Roster from join/leave announcements
//! - Input capture and command generation
//! - Interpolation for entity positions

pub mod client;
pub mod input;
pub mod interp;

pub use client::GameClient;
