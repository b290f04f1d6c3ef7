//! `arena_shared`
//!
//! Libraries shared by the arena server and client.
//!
//! Design goals:
//! - Explicit, fixed-layout little-endian wire format.
//! - Encode/decode as pure functions over byte buffers.
//! - No `unsafe`.

pub mod codec;
pub mod command;
pub mod config;
pub mod entity;
pub mod error;
pub mod math;
pub mod net;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::codec::{ClientMsg, ControlMsg, ServerMsg};
    pub use crate::command::*;
    pub use crate::config::*;
    pub use crate::entity::*;
    pub use crate::error::*;
    pub use crate::math::*;
    pub use crate::net::SessionId;
}
