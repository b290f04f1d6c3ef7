//! User commands.
//!
//! A command is the set of actions a client is currently holding. Only the
//! newest one matters, so there is no sequence number or ack.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{NetError, NetResult};

bitflags! {
    /// Held actions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Actions: u32 {
        const UP = 1 << 0;
        const DOWN = 1 << 1;
    }
}

/// One inbound command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UserCommand {
    pub actions: Actions,
}

impl UserCommand {
    pub const WIRE_LEN: usize = 4;

    pub fn new(actions: Actions) -> Self {
        Self { actions }
    }

    pub fn is_active(&self, action: Actions) -> bool {
        self.actions.contains(action)
    }

    pub fn encode(&self) -> [u8; Self::WIRE_LEN] {
        self.actions.bits().to_le_bytes()
    }

    /// Decodes a command frame. The frame must be exactly four bytes.
    pub fn decode(bytes: &[u8]) -> NetResult<Self> {
        let raw: [u8; Self::WIRE_LEN] = bytes
            .try_into()
            .map_err(|_| NetError::malformed(format!("command frame of {} bytes", bytes.len())))?;
        Ok(Self {
            actions: Actions::from_bits_retain(u32::from_le_bytes(raw)),
        })
    }
}
