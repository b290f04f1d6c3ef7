//! Entity model.
//!
//! Entities live in fixed, index-addressed slots. The slot index is the
//! entity's identity on the wire; slots are allocated once at startup.

use serde::{Deserialize, Serialize};

use crate::{error::NetError, math::Vec3};

/// Maximum number of entity slots a snapshot can describe (one mask byte).
pub const MAX_ENTITIES: usize = 8;

/// Tag selecting the client-side model for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u32)]
pub enum EntityKind {
    #[default]
    None = 0,
    Paddle = 1,
    Ball = 2,
}

impl EntityKind {
    pub fn tag(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for EntityKind {
    type Error = NetError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(EntityKind::None),
            1 => Ok(EntityKind::Paddle),
            2 => Ok(EntityKind::Ball),
            other => Err(NetError::malformed(format!("unknown entity kind {other}"))),
        }
    }
}

/// Replicated state of one entity slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Entity {
    pub position: Vec3,
    pub velocity: Vec3,
    pub size: Vec3,
    pub kind: EntityKind,
}

impl Entity {
    pub fn new(kind: EntityKind, position: Vec3, size: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            size,
            kind,
        }
    }
}

/// Index of an entity slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot(pub usize);

/// The default arena: two paddles and a ball.
pub fn default_arena() -> Vec<Entity> {
    vec![
        Entity::new(
            EntityKind::Paddle,
            Vec3::new(-75.0, 0.0, 0.0),
            Vec3::new(5.0, 20.0, 10.0),
        ),
        Entity::new(
            EntityKind::Paddle,
            Vec3::new(75.0, 0.0, 0.0),
            Vec3::new(5.0, 20.0, 10.0),
        ),
        Entity::new(EntityKind::Ball, Vec3::ZERO, Vec3::new(20.0, 20.0, 20.0)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_roundtrip() {
        for kind in [EntityKind::None, EntityKind::Paddle, EntityKind::Ball] {
            assert_eq!(EntityKind::try_from(kind.tag()).unwrap(), kind);
        }
        assert!(EntityKind::try_from(7).is_err());
    }

    #[test]
    fn default_arena_fits_one_mask() {
        let arena = default_arena();
        assert_eq!(arena.len(), 3);
        assert!(arena.len() <= MAX_ENTITIES);
        assert_eq!(arena[2].kind, EntityKind::Ball);
    }
}
