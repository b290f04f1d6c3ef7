//! Interpolation.
//!
//! The server sends discrete snapshots at tick boundaries.
//! The client renders at its own rate and interpolates entity positions.

use std::collections::VecDeque;

use arena_shared::{
    entity::{Entity, Slot},
    math::Vec3,
};

/// Buffered world history for interpolation.
#[derive(Default)]
pub struct SnapshotBuffer {
    history: VecDeque<Vec<Entity>>,
    max: usize,
}

impl SnapshotBuffer {
    pub fn new(max: usize) -> Self {
        Self {
            history: VecDeque::new(),
            max,
        }
    }

    pub fn push(&mut self, world: &[Entity]) {
        self.history.push_back(world.to_vec());
        while self.history.len() > self.max {
            self.history.pop_front();
        }
    }

    /// Returns the number of buffered snapshots.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Returns true if no snapshots are buffered.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Gets an interpolated position for an entity given a fractional alpha.
    ///
    /// `alpha` should be in $[0,1]$ where 0 = older snapshot, 1 = newer.
    pub fn interp_entity(&self, slot: Slot, alpha: f64) -> Option<Vec3> {
        if self.history.len() < 2 {
            return None;
        }
        let a = &self.history[self.history.len() - 2];
        let b = &self.history[self.history.len() - 1];
        let pa = a.get(slot.0)?.position;
        let pb = b.get(slot.0)?.position;
        Some(pa.lerp(pb, alpha))
    }

    pub fn last_snapshot(&self) -> Option<&[Entity]> {
        self.history.back().map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_at(x: f64) -> Vec<Entity> {
        vec![Entity {
            position: Vec3::new(x, 0.0, 0.0),
            ..Default::default()
        }]
    }

    #[test]
    fn interpolates_between_last_two() {
        let mut buf = SnapshotBuffer::new(2);
        buf.push(&world_at(-10.0));
        assert!(buf.interp_entity(Slot(0), 0.5).is_none());
        buf.push(&world_at(0.0));
        buf.push(&world_at(4.0));
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.interp_entity(Slot(0), 0.5), Some(Vec3::new(2.0, 0.0, 0.0)));
        assert!(buf.interp_entity(Slot(3), 0.5).is_none());
    }
}
