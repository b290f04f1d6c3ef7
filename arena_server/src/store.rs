//! Entity store.
//!
//! Holds the current world and the copy that was last broadcast. Only the
//! simulation step and command application write entity fields, and only
//! through this type.

use arena_shared::{
    codec,
    entity::{Entity, Slot, MAX_ENTITIES},
};
use bytes::Bytes;

/// `(current, previous)` pair with a fixed slot count.
#[derive(Debug, Clone)]
pub struct EntityStore {
    current: Vec<Entity>,
    previous: Vec<Entity>,
}

impl EntityStore {
    /// Creates a store. `previous` starts equal to `current`, so the first
    /// delta only carries what changed after startup.
    pub fn new(entities: Vec<Entity>) -> anyhow::Result<Self> {
        anyhow::ensure!(
            entities.len() <= MAX_ENTITIES,
            "{} entities exceed the {MAX_ENTITIES} slots a snapshot can address",
            entities.len()
        );
        Ok(Self {
            previous: entities.clone(),
            current: entities,
        })
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn current(&self) -> &[Entity] {
        &self.current
    }

    pub fn previous(&self) -> &[Entity] {
        &self.previous
    }

    pub fn get(&self, slot: Slot) -> Option<&Entity> {
        self.current.get(slot.0)
    }

    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut Entity> {
        self.current.get_mut(slot.0)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Slot, &mut Entity)> {
        self.current
            .iter_mut()
            .enumerate()
            .map(|(i, e)| (Slot(i), e))
    }

    /// Replaces the whole current state. A slice of the wrong length is
    /// refused and the store is left as it was.
    pub fn restore(&mut self, entities: &[Entity]) -> anyhow::Result<()> {
        anyhow::ensure!(
            entities.len() == self.current.len(),
            "restore with {} entities into a store of {}",
            entities.len(),
            self.current.len()
        );
        self.current.copy_from_slice(entities);
        Ok(())
    }

    /// Encodes the snapshot body of `current` against `previous`.
    pub fn diff_and_snapshot(&self, force_full: bool) -> Bytes {
        codec::encode_snapshot(&self.current, &self.previous, force_full)
    }

    /// Overwrites `previous` with `current`. Call only after the tick's
    /// bytes have been produced.
    pub fn commit(&mut self) {
        self.previous.copy_from_slice(&self.current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_shared::{
        codec::decode_snapshot,
        entity::{default_arena, EntityKind},
        math::Vec3,
    };

    #[test]
    fn fresh_store_has_no_delta() {
        let store = EntityStore::new(default_arena()).unwrap();
        assert_eq!(&store.diff_and_snapshot(false)[..], &[0, 0, 0, 0]);
    }

    #[test]
    fn too_many_entities_rejected() {
        assert!(EntityStore::new(vec![Entity::default(); MAX_ENTITIES + 1]).is_err());
        assert!(EntityStore::new(vec![Entity::default(); MAX_ENTITIES]).is_ok());
    }

    #[test]
    fn restore_with_wrong_length_changes_nothing() {
        let mut store = EntityStore::new(default_arena()).unwrap();
        store.get_mut(Slot(0)).unwrap().position = Vec3::new(0.0, 7.0, 0.0);
        let before = store.current().to_vec();

        assert!(store.restore(&before[..1]).is_err());
        let mut longer = before.clone();
        longer.push(Entity::default());
        assert!(store.restore(&longer).is_err());
        assert_eq!(store.current(), &before[..]);

        store.restore(&default_arena()).unwrap();
        assert_eq!(store.current(), &default_arena()[..]);
    }

    #[test]
    fn commit_is_idempotent() {
        let mut store = EntityStore::new(default_arena()).unwrap();
        store.get_mut(Slot(2)).unwrap().position = Vec3::new(3.0, 4.0, 0.0);
        assert_ne!(&store.diff_and_snapshot(false)[..], &[0, 0, 0, 0]);

        store.commit();
        store.commit();
        assert_eq!(store.previous(), store.current());
        assert_eq!(&store.diff_and_snapshot(false)[..], &[0, 0, 0, 0]);
    }

    #[test]
    fn delta_reproduces_current_on_top_of_previous() {
        let mut store = EntityStore::new(default_arena()).unwrap();
        for (slot, ent) in store.iter_mut() {
            if slot.0 % 2 == 0 {
                ent.velocity = Vec3::new(1.0, -1.0, 0.25);
            }
        }
        store.get_mut(Slot(1)).unwrap().kind = EntityKind::Ball;

        let mut mirror = store.previous().to_vec();
        decode_snapshot(&store.diff_and_snapshot(false), &mut mirror).unwrap();
        assert_eq!(mirror, store.current());
    }

    #[test]
    fn full_sync_ignores_previous() {
        let mut store = EntityStore::new(default_arena()).unwrap();
        store.get_mut(Slot(0)).unwrap().size = Vec3::new(1.0, 1.0, 1.0);

        let body = store.diff_and_snapshot(true);
        for mask_at in mask_offsets(store.len()) {
            assert_eq!(body[mask_at], 0b111);
        }
        let mut mirror = vec![Entity::default(); store.len()];
        decode_snapshot(&body, &mut mirror).unwrap();
        assert_eq!(mirror, store.current());
    }

    fn mask_offsets(n: usize) -> [usize; 4] {
        let kinds = 1 + 4 * n;
        let vecs = 1 + 24 * n;
        [0, kinds, kinds + vecs, kinds + 2 * vecs]
    }
}
