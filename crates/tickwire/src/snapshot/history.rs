use std::collections::HashMap;

use super::ring::SnapshotRing;
use crate::types::{ObjectId, Tick};

/// Per-object snapshot rings for lag-compensated queries.
#[derive(Debug)]
pub struct EntityHistory<S> {
    depth: usize,
    rings: HashMap<ObjectId, SnapshotRing<S>>,
}

impl<S: Clone> EntityHistory<S> {
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            rings: HashMap::new(),
        }
    }

    pub fn record(&mut self, tick: Tick, id: ObjectId, state: S) {
        let depth = self.depth;
        self.rings
            .entry(id)
            .or_insert_with(|| SnapshotRing::new(depth))
            .push(tick, state);
    }

    /// Every tracked object as it was at `tick`, ordered by id.
    pub fn rewind(&self, tick: Tick) -> Vec<(ObjectId, S)> {
        let mut states: Vec<(ObjectId, S)> = self
            .rings
            .iter()
            .filter_map(|(id, ring)| ring.at_or_before(tick).map(|s| (*id, s.state)))
            .collect();
        states.sort_unstable_by_key(|(id, _)| *id);
        states
    }

    pub fn state_at(&self, id: ObjectId, tick: Tick) -> Option<S> {
        self.rings
            .get(&id)?
            .at_or_before(tick)
            .map(|snapshot| snapshot.state)
    }

    pub fn forget(&mut self, id: ObjectId) -> bool {
        self.rings.remove(&id).is_some()
    }

    pub fn clear(&mut self) {
        self.rings.clear();
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    #[test]
    fn rewind_reports_each_object_at_tick() {
        let mut history = EntityHistory::new(8);
        for tick in 0..10 {
            history.record(tick, ObjectId(2), Vec3::splat(tick as f32));
            if tick % 2 == 0 {
                history.record(tick, ObjectId(1), Vec3::splat(-(tick as f32)));
            }
        }

        let states = history.rewind(5);
        assert_eq!(
            states,
            vec![
                (ObjectId(1), Vec3::splat(-4.0)),
                (ObjectId(2), Vec3::splat(5.0)),
            ]
        );
        assert_eq!(history.state_at(ObjectId(2), 1), Some(Vec3::splat(2.0)));
        assert_eq!(history.state_at(ObjectId(9), 1), None);
    }

    #[test]
    fn forget_and_clear() {
        let mut history = EntityHistory::new(4);
        history.record(1, ObjectId(1), 0u8);
        history.record(1, ObjectId(2), 0u8);

        assert!(history.forget(ObjectId(1)));
        assert!(!history.forget(ObjectId(1)));
        assert_eq!(history.len(), 1);

        history.clear();
        assert!(history.is_empty());
        assert!(history.rewind(1).is_empty());
    }
}
