use std::collections::VecDeque;

use log::trace;
use serde::{Deserialize, Serialize};

use super::state::Interpolate;
use crate::config::SnapshotConfig;
use crate::types::Tick;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<S> {
    pub tick: Tick,
    pub state: S,
}

/// The last `capacity` states of one entity, oldest first.
///
/// Ticks only move forward: a push for the newest tick replaces it, and a
/// push for an older tick is ignored. Readers always get copies.
#[derive(Debug, Clone)]
pub struct SnapshotRing<S> {
    entries: VecDeque<Snapshot<S>>,
    capacity: usize,
}

impl<S: Clone> SnapshotRing<S> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn from_config(config: &SnapshotConfig) -> Self {
        Self::new(config.depth)
    }

    /// Returns false if `tick` is older than the newest snapshot.
    pub fn push(&mut self, tick: Tick, state: S) -> bool {
        if let Some(latest) = self.entries.back_mut() {
            if tick == latest.tick {
                latest.state = state;
                return true;
            }
            if tick < latest.tick {
                trace!("ignoring snapshot for tick {tick}, newest is {}", latest.tick);
                return false;
            }
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Snapshot { tick, state });
        true
    }

    /// Newest snapshot at or before `tick`. A query older than everything
    /// retained gets the oldest snapshot instead.
    pub fn at_or_before(&self, tick: Tick) -> Option<Snapshot<S>> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.tick <= tick)
            .or_else(|| self.entries.front())
            .cloned()
    }

    /// Exact lookup.
    pub fn get(&self, tick: Tick) -> Option<&S> {
        let index = self
            .entries
            .binary_search_by_key(&tick, |entry| entry.tick)
            .ok()?;
        self.entries.get(index).map(|entry| &entry.state)
    }

    pub fn latest(&self) -> Option<Snapshot<S>> {
        self.entries.back().cloned()
    }

    pub fn oldest(&self) -> Option<Snapshot<S>> {
        self.entries.front().cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot<S>> {
        self.entries.iter()
    }

    pub(crate) fn update_from(&mut self, tick: Tick, mut update: impl FnMut(&mut S)) {
        for entry in self.entries.iter_mut().filter(|entry| entry.tick >= tick) {
            update(&mut entry.state);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Interpolate> SnapshotRing<S> {
    /// Blends the two snapshots around a fractional tick. Queries outside
    /// the retained range clamp to the nearest end.
    pub fn interpolate(&self, tick: f64) -> Option<S> {
        let oldest = self.entries.front()?;
        let latest = self.entries.back()?;
        if tick <= oldest.tick as f64 {
            return Some(oldest.state.clone());
        }
        if tick >= latest.tick as f64 {
            return Some(latest.state.clone());
        }

        let after = self
            .entries
            .iter()
            .position(|entry| entry.tick as f64 > tick)?;
        let from = self.entries.get(after.checked_sub(1)?)?;
        let to = self.entries.get(after)?;

        let span = (to.tick - from.tick) as f64;
        let t = (tick - from.tick as f64) / span;
        Some(from.state.interpolate(&to.state, t as f32))
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn filled(capacity: usize, ticks: std::ops::RangeInclusive<Tick>) -> SnapshotRing<Vec3> {
        let mut ring = SnapshotRing::new(capacity);
        for tick in ticks {
            ring.push(tick, Vec3::new(tick as f32, 0.0, 0.0));
        }
        ring
    }

    #[test]
    fn evicts_oldest_when_full() {
        let ring = filled(8, 100..=110);
        assert_eq!(ring.len(), 8);
        assert_eq!(ring.oldest().map(|s| s.tick), Some(103));
        assert_eq!(ring.latest().map(|s| s.tick), Some(110));
    }

    #[test]
    fn evicted_ticks_fall_back_to_oldest() {
        let ring = filled(8, 100..=110);
        assert_eq!(ring.at_or_before(102).map(|s| s.tick), Some(103));
        assert_eq!(ring.at_or_before(104).map(|s| s.tick), Some(104));
        assert_eq!(ring.at_or_before(500).map(|s| s.tick), Some(110));
    }

    #[test]
    fn at_or_before_skips_gaps() {
        let mut ring = SnapshotRing::new(4);
        ring.push(10, 1.0_f32);
        ring.push(14, 2.0);
        ring.push(20, 3.0);
        assert_eq!(ring.at_or_before(13).map(|s| s.tick), Some(10));
        assert_eq!(ring.at_or_before(19).map(|s| s.state), Some(2.0));
        assert_eq!(ring.get(14), Some(&2.0));
        assert_eq!(ring.get(15), None);
    }

    #[test]
    fn interpolates_between_brackets() {
        let ring = filled(8, 100..=110);
        assert_eq!(ring.interpolate(106.5), Some(Vec3::new(106.5, 0.0, 0.0)));
        assert_eq!(ring.interpolate(50.0), Some(Vec3::new(103.0, 0.0, 0.0)));
        assert_eq!(ring.interpolate(111.0), Some(Vec3::new(110.0, 0.0, 0.0)));
    }

    #[test]
    fn never_returns_older_than_capacity_pushes() {
        let mut ring = SnapshotRing::new(5);
        for tick in 0..40 {
            ring.push(tick, Vec3::ZERO);
            let floor = tick.saturating_sub(4);
            for query in 0..=tick {
                let found = ring.at_or_before(query).map(|s| s.tick);
                assert!(found.is_some_and(|t| t >= floor));
            }
        }
    }

    #[test]
    fn same_tick_replaces_and_older_is_ignored() {
        let mut ring = SnapshotRing::new(4);
        assert!(ring.push(5, Vec3::ZERO));
        assert!(ring.push(5, Vec3::ONE));
        assert!(!ring.push(4, Vec3::X));
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.latest().map(|s| s.state), Some(Vec3::ONE));
    }

    #[test]
    fn clear_empties() {
        let mut ring = filled(4, 1..=3);
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.at_or_before(2), None);
        assert_eq!(ring.interpolate(2.0), None);
    }
}
