use std::collections::VecDeque;

use log::{debug, warn};

use super::types::{ItemPickup, ObjectTable, ReplayItem, ReplayReport};
use crate::config::ReplayConfig;
use crate::types::{ObjectId, Tick, TickSource};

/// Item pickups that arrived before the object they name was spawned.
///
/// Entries are retried once per tick in insertion order until the object
/// shows up or the entry is older than `max_replay_tics`.
#[derive(Debug)]
pub struct ReplayQueue {
    items: VecDeque<ReplayItem>,
    max_replay_tics: Tick,
    was_replayed: bool,
}

impl Default for ReplayQueue {
    fn default() -> Self {
        Self::new(ReplayConfig::default())
    }
}

impl ReplayQueue {
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            items: VecDeque::new(),
            max_replay_tics: config.max_replay_tics,
            was_replayed: false,
        }
    }

    /// Returns false if the same tick and object are already queued.
    pub fn record(&mut self, tick: Tick, object_id: ObjectId, pickup: ItemPickup) -> bool {
        if self.items.iter().any(|item| item.matches(tick, object_id)) {
            return false;
        }
        self.items.push_back(ReplayItem {
            tick,
            object_id,
            pickup,
        });
        true
    }

    pub fn remove(&mut self, tick: Tick, object_id: ObjectId) -> Option<ReplayItem> {
        let index = self
            .items
            .iter()
            .position(|item| item.matches(tick, object_id))?;
        self.items.remove(index)
    }

    /// Cancels every entry naming `object_id`, e.g. once the object is known
    /// to be destroyed. Returns how many were dropped.
    pub fn remove_object(&mut self, object_id: ObjectId) -> usize {
        let before = self.items.len();
        self.items.retain(|item| item.object_id != object_id);
        let removed = before - self.items.len();
        if removed > 0 {
            debug!("cancelled {removed} deferred pickups on destroyed {object_id:?}");
        }
        removed
    }

    /// Expires old entries, then applies every entry whose object now
    /// resolves. Call once per tick.
    pub fn replay<T: ObjectTable>(
        &mut self,
        clock: &impl TickSource,
        table: &mut T,
    ) -> ReplayReport {
        let now = clock.current_tick();
        let max = self.max_replay_tics;
        let mut report = ReplayReport::default();
        self.was_replayed = false;

        self.items.retain(|item| {
            let expired = item.age(now) > max;
            if expired {
                debug!(
                    "replay of pickup on {:?} from tick {} timed out at tick {now}",
                    item.object_id, item.tick
                );
                report.expired += 1;
            }
            !expired
        });

        self.items.retain(|item| {
            let Some(handle) = table.spawn_lookup(item.object_id) else {
                return true;
            };
            match table.apply_item_pickup(handle, &item.pickup) {
                Ok(()) => report.replayed += 1,
                Err(err) => {
                    warn!(
                        "dropping deferred pickup on {:?} from tick {}: {err}",
                        item.object_id, item.tick
                    );
                    report.failed += 1;
                }
            }
            false
        });

        self.was_replayed = report.replayed > 0;
        report
    }

    /// Whether the last [`replay`](Self::replay) applied anything.
    pub fn was_replayed(&self) -> bool {
        self.was_replayed
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReplayItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.was_replayed = false;
    }
}
