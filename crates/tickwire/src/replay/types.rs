use serde::{Deserialize, Serialize};

use crate::error::PickupError;
use crate::types::{ObjectId, Tick};

/// The deferred effect: `picker` collected an item of `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPickup {
    pub picker: ObjectId,
    pub kind: u8,
    pub amount: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayItem {
    pub tick: Tick,
    pub object_id: ObjectId,
    pub pickup: ItemPickup,
}

impl ReplayItem {
    pub fn age(&self, now: Tick) -> Tick {
        now.saturating_sub(self.tick)
    }

    pub fn matches(&self, tick: Tick, object_id: ObjectId) -> bool {
        self.tick == tick && self.object_id == object_id
    }
}

/// The client's live objects, as seen by the replay queue.
pub trait ObjectTable {
    type Handle;

    /// `None` while the object has not been spawned locally.
    fn spawn_lookup(&self, id: ObjectId) -> Option<Self::Handle>;

    fn apply_item_pickup(
        &mut self,
        handle: Self::Handle,
        pickup: &ItemPickup,
    ) -> Result<(), PickupError>;
}

/// Outcome of one [`ReplayQueue::replay`](super::ReplayQueue::replay) pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub replayed: usize,
    pub expired: usize,
    pub failed: usize,
}
