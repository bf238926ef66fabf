//! Fixed-depth histories of per-tick state, used for render interpolation,
//! prediction reconciliation and lag-compensated queries.

mod history;
mod prediction;
mod ring;
mod shared;
mod state;

pub use history::EntityHistory;
pub use prediction::{Correction, Reconciler};
pub use ring::{Snapshot, SnapshotRing};
pub use shared::SharedSnapshotRing;
pub use state::{EntitySnapshot, Interpolate, lerp_angle};
