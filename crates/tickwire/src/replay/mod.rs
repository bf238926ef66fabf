//! Deferred replay of item pickups that reference objects the client has
//! not spawned yet.

mod queue;
mod types;

pub use queue::ReplayQueue;
pub use types::{ItemPickup, ObjectTable, ReplayItem, ReplayReport};
