use std::sync::Arc;

use parking_lot::RwLock;

use super::ring::{Snapshot, SnapshotRing};
use super::state::Interpolate;
use crate::types::Tick;

/// A [`SnapshotRing`] with one writer and any number of readers.
///
/// The writer hands over a finished state, so the write lock is only held
/// for the insert itself and readers never see a half-built entry.
#[derive(Debug)]
pub struct SharedSnapshotRing<S> {
    inner: Arc<RwLock<SnapshotRing<S>>>,
}

impl<S> Clone for SharedSnapshotRing<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Clone> SharedSnapshotRing<S> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SnapshotRing::new(capacity))),
        }
    }

    pub fn push(&self, tick: Tick, state: S) -> bool {
        self.inner.write().push(tick, state)
    }

    pub fn at_or_before(&self, tick: Tick) -> Option<Snapshot<S>> {
        self.inner.read().at_or_before(tick)
    }

    pub fn latest(&self) -> Option<Snapshot<S>> {
        self.inner.read().latest()
    }

    /// Copies the whole ring out under one read lock.
    pub fn snapshot(&self) -> SnapshotRing<S> {
        self.inner.read().clone()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl<S: Interpolate> SharedSnapshotRing<S> {
    pub fn interpolate(&self, tick: f64) -> Option<S> {
        self.inner.read().interpolate(tick)
    }
}
