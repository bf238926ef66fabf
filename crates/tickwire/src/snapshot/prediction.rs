use glam::Vec3;
use log::debug;

use super::ring::SnapshotRing;
use super::state::EntitySnapshot;
use crate::types::Tick;

const ERROR_THRESHOLD: f32 = 0.0001;
const SNAP_THRESHOLD: f32 = 64.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Prediction matched, or there was nothing to compare against.
    None,
    /// Small error. The offset has been applied to the stored predictions;
    /// the renderer should blend it out over a few frames.
    Smooth(Vec3),
    /// Large error. Predictions were moved and the view should jump.
    Snap(Vec3),
}

/// Compares the client's predicted states against authoritative ones as
/// they arrive from the server.
#[derive(Debug)]
pub struct Reconciler {
    predictions: SnapshotRing<EntitySnapshot>,
    error_threshold: f32,
    snap_threshold: f32,
    last_reconciled: Option<Tick>,
}

impl Reconciler {
    pub fn new(depth: usize) -> Self {
        Self {
            predictions: SnapshotRing::new(depth),
            error_threshold: ERROR_THRESHOLD,
            snap_threshold: SNAP_THRESHOLD,
            last_reconciled: None,
        }
    }

    pub fn with_thresholds(mut self, error: f32, snap: f32) -> Self {
        self.error_threshold = error;
        self.snap_threshold = snap;
        self
    }

    pub fn record_prediction(&mut self, tick: Tick, state: EntitySnapshot) {
        self.predictions.push(tick, state);
    }

    pub fn predicted(&self, tick: Tick) -> Option<EntitySnapshot> {
        self.predictions.get(tick).copied()
    }

    pub fn reconcile(&mut self, tick: Tick, authoritative: &EntitySnapshot) -> Correction {
        if self.last_reconciled.is_some_and(|last| tick <= last) {
            return Correction::None;
        }
        let Some(predicted) = self.predictions.get(tick).copied() else {
            return Correction::None;
        };
        self.last_reconciled = Some(tick);

        let error = authoritative.position - predicted.position;
        let magnitude = error.length();
        if magnitude < self.error_threshold {
            return Correction::None;
        }

        self.predictions
            .update_from(tick, |state| state.position += error);

        if magnitude > self.snap_threshold {
            debug!("prediction off by {magnitude:.2} at tick {tick}, snapping");
            Correction::Snap(error)
        } else {
            Correction::Smooth(error)
        }
    }

    pub fn latest(&self) -> Option<EntitySnapshot> {
        self.predictions.latest().map(|snapshot| snapshot.state)
    }

    pub fn reset(&mut self) {
        self.predictions.clear();
        self.last_reconciled = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f32) -> EntitySnapshot {
        EntitySnapshot::new(Vec3::new(x, 0.0, 0.0), 0.0, 0.0)
    }

    fn predicted_run() -> Reconciler {
        let mut reconciler = Reconciler::new(16);
        for tick in 1..=5 {
            reconciler.record_prediction(tick, at(tick as f32));
        }
        reconciler
    }

    #[test]
    fn matching_prediction_needs_no_correction() {
        let mut reconciler = predicted_run();
        assert_eq!(reconciler.reconcile(3, &at(3.0)), Correction::None);
    }

    #[test]
    fn small_error_is_smoothed_and_carried_forward() {
        let mut reconciler = predicted_run();
        let correction = reconciler.reconcile(3, &at(3.5));
        assert_eq!(correction, Correction::Smooth(Vec3::new(0.5, 0.0, 0.0)));
        assert_eq!(reconciler.predicted(2).map(|s| s.position.x), Some(2.0));
        assert_eq!(reconciler.predicted(4).map(|s| s.position.x), Some(4.5));
        assert_eq!(reconciler.latest().map(|s| s.position.x), Some(5.5));
    }

    #[test]
    fn large_error_snaps() {
        let mut reconciler = predicted_run();
        assert!(matches!(
            reconciler.reconcile(2, &at(200.0)),
            Correction::Snap(_)
        ));
    }

    #[test]
    fn stale_or_unknown_ticks_are_ignored() {
        let mut reconciler = predicted_run();
        reconciler.reconcile(4, &at(4.0));
        assert_eq!(reconciler.reconcile(3, &at(30.0)), Correction::None);
        assert_eq!(reconciler.reconcile(9, &at(30.0)), Correction::None);

        reconciler.reset();
        assert_eq!(reconciler.latest(), None);
    }
}
