use glam::Vec3;
use serde::{Deserialize, Serialize};

/// State that can be blended between two snapshots.
pub trait Interpolate: Clone {
    fn interpolate(&self, to: &Self, t: f32) -> Self;
}

impl Interpolate for Vec3 {
    fn interpolate(&self, to: &Self, t: f32) -> Self {
        self.lerp(*to, t)
    }
}

/// Position and view of one entity at one tick. Angles are in degrees; yaw
/// wraps around the circle, pitch is signed and never wraps.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl EntitySnapshot {
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            yaw,
            pitch,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }
}

impl Interpolate for EntitySnapshot {
    fn interpolate(&self, to: &Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(to.position, t),
            velocity: self.velocity.lerp(to.velocity, t),
            yaw: lerp_angle(self.yaw, to.yaw, t),
            pitch: self.pitch + (to.pitch - self.pitch) * t,
        }
    }
}

/// Blends two angles in degrees along the shorter arc. The result is in
/// `[0, 360)`.
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    let mut delta = (to - from).rem_euclid(360.0);
    if delta > 180.0 {
        delta -= 360.0;
    }
    (from + delta * t).rem_euclid(360.0)
}
