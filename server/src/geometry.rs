//! Planar geometry on the x/z ground plane.

use std::f32::consts::{PI, TAU};

/// A location on the ground plane, optionally tagged with the entity it
/// belongs to. Always a snapshot, never a live reference.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub z: f32,
    pub owner_id: Option<String>,
}

impl Point {
    pub fn new(x: f32, z: f32) -> Self {
        Self {
            x,
            z,
            owner_id: None,
        }
    }

    pub fn owned_by(x: f32, z: f32, owner_id: impl Into<String>) -> Self {
        Self {
            x,
            z,
            owner_id: Some(owner_id.into()),
        }
    }

    pub fn distance_to(&self, other: &Point) -> f32 {
        distance(self.x, self.z, other.x, other.z)
    }
}

pub fn distance(x1: f32, z1: f32, x2: f32, z2: f32) -> f32 {
    let dx = x2 - x1;
    let dz = z2 - z1;
    (dx * dx + dz * dz).sqrt()
}

/// Wraps an angle in radians into `(-PI, PI]`.
pub fn normalize_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Heading in radians from `(x, z)` towards `target`.
pub fn bearing(x: f32, z: f32, target: &Point) -> f32 {
    (target.z - z).atan2(target.x - x)
}

/// Absolute angle in degrees between a facing and a desired heading.
pub fn angle_diff_degrees(current: f32, desired: f32) -> f32 {
    normalize_angle(desired - current).abs().to_degrees()
}
