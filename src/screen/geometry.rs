//! Dot-vs-target collision detection
//!
//! The dot only ever moves left/right, so the test is purely horizontal:
//! a target is "hit" once the dot's x enters its horizontal span.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// The steerable dot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dot {
    /// Measured left/top edge of the dot element (page pixels); the host
    /// writes it back as CSS `left`/`top`
    pub pos: Vec2,
    /// Radius from the rendered element width
    pub radius: f32,
}

impl Dot {
    pub fn new(pos: Vec2, radius: f32) -> Self {
        Self { pos, radius }
    }
}

/// A static answer box, measured once at load
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Left edge (offset-corrected)
    pub x: f32,
    /// Top edge (kept for layout; ignored by collision)
    pub y: f32,
    pub width: f32,
}

impl Target {
    pub fn new(x: f32, y: f32, width: f32) -> Self {
        Self { x, y, width }
    }

    /// Horizontal centre of the box
    #[inline]
    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    #[inline]
    pub fn half_width(&self) -> f32 {
        self.width / 2.0
    }
}

/// Check whether the dot has reached a target
///
/// Returns `false` once the horizontal distance exceeds `w/2 + r` and `true`
/// once it is at most `w/2`. The band in between (within reach of the radius
/// but `x` still outside the span) counts as no collision.
pub fn collides(dot: &Dot, target: &Target) -> bool {
    let distance = (dot.pos.x - target.center_x()).abs();

    if distance > target.half_width() + dot.radius {
        return false;
    }

    distance <= target.half_width()
}
