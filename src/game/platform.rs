//! Sliding Platforms
//!
//! A platform travels back and forth between two points with linear yo-yo
//! motion. Each physics tick it moves first (`BeforePhysicsTick`) and hands
//! its horizontal velocity to bodies riding it as an external force.

use crate::config::PlatformConfig;
use crate::core::vec2::{Rect, Vec2};
use crate::sim::physics::SENSOR_SKIN;

/// A moving platform spawned by a placed `sliding_platform` gizmo.
#[derive(Debug, Clone)]
pub struct SlidingPlatform {
    center: Vec2,
    start: Vec2,
    end: Vec2,
    half_extents: Vec2,
    leg_seconds: f32,
    /// Time into the current round trip, `[0, 2 * leg_seconds)`.
    phase: f32,
    position: Vec2,
    last_delta: Vec2,
    active: bool,
}

impl SlidingPlatform {
    /// Platform centered on `center`, sliding along `angle_deg` (0 = horizontal).
    pub fn new(center: Vec2, angle_deg: f32, config: &PlatformConfig) -> Self {
        let axis = Vec2::RIGHT.rotate_deg(angle_deg) * config.travel;
        Self {
            center,
            start: center - axis,
            end: center + axis,
            half_extents: config.half_extents,
            leg_seconds: config.leg_seconds,
            phase: config.leg_seconds * 0.5,
            position: center,
            last_delta: Vec2::ZERO,
            active: false,
        }
    }

    /// Current center position.
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Displacement of the last `advance`.
    pub fn last_delta(&self) -> Vec2 {
        self.last_delta
    }

    /// Whether the platform is moving.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Collider bounds.
    pub fn bounds(&self) -> Rect {
        Rect::from_center(self.position, self.half_extents)
    }

    /// Start moving from wherever the platform rests (the midpoint after
    /// spawn or `stop`) toward `end`.
    pub fn start(&mut self) {
        self.active = true;
    }

    /// Stop and return to the midpoint.
    pub fn stop(&mut self) {
        self.active = false;
        self.phase = self.leg_seconds * 0.5;
        self.position = self.center;
        self.last_delta = Vec2::ZERO;
    }

    /// Move by one physics step. Returns the displacement.
    pub fn advance(&mut self, dt: f32) -> Vec2 {
        if !self.active {
            self.last_delta = Vec2::ZERO;
            return Vec2::ZERO;
        }

        self.phase = (self.phase + dt).rem_euclid(2.0 * self.leg_seconds);
        let t = self.phase / self.leg_seconds;
        let progress = if t <= 1.0 { t } else { 2.0 - t };

        let next = self.start.lerp(self.end, progress);
        self.last_delta = next - self.position;
        self.position = next;
        self.last_delta
    }

    /// Force handed to a rider for the last step: horizontal velocity only.
    pub fn carry_force(&self, dt: f32) -> Vec2 {
        if dt <= 0.0 {
            return Vec2::ZERO;
        }
        Vec2::new(self.last_delta.x / dt, 0.0)
    }

    /// Whether a body's collider touches the platform.
    pub fn touches(&self, body: &Rect) -> bool {
        self.bounds().grow(SENSOR_SKIN).overlaps(body)
    }
}

// =============================================================================
// TESTS
// =============================================================================
