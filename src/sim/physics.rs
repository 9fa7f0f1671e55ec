//! Physics World Boundary
//!
//! The integrator is a black box invoked once per physics tick. Sessions talk
//! to it through [`PhysicsWorld`]; [`FlatWorld`] is a small axis-aligned
//! reference integrator (gravity, static boxes, moving boxes) used by tests
//! and the demo binary.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::config::MapConfig;
use crate::core::vec2::{Rect, Vec2};
use crate::game::body::{BodyId, BodyState};

/// Thickness of the contact sensors around a body.
pub const SENSOR_SKIN: f32 = 0.05;

/// Vertical inset of the wall sensors, so the floor is not a wall.
const WALL_SENSOR_INSET: f32 = 0.1;

/// Float error tolerated when a body rests flush against a solid.
const PENETRATION_SLOP: f32 = 1e-4;

/// How a participant integrates a body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationMode {
    /// Simulated locally: gravity, collisions, velocity.
    Dynamic,
    /// Held where the last snapshot put it.
    KinematicMirror,
}

/// Side(s) on which a wall touches the body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WallSide {
    /// Wall to the left
    Left,
    /// Wall to the right
    Right,
    /// Walls on both sides
    Both,
}

impl WallSide {
    /// -1 left, +1 right, 0 both.
    pub fn direction(self) -> f32 {
        match self {
            WallSide::Left => -1.0,
            WallSide::Right => 1.0,
            WallSide::Both => 0.0,
        }
    }

    fn from_flags(left: bool, right: bool) -> Option<Self> {
        match (left, right) {
            (true, true) => Some(WallSide::Both),
            (true, false) => Some(WallSide::Left),
            (false, true) => Some(WallSide::Right),
            (false, false) => None,
        }
    }
}

/// Sensor readings for one body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Contacts {
    /// Ground sensor hit
    pub grounded: bool,
    /// Wall sensors hit
    pub wall: Option<WallSide>,
}

/// Black-box physics integrator.
pub trait PhysicsWorld {
    /// Add a body. Replaces an existing body with the same id.
    fn spawn_body(&mut self, id: BodyId, state: BodyState, mode: IntegrationMode);

    /// Current state of a body.
    fn body_state(&self, id: BodyId) -> Option<BodyState>;

    /// Overwrite a body's state. Returns false for unknown bodies.
    fn set_body_state(&mut self, id: BodyId, state: BodyState) -> bool;

    /// Switch a body between dynamic and kinematic mirror.
    fn set_mode(&mut self, id: BodyId, mode: IntegrationMode) -> bool;

    /// Current integration mode of a body.
    fn mode(&self, id: BodyId) -> Option<IntegrationMode>;

    /// Collider bounds of a body.
    fn body_bounds(&self, id: BodyId) -> Option<Rect>;

    /// Probe the ground and wall sensors of a body.
    fn contacts(&self, id: BodyId) -> Contacts;

    /// Add immovable level geometry.
    fn add_static_box(&mut self, rect: Rect);

    /// Create or move a solid box owned by a world object (e.g. a platform).
    fn set_moving_box(&mut self, key: u32, rect: Rect);

    /// Advance every dynamic body by `dt`.
    fn step(&mut self, dt: f32);
}

// =============================================================================
// REFERENCE INTEGRATOR
// =============================================================================

#[derive(Debug, Clone)]
struct FlatBody {
    state: BodyState,
    mode: IntegrationMode,
}

/// Axis-aligned integrator: gravity, then per-axis sweep against solids.
#[derive(Debug, Clone)]
pub struct FlatWorld {
    gravity: f32,
    half_extents: Vec2,
    bodies: BTreeMap<BodyId, FlatBody>,
    statics: Vec<Rect>,
    moving: BTreeMap<u32, Rect>,
}

impl FlatWorld {
    /// Empty world.
    pub fn new(gravity: f32, half_extents: Vec2) -> Self {
        Self {
            gravity,
            half_extents,
            bodies: BTreeMap::new(),
            statics: Vec::new(),
            moving: BTreeMap::new(),
        }
    }

    /// World with the map's static geometry.
    pub fn from_map(map: &MapConfig) -> Self {
        let mut world = Self::new(map.gravity, map.body_half_extents);
        world.statics.extend(map.solids.iter().copied());
        world
    }

    /// Number of bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn bounds_at(&self, position: Vec2) -> Rect {
        Rect::from_center(position, self.half_extents)
    }

    fn solids(&self) -> impl Iterator<Item = &Rect> {
        self.statics.iter().chain(self.moving.values())
    }

    fn any_solid_overlaps(&self, probe: &Rect) -> bool {
        self.solids().any(|s| s.overlaps(probe))
    }

    /// Move along one axis and push out of any solid entered.
    fn sweep_axis(&self, state: &mut BodyState, delta: f32, horizontal: bool) {
        if delta == 0.0 {
            return;
        }
        if horizontal {
            state.position.x += delta;
        } else {
            state.position.y += delta;
        }

        for solid in self.solids() {
            let bounds = self.bounds_at(state.position);
            if !penetrates(&bounds, solid) {
                continue;
            }
            if horizontal {
                state.position.x = if delta > 0.0 {
                    solid.min.x - self.half_extents.x
                } else {
                    solid.max.x + self.half_extents.x
                };
                state.velocity.x = 0.0;
            } else {
                state.position.y = if delta > 0.0 {
                    solid.min.y - self.half_extents.y
                } else {
                    solid.max.y + self.half_extents.y
                };
                state.velocity.y = 0.0;
            }
        }
    }
}

/// Overlap deeper than `PENETRATION_SLOP` on both axes. Touching edges do not count.
fn penetrates(a: &Rect, b: &Rect) -> bool {
    a.min.x + PENETRATION_SLOP < b.max.x
        && b.min.x + PENETRATION_SLOP < a.max.x
        && a.min.y + PENETRATION_SLOP < b.max.y
        && b.min.y + PENETRATION_SLOP < a.max.y
}

impl PhysicsWorld for FlatWorld {
    fn spawn_body(&mut self, id: BodyId, state: BodyState, mode: IntegrationMode) {
        self.bodies.insert(id, FlatBody { state, mode });
    }

    fn body_state(&self, id: BodyId) -> Option<BodyState> {
        self.bodies.get(&id).map(|b| b.state)
    }

    fn set_body_state(&mut self, id: BodyId, state: BodyState) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) => {
                body.state = state;
                true
            }
            None => false,
        }
    }

    fn set_mode(&mut self, id: BodyId, mode: IntegrationMode) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) => {
                body.mode = mode;
                true
            }
            None => false,
        }
    }

    fn mode(&self, id: BodyId) -> Option<IntegrationMode> {
        self.bodies.get(&id).map(|b| b.mode)
    }

    fn body_bounds(&self, id: BodyId) -> Option<Rect> {
        self.bodies.get(&id).map(|b| self.bounds_at(b.state.position))
    }

    fn contacts(&self, id: BodyId) -> Contacts {
        let Some(bounds) = self.body_bounds(id) else {
            return Contacts::default();
        };

        let ground = Rect::new(
            Vec2::new(bounds.min.x, bounds.min.y - SENSOR_SKIN),
            Vec2::new(bounds.max.x, bounds.min.y),
        );
        let left = Rect::new(
            Vec2::new(bounds.min.x - SENSOR_SKIN, bounds.min.y + WALL_SENSOR_INSET),
            Vec2::new(bounds.min.x, bounds.max.y - WALL_SENSOR_INSET),
        );
        let right = Rect::new(
            Vec2::new(bounds.max.x, bounds.min.y + WALL_SENSOR_INSET),
            Vec2::new(bounds.max.x + SENSOR_SKIN, bounds.max.y - WALL_SENSOR_INSET),
        );

        Contacts {
            grounded: self.any_solid_overlaps(&ground),
            wall: WallSide::from_flags(self.any_solid_overlaps(&left), self.any_solid_overlaps(&right)),
        }
    }

    fn add_static_box(&mut self, rect: Rect) {
        self.statics.push(rect);
    }

    fn set_moving_box(&mut self, key: u32, rect: Rect) {
        self.moving.insert(key, rect);
    }

    fn step(&mut self, dt: f32) {
        let ids: Vec<BodyId> = self
            .bodies
            .iter()
            .filter(|(_, b)| b.mode == IntegrationMode::Dynamic)
            .map(|(id, _)| *id)
            .collect();

        for id in ids {
            let Some(mut state) = self.body_state(id) else { continue };
            state.velocity.y += self.gravity * dt;

            let dx = state.velocity.x * dt;
            let dy = state.velocity.y * dt;
            self.sweep_axis(&mut state, dx, true);
            self.sweep_axis(&mut state, dy, false);

            self.set_body_state(id, state);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
