//! Game Configuration
//!
//! Every tunable of a session: tick rates, movement stats, map geometry and
//! scoring. Loaded from JSON; missing fields fall back to the defaults below.

use std::path::Path;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::grid::{BuildingArea, GridPos};
use crate::core::vec2::{Rect, Vec2};

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid JSON for `GameConfig`.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A tick rate is zero, negative or not finite.
    #[error("tick rate `{field}` must be positive, got {value}")]
    InvalidTickRate {
        /// Offending field name
        field: &'static str,
        /// Offending value
        value: f64,
    },

    /// Building area corners are inverted.
    #[error("building area is inverted: {0:?}")]
    InvertedBuildingArea(BuildingArea),

    /// Any other out-of-range value.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Offending field name
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

// =============================================================================
// SECTIONS
// =============================================================================

/// Tick rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Logic ticks per second (snapshot cadence).
    pub logic_hz: f64,
    /// Physics ticks per second.
    pub physics_hz: f64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            logic_hz: 20.0,
            physics_hz: 50.0,
        }
    }
}

impl TickConfig {
    /// Seconds between logic ticks.
    pub fn logic_interval(&self) -> f64 {
        1.0 / self.logic_hz
    }

    /// Seconds between physics ticks.
    pub fn physics_interval(&self) -> f64 {
        1.0 / self.physics_hz
    }
}

/// Player movement stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Ground speed (units/s).
    pub horizontal_speed: f32,
    /// Extra ground speed while sprinting.
    pub sprint_boost: f32,
    /// Vertical velocity set by a jump.
    pub jump_force: f32,
    /// Vertical velocity multiplier when a jump is released early.
    pub jump_cancel_mult: f32,
    /// Grace window after leaving ground or wall (seconds).
    pub coyote_time: f64,
    /// Velocity of a wall jump, `x` pointing away from the wall.
    pub wall_jump_force: Vec2,
    /// Fraction of ground speed added per physics tick while airborne.
    pub in_air_control: f32,
    /// Time after a wall jump before horizontal input can cancel it.
    pub wall_jump_cooldown: f64,
    /// Minimum gap before landing or a new wall hug resets jump flags.
    pub reset_threshold: f64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            horizontal_speed: 4.0,
            sprint_boost: 2.0,
            jump_force: 6.0,
            jump_cancel_mult: 0.3,
            coyote_time: 0.2,
            wall_jump_force: Vec2::new(4.0, 6.0),
            in_air_control: 0.5,
            wall_jump_cooldown: 0.1,
            reset_threshold: 0.1,
        }
    }
}

/// Level geometry and placement grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Cells where gizmos may be anchored.
    pub building_area: BuildingArea,
    /// Cells held by static level geometry. Cell `(x, y)` is the unit square
    /// centered on world point `(x, y)`.
    pub preoccupied: Vec<GridPos>,
    /// Playable bounds; death bounds are these grown by `death_margin`.
    pub bounds: Rect,
    /// Margin added to `bounds` on every side for the out-of-bounds check.
    pub death_margin: f32,
    /// Finish zone.
    pub goal: Rect,
    /// Spawn positions, assigned to clients in join order.
    pub spawn_points: Vec<Vec2>,
    /// Static solid boxes for the reference integrator.
    pub solids: Vec<Rect>,
    /// Gravity applied to dynamic bodies (units/s^2).
    pub gravity: f32,
    /// Player collider half extents.
    pub body_half_extents: Vec2,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            building_area: BuildingArea::new(GridPos::new(0, 0), GridPos::new(10, 10)),
            preoccupied: (0..=10).map(|x| GridPos::new(x, -1)).collect(),
            bounds: Rect::new(Vec2::new(-4.5, -1.5), Vec2::new(16.5, 14.0)),
            death_margin: 3.0,
            goal: Rect::new(Vec2::new(13.0, -0.5), Vec2::new(15.0, 3.0)),
            spawn_points: vec![
                Vec2::new(-3.5, 0.0),
                Vec2::new(-2.5, 0.0),
                Vec2::new(-1.5, 0.0),
                Vec2::new(-0.5, 0.0),
            ],
            solids: vec![Rect::new(Vec2::new(-4.5, -1.5), Vec2::new(16.5, -0.5))],
            gravity: -20.0,
            body_half_extents: Vec2::new(0.4, 0.5),
        }
    }
}

impl MapConfig {
    /// Bounds beyond which a body dies.
    pub fn death_bounds(&self) -> Rect {
        self.bounds.grow(self.death_margin)
    }
}

/// Sliding platform motion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Seconds per leg of the yo-yo.
    pub leg_seconds: f32,
    /// Distance from the midpoint to each end.
    pub travel: f32,
    /// Platform collider half extents.
    pub half_extents: Vec2,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            leg_seconds: 5.0,
            travel: 2.0,
            half_extents: Vec2::new(1.0, 0.25),
        }
    }
}

/// Round scoring values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Points needed to win the match.
    pub points_to_win: u32,
    /// Awarded for reaching the goal.
    pub finish: u32,
    /// Awarded to finishers with less than half the leader's points.
    pub underdog: u32,
    /// Awarded to the only finisher.
    pub single_finisher: u32,
    /// Awarded to the first of several finishers.
    pub first_finisher: u32,
    /// Awarded per kill, only if anyone finished.
    pub trap: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            points_to_win: 16,
            finish: 4,
            underdog: 4,
            single_finisher: 3,
            first_finisher: 2,
            trap: 1,
        }
    }
}

// =============================================================================
// ROOT
// =============================================================================

/// Complete session configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Tick rates
    pub tick: TickConfig,
    /// Movement stats
    pub movement: MovementConfig,
    /// Map geometry
    pub map: MapConfig,
    /// Sliding platforms
    pub platform: PlatformConfig,
    /// Scoring
    pub scoring: ScoringConfig,
}

impl GameConfig {
    /// Parse and validate from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("tick.logic_hz", self.tick.logic_hz), ("tick.physics_hz", self.tick.physics_hz)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidTickRate { field, value });
            }
        }

        if !self.map.building_area.is_well_formed() {
            return Err(ConfigError::InvertedBuildingArea(self.map.building_area));
        }

        if self.map.spawn_points.is_empty() {
            return Err(ConfigError::Invalid {
                field: "map.spawn_points",
                reason: "at least one spawn point is required".to_string(),
            });
        }

        let m = &self.movement;
        let speeds = [m.horizontal_speed, m.sprint_boost, m.jump_force, m.in_air_control];
        if speeds.iter().any(|v| !v.is_finite() || *v < 0.0) || !m.wall_jump_force.is_finite() {
            return Err(ConfigError::Invalid {
                field: "movement",
                reason: "speeds and forces must be finite and non-negative".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&m.jump_cancel_mult) {
            return Err(ConfigError::Invalid {
                field: "movement.jump_cancel_mult",
                reason: format!("must be within [0, 1], got {}", m.jump_cancel_mult),
            });
        }

        if !(self.platform.leg_seconds.is_finite() && self.platform.leg_seconds > 0.0) {
            return Err(ConfigError::Invalid {
                field: "platform.leg_seconds",
                reason: format!("must be positive, got {}", self.platform.leg_seconds),
            });
        }

        if self.scoring.points_to_win == 0 {
            return Err(ConfigError::Invalid {
                field: "scoring.points_to_win",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick.logic_hz, 20.0);
        assert_eq!(config.tick.physics_hz, 50.0);
        assert_eq!(config.scoring.points_to_win, 16);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = GameConfig::from_json_str(r#"{ "tick": { "logic_hz": 30.0 } }"#).unwrap();
        assert_eq!(config.tick.logic_hz, 30.0);
        assert_eq!(config.tick.physics_hz, 50.0);
        assert_eq!(config.movement.horizontal_speed, 4.0);
    }

    #[test]
    fn test_rejects_zero_tick_rate() {
        let err = GameConfig::from_json_str(r#"{ "tick": { "physics_hz": 0.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTickRate { field: "tick.physics_hz", .. }));
    }

    #[test]
    fn test_rejects_inverted_building_area() {
        let json = r#"{ "map": { "building_area": {
            "left_bottom": { "x": 5, "y": 5 },
            "right_top": { "x": 0, "y": 0 }
        } } }"#;
        let err = GameConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, ConfigError::InvertedBuildingArea(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = GameConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_json_round_trip() {
        let config = GameConfig::default();
        let json = config.to_json().unwrap();
        let back = GameConfig::from_json_str(&json).unwrap();
        assert_eq!(back.map.preoccupied, config.map.preoccupied);
    }

    #[test]
    fn test_from_file_loads_and_reports_io_errors() {
        let path = std::env::temp_dir().join(format!("gizmo_party_config_{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "scoring": { "points_to_win": 10 } }"#).unwrap();

        let config = GameConfig::from_file(&path).unwrap();
        assert_eq!(config.scoring.points_to_win, 10);
        assert_eq!(config.scoring.finish, 4);

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(GameConfig::from_file(&path), Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_death_bounds_grow_map_bounds() {
        let map = MapConfig::default();
        let death = map.death_bounds();
        assert_eq!(death.min, Vec2::new(-7.5, -4.5));
        assert_eq!(death.max, Vec2::new(19.5, 17.0));
    }
}
