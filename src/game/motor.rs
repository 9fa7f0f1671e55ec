//! Player Movement Rules
//!
//! Per-body controller run by whichever side simulates the body. Input edges
//! (jump press/release) act on velocity as soon as they are latched; the
//! continuous rules (run, air control, wall-jump lockout, external forces)
//! run once per physics tick in `before_physics_player`.
//!
//! All timers read simulated physics time, never wall-clock time.

use crate::config::MovementConfig;
use crate::core::vec2::Vec2;
use crate::game::body::BodyState;
use crate::game::input::InputFrame;
use crate::sim::physics::{Contacts, WallSide};

/// Movement controller state for one body.
#[derive(Debug, Clone, Default)]
pub struct Motor {
    axis: f32,
    sprint: bool,
    is_jumping: bool,
    is_wall_jumping: bool,
    wall_jumped_at: Option<f64>,
    last_grounded: Option<f64>,
    last_wall_hug: Option<(f64, WallSide)>,
    immobile: bool,
    external_force: Vec2,
}

impl Motor {
    /// Fresh controller: no input, not jumping, mobile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch a freshly sampled frame. Jump edges act on `state` immediately.
    pub fn latch(&mut self, input: InputFrame, now: f64, state: &mut BodyState, stats: &MovementConfig) {
        if self.immobile {
            self.axis = 0.0;
            self.sprint = false;
            return;
        }

        self.axis = input.axis();
        self.sprint = input.sprinting();

        if input.jump_pressed() {
            self.press_jump(now, state, stats);
        }
        if input.jump_released() {
            self.release_jump(state, stats);
        }
    }

    /// Jump press: wall jump if a wall was hugged recently, else a normal
    /// jump within coyote time, else nothing.
    pub fn press_jump(&mut self, now: f64, state: &mut BodyState, stats: &MovementConfig) {
        if let Some((hugged_at, side)) = self.last_wall_hug {
            if hugged_at + stats.coyote_time > now {
                state.velocity = Vec2::new(
                    -side.direction() * stats.wall_jump_force.x,
                    stats.wall_jump_force.y,
                );
                self.is_wall_jumping = true;
                self.wall_jumped_at = Some(now);
                return;
            }
        }

        if self.can_jump(now, stats) {
            self.is_jumping = true;
            state.velocity.y = stats.jump_force;
        }
    }

    /// Jump release: cut upward velocity of a jump in progress.
    pub fn release_jump(&mut self, state: &mut BodyState, stats: &MovementConfig) {
        if !self.is_jumping {
            return;
        }
        self.is_jumping = false;
        state.velocity.y *= stats.jump_cancel_mult;
    }

    /// Whether a normal jump is allowed at `now`.
    pub fn can_jump(&self, now: f64, stats: &MovementConfig) -> bool {
        self.last_grounded
            .is_some_and(|t| t + stats.coyote_time > now)
    }

    /// Apply the per-physics-tick movement rules.
    pub fn step(&mut self, now: f64, contacts: Contacts, state: &mut BodyState, stats: &MovementConfig) {
        if self.immobile {
            state.velocity = Vec2::ZERO;
            return;
        }

        let grounded = self.update_grounded(now, contacts.grounded, stats);
        self.update_wall_hug(now, contacts.wall, stats);

        let cooled_down = self
            .wall_jumped_at
            .map_or(true, |t| now >= t + stats.wall_jump_cooldown);
        if self.axis != 0.0 && cooled_down {
            self.is_wall_jumping = false;
        }

        if self.is_wall_jumping {
            // Face away from the wall, keep the jump's velocity
            if let Some((_, side)) = self.last_wall_hug {
                if side != WallSide::Both {
                    state.facing = side == WallSide::Left;
                }
            }
            state.velocity += self.external_force;
            return;
        }

        if self.axis != 0.0 {
            state.facing = self.axis > 0.0;
        }

        if grounded {
            let boost = if self.sprint { stats.sprint_boost } else { 0.0 };
            state.velocity.x = (stats.horizontal_speed + boost) * self.axis;
        } else {
            let push = stats.horizontal_speed * self.axis * stats.in_air_control;
            if push > 0.0 && state.velocity.x < stats.horizontal_speed {
                state.velocity.x += push;
            } else if push < 0.0 && state.velocity.x > -stats.horizontal_speed {
                state.velocity.x += push;
            }
        }

        state.velocity += self.external_force;
    }

    /// Step for a body simulated without input (server side, unowned or
    /// after a revoke). External forces only reach bodies stepped under
    /// authority; this only holds immobile bodies still.
    pub fn step_passive(&self, state: &mut BodyState) {
        if self.immobile {
            state.velocity = Vec2::ZERO;
        }
    }

    fn update_grounded(&mut self, now: f64, grounded: bool, stats: &MovementConfig) -> bool {
        if !grounded {
            return false;
        }
        if self.last_grounded.map_or(true, |t| t + stats.reset_threshold < now) {
            self.is_jumping = false;
            self.is_wall_jumping = false;
        }
        self.last_grounded = Some(now);
        true
    }

    fn update_wall_hug(&mut self, now: f64, wall: Option<WallSide>, stats: &MovementConfig) {
        let Some(side) = wall else { return };
        if self.last_wall_hug.map_or(true, |(t, _)| t + stats.reset_threshold < now) {
            self.is_jumping = false;
            self.is_wall_jumping = false;
        }
        self.last_wall_hug = Some((now, side));
    }

    /// Add a force for the current physics tick only.
    pub fn add_external_force(&mut self, force: Vec2) {
        self.external_force += force;
    }

    /// Force accumulated for the current tick.
    pub fn external_force(&self) -> Vec2 {
        self.external_force
    }

    /// Clear the per-tick force buffer. Runs in `after_physics` everywhere.
    pub fn reset_external_force(&mut self) {
        self.external_force = Vec2::ZERO;
    }

    /// Freeze the body (dead or finished) or release it.
    pub fn set_immobile(&mut self, immobile: bool, state: &mut BodyState) {
        self.immobile = immobile;
        if immobile {
            self.axis = 0.0;
            self.sprint = false;
            self.is_jumping = false;
            self.is_wall_jumping = false;
            state.velocity = Vec2::ZERO;
        }
    }

    /// Whether the body is frozen.
    pub fn is_immobile(&self) -> bool {
        self.immobile
    }

    /// Whether a normal jump is in progress.
    pub fn is_jumping(&self) -> bool {
        self.is_jumping
    }

    /// Whether a wall jump is locking horizontal control.
    pub fn is_wall_jumping(&self) -> bool {
        self.is_wall_jumping
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.02;

    fn stats() -> MovementConfig {
        MovementConfig::default()
    }

    fn ground() -> Contacts {
        Contacts { grounded: true, wall: None }
    }

    fn air() -> Contacts {
        Contacts::default()
    }

    #[test]
    fn test_ground_run_and_sprint() {
        let mut motor = Motor::new();
        let mut state = BodyState::default();

        motor.latch(InputFrame::with_movement(127), 0.0, &mut state, &stats());
        motor.step(0.0, ground(), &mut state, &stats());
        assert_eq!(state.velocity.x, 4.0);
        assert!(state.facing);

        motor.latch(InputFrame::with_movement(-127).sprint(), DT, &mut state, &stats());
        motor.step(DT, ground(), &mut state, &stats());
        assert_eq!(state.velocity.x, -6.0);
        assert!(!state.facing);
    }

    #[test]
    fn test_air_control_caps_at_speed() {
        let mut motor = Motor::new();
        let mut state = BodyState::default();
        motor.latch(InputFrame::with_movement(127), 0.0, &mut state, &stats());

        motor.step(0.0, air(), &mut state, &stats());
        assert_eq!(state.velocity.x, 2.0);
        motor.step(DT, air(), &mut state, &stats());
        assert_eq!(state.velocity.x, 4.0);
        // At speed: no more push
        motor.step(2.0 * DT, air(), &mut state, &stats());
        assert_eq!(state.velocity.x, 4.0);
    }

    #[test]
    fn test_jump_within_coyote_time() {
        let mut motor = Motor::new();
        let mut state = BodyState::default();
        motor.step(0.0, ground(), &mut state, &stats());

        // Left the ground 0.15s ago: still allowed
        motor.latch(InputFrame::new().jump(), 0.15, &mut state, &stats());
        assert_eq!(state.velocity.y, 6.0);
        assert!(motor.is_jumping());
    }

    #[test]
    fn test_jump_after_coyote_time_ignored() {
        let mut motor = Motor::new();
        let mut state = BodyState::default();
        motor.step(0.0, ground(), &mut state, &stats());

        motor.latch(InputFrame::new().jump(), 0.25, &mut state, &stats());
        assert_eq!(state.velocity.y, 0.0);
        assert!(!motor.is_jumping());
    }

    #[test]
    fn test_never_grounded_cannot_jump() {
        let mut motor = Motor::new();
        let mut state = BodyState::default();
        motor.latch(InputFrame::new().jump(), 0.0, &mut state, &stats());
        assert_eq!(state.velocity.y, 0.0);
    }

    #[test]
    fn test_jump_release_cuts_velocity() {
        let mut motor = Motor::new();
        let mut state = BodyState::default();
        motor.step(0.0, ground(), &mut state, &stats());
        motor.latch(InputFrame::new().jump(), DT, &mut state, &stats());
        motor.latch(InputFrame::new().release(), 2.0 * DT, &mut state, &stats());

        assert!((state.velocity.y - 1.8).abs() < 1e-6);
        assert!(!motor.is_jumping());

        // Second release does nothing
        motor.latch(InputFrame::new().release(), 3.0 * DT, &mut state, &stats());
        assert!((state.velocity.y - 1.8).abs() < 1e-6);
    }

    #[test]
    fn test_wall_jump_pushes_away() {
        let mut motor = Motor::new();
        let mut state = BodyState::default();
        let hugging_left = Contacts { grounded: false, wall: Some(WallSide::Left) };
        motor.step(0.0, hugging_left, &mut state, &stats());

        motor.latch(InputFrame::new().jump(), DT, &mut state, &stats());
        assert_eq!(state.velocity, Vec2::new(4.0, 6.0));
        assert!(motor.is_wall_jumping());

        // Horizontal control skipped, facing turns away from the wall
        motor.step(DT, air(), &mut state, &stats());
        assert_eq!(state.velocity, Vec2::new(4.0, 6.0));
        assert!(state.facing);
    }

    #[test]
    fn test_wall_jump_lockout_ends_after_cooldown_with_input() {
        let mut motor = Motor::new();
        let mut state = BodyState::default();
        let hugging_right = Contacts { grounded: false, wall: Some(WallSide::Right) };
        motor.step(0.0, hugging_right, &mut state, &stats());
        motor.latch(InputFrame::new().jump(), 0.0, &mut state, &stats());
        assert_eq!(state.velocity.x, -4.0);

        // Input before the cooldown keeps the lockout
        motor.latch(InputFrame::with_movement(127), 0.05, &mut state, &stats());
        motor.step(0.05, air(), &mut state, &stats());
        assert!(motor.is_wall_jumping());
        assert_eq!(state.velocity.x, -4.0);

        // After the cooldown input regains control
        motor.step(0.12, air(), &mut state, &stats());
        assert!(!motor.is_wall_jumping());
        assert_eq!(state.velocity.x, -2.0);
    }

    #[test]
    fn test_landing_resets_jump_flags() {
        let mut motor = Motor::new();
        let mut state = BodyState::default();
        motor.step(0.0, ground(), &mut state, &stats());
        motor.latch(InputFrame::new().jump(), 0.0, &mut state, &stats());
        assert!(motor.is_jumping());

        // Still touching ground on the next tick: below the reset threshold
        motor.step(DT, ground(), &mut state, &stats());
        assert!(motor.is_jumping());

        // Airborne for a while, then land
        motor.step(0.5, ground(), &mut state, &stats());
        assert!(!motor.is_jumping());
    }

    #[test]
    fn test_external_force_added_once() {
        let mut motor = Motor::new();
        let mut state = BodyState::default();
        motor.add_external_force(Vec2::new(1.5, 0.0));
        motor.step(0.0, ground(), &mut state, &stats());
        assert_eq!(state.velocity.x, 1.5);

        motor.reset_external_force();
        assert_eq!(motor.external_force(), Vec2::ZERO);
        motor.step(DT, ground(), &mut state, &stats());
        assert_eq!(state.velocity.x, 0.0);
    }

    #[test]
    fn test_immobile_ignores_input() {
        let mut motor = Motor::new();
        let mut state = BodyState::default();
        state.velocity = Vec2::new(3.0, 3.0);
        motor.set_immobile(true, &mut state);
        assert_eq!(state.velocity, Vec2::ZERO);

        motor.latch(InputFrame::with_movement(127).jump(), 0.0, &mut state, &stats());
        motor.step(0.0, ground(), &mut state, &stats());
        assert_eq!(state.velocity, Vec2::ZERO);
        assert!(motor.is_immobile());
    }

    #[test]
    fn test_passive_step_never_accumulates_force() {
        let mut motor = Motor::new();
        let mut state = BodyState::default();
        for _ in 0..10 {
            motor.add_external_force(Vec2::new(0.8, 0.0));
            motor.step_passive(&mut state);
            motor.reset_external_force();
        }
        assert_eq!(state.velocity, Vec2::ZERO);
    }
}
