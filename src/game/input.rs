//! Input Capture
//!
//! Player input sampled once per logic tick by the participant that holds
//! authority over a body. Device bindings live outside this crate; they feed
//! frames through an [`InputSource`].

use std::collections::{BTreeMap, VecDeque};
use serde::{Serialize, Deserialize};
use crate::game::body::BodyId;

// =============================================================================
// INPUT TYPES
// =============================================================================

/// Input state for a single logic tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFrame {
    /// Horizontal axis: -127 (left) to +127 (right)
    pub move_x: i8,

    /// Action flags (packed bits):
    /// - Bit 0: Jump pressed since the previous frame
    /// - Bit 1: Jump released since the previous frame
    /// - Bit 2: Sprint held
    /// - Bit 3-7: Reserved
    pub flags: u8,
}

impl InputFrame {
    /// Jump press edge
    pub const FLAG_JUMP_PRESSED: u8 = 0x01;

    /// Jump release edge
    pub const FLAG_JUMP_RELEASED: u8 = 0x02;

    /// Sprint held
    pub const FLAG_SPRINT: u8 = 0x04;

    /// Idle frame.
    pub const fn new() -> Self {
        Self { move_x: 0, flags: 0 }
    }

    /// Frame with a horizontal axis value.
    pub const fn with_movement(move_x: i8) -> Self {
        Self { move_x, flags: 0 }
    }

    /// Horizontal axis in `[-1, 1]`. `-128` saturates to `-1`.
    #[inline]
    pub fn axis(&self) -> f32 {
        (self.move_x as f32 / 127.0).clamp(-1.0, 1.0)
    }

    /// Check if jump was pressed this frame.
    #[inline]
    pub fn jump_pressed(&self) -> bool {
        self.flags & Self::FLAG_JUMP_PRESSED != 0
    }

    /// Check if jump was released this frame.
    #[inline]
    pub fn jump_released(&self) -> bool {
        self.flags & Self::FLAG_JUMP_RELEASED != 0
    }

    /// Check if sprint is held.
    #[inline]
    pub fn sprinting(&self) -> bool {
        self.flags & Self::FLAG_SPRINT != 0
    }

    /// Check if this is an idle frame (no input).
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.move_x == 0 && self.flags == 0
    }

    fn set_flag(&mut self, flag: u8, on: bool) {
        if on {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    /// Set jump press edge.
    pub fn set_jump_pressed(&mut self, pressed: bool) {
        self.set_flag(Self::FLAG_JUMP_PRESSED, pressed);
    }

    /// Set jump release edge.
    pub fn set_jump_released(&mut self, released: bool) {
        self.set_flag(Self::FLAG_JUMP_RELEASED, released);
    }

    /// Set sprint.
    pub fn set_sprint(&mut self, held: bool) {
        self.set_flag(Self::FLAG_SPRINT, held);
    }

    /// Builder: with jump pressed.
    pub fn jump(mut self) -> Self {
        self.set_jump_pressed(true);
        self
    }

    /// Builder: with jump released.
    pub fn release(mut self) -> Self {
        self.set_jump_released(true);
        self
    }

    /// Builder: with sprint held.
    pub fn sprint(mut self) -> Self {
        self.set_sprint(true);
        self
    }
}

// =============================================================================
// INPUT SOURCES
// =============================================================================

/// Local input, polled once per logic tick for each body this participant
/// controls.
pub trait InputSource {
    /// Sample the input for `body`.
    fn poll(&mut self, body: BodyId) -> InputFrame;
}

/// Source that never produces input (server, spectators).
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleInput;

impl InputSource for IdleInput {
    fn poll(&mut self, _body: BodyId) -> InputFrame {
        InputFrame::new()
    }
}

/// Pre-recorded frames per body. Once a body's queue runs dry the last
/// held axis and sprint repeat without edges.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    queues: BTreeMap<BodyId, VecDeque<InputFrame>>,
    held: BTreeMap<BodyId, InputFrame>,
}

impl ScriptedInput {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append frames for a body.
    pub fn push(&mut self, body: BodyId, frames: impl IntoIterator<Item = InputFrame>) {
        self.queues.entry(body).or_default().extend(frames);
    }

    /// Frames still queued for a body.
    pub fn remaining(&self, body: BodyId) -> usize {
        self.queues.get(&body).map_or(0, VecDeque::len)
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self, body: BodyId) -> InputFrame {
        match self.queues.get_mut(&body).and_then(VecDeque::pop_front) {
            Some(frame) => {
                let mut held = frame;
                held.set_jump_pressed(false);
                held.set_jump_released(false);
                self.held.insert(body, held);
                frame
            }
            None => self.held.get(&body).copied().unwrap_or_default(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_frame_flags() {
        let mut frame = InputFrame::new();
        assert!(frame.is_idle());
        assert!(!frame.jump_pressed());

        frame.set_jump_pressed(true);
        assert!(frame.jump_pressed());
        assert!(!frame.jump_released());

        frame.set_sprint(true);
        assert!(frame.sprinting());

        frame.set_jump_pressed(false);
        assert!(!frame.jump_pressed());
        assert!(frame.sprinting());
        assert!(!frame.is_idle());
    }

    #[test]
    fn test_axis_range() {
        assert_eq!(InputFrame::with_movement(127).axis(), 1.0);
        assert_eq!(InputFrame::with_movement(-127).axis(), -1.0);
        assert_eq!(InputFrame::with_movement(-128).axis(), -1.0);
        assert_eq!(InputFrame::with_movement(0).axis(), 0.0);
    }

    #[test]
    fn test_scripted_input_holds_last_axis() {
        let body = BodyId(1);
        let mut script = ScriptedInput::new();
        script.push(body, [InputFrame::with_movement(127).jump()]);

        let first = script.poll(body);
        assert!(first.jump_pressed());
        assert_eq!(script.remaining(body), 0);

        let held = script.poll(body);
        assert_eq!(held.move_x, 127);
        assert!(!held.jump_pressed());

        assert!(script.poll(BodyId(2)).is_idle());
    }

    #[test]
    fn test_idle_input() {
        assert!(IdleInput.poll(BodyId(3)).is_idle());
    }
}
