//! Player Bodies
//!
//! Identifiers and the replicated movement state of a player body.

use std::fmt;
use serde::{Serialize, Deserialize};
use crate::core::vec2::Vec2;

/// Network client identifier. The server is not a client.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ClientId(pub u32);

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Client({})", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// Player body identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyId(pub u32);

impl fmt::Debug for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

/// Movement state of one body. Copied into every snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct BodyState {
    /// World position of the collider center
    pub position: Vec2,
    /// Linear velocity
    pub velocity: Vec2,
    /// true = facing right
    pub facing: bool,
}

impl BodyState {
    /// Resting body at a position, facing right.
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            facing: true,
        }
    }

    /// Facing as a sign: +1 right, -1 left.
    pub fn facing_sign(&self) -> f32 {
        if self.facing { 1.0 } else { -1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_state_at() {
        let state = BodyState::at(Vec2::new(2.0, 3.0));
        assert_eq!(state.velocity, Vec2::ZERO);
        assert!(state.facing);
        assert_eq!(state.facing_sign(), 1.0);
    }

    #[test]
    fn test_body_state_bincode_size() {
        // 4 floats + 1 bool
        let bytes = bincode::serialize(&BodyState::default()).unwrap();
        assert_eq!(bytes.len(), 17);
    }
}
