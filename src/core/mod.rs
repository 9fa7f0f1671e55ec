//! Core primitives.
//!
//! Vectors, grid coordinates and state hashing shared by the simulation,
//! placement and network layers.

pub mod vec2;
pub mod grid;
pub mod hash;

// Re-export core types
pub use vec2::{Vec2, Rect};
pub use grid::{GridPos, BuildingArea};
pub use hash::{StateHash, StateHasher};
