//! Integer Grid Coordinates
//!
//! Gizmos snap to a unit grid. Cells are keyed by `GridPos`, which orders
//! lexicographically (x, then y) so every BTreeMap keyed by it iterates
//! identically on every participant.

use std::fmt;
use std::ops::{Add, Sub};
use serde::{Serialize, Deserialize};

/// A grid cell coordinate.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct GridPos {
    /// Column
    pub x: i32,
    /// Row (positive is up)
    pub y: i32,
}

impl GridPos {
    /// Origin cell.
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Create a new grid position.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Rotate 90 degrees counter-clockwise about the origin: `(x, y) -> (-y, x)`.
    #[inline]
    pub const fn rotate_quarter(self) -> Self {
        Self { x: -self.y, y: self.x }
    }

    /// Rotate by `quarter_turns` counter-clockwise quarter turns.
    pub fn rotate_quarters(self, quarter_turns: u8) -> Self {
        let mut pos = self;
        for _ in 0..(quarter_turns % 4) {
            pos = pos.rotate_quarter();
        }
        pos
    }

    /// Wire representation.
    #[inline]
    pub const fn to_array(self) -> [i32; 2] {
        [self.x, self.y]
    }

    /// From wire representation.
    #[inline]
    pub const fn from_array(arr: [i32; 2]) -> Self {
        Self { x: arr[0], y: arr[1] }
    }
}

impl Add for GridPos {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for GridPos {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl From<(i32, i32)> for GridPos {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Debug for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Rectangle of cells where gizmos may be anchored. Both corners inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingArea {
    /// Bottom-left cell
    pub left_bottom: GridPos,
    /// Top-right cell
    pub right_top: GridPos,
}

impl BuildingArea {
    /// Create from corners.
    pub const fn new(left_bottom: GridPos, right_top: GridPos) -> Self {
        Self { left_bottom, right_top }
    }

    /// Check if a cell is inside (inclusive bounds).
    #[inline]
    pub fn contains(&self, pos: GridPos) -> bool {
        pos.x >= self.left_bottom.x
            && pos.x <= self.right_top.x
            && pos.y >= self.left_bottom.y
            && pos.y <= self.right_top.y
    }

    /// Clamp a cell into the area.
    pub fn clamp(&self, pos: GridPos) -> GridPos {
        GridPos::new(
            pos.x.clamp(self.left_bottom.x, self.right_top.x),
            pos.y.clamp(self.left_bottom.y, self.right_top.y),
        )
    }

    /// Whether the corners are ordered.
    pub fn is_well_formed(&self) -> bool {
        self.left_bottom.x <= self.right_top.x && self.left_bottom.y <= self.right_top.y
    }
}

impl Default for BuildingArea {
    fn default() -> Self {
        Self::new(GridPos::new(0, 0), GridPos::new(10, 10))
    }
}
