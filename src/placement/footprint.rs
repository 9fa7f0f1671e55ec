//! Footprint Rotation
//!
//! Rotations come in multiples of 90°. Negative angles normalize with a
//! Euclidean remainder, so -90° and 270° give the same footprint.

use crate::core::grid::GridPos;
use crate::placement::kind::{GizmoKind, RotationStrategy};

/// Whether an angle is a whole number of quarter turns.
#[inline]
pub fn is_quarter_turn(rotation_deg: i32) -> bool {
    rotation_deg % 90 == 0
}

/// Quarter turns in `[0, 4)` for an angle.
#[inline]
pub fn quarter_turns(rotation_deg: i32) -> u8 {
    (rotation_deg / 90).rem_euclid(4) as u8
}

/// Rotate a cell offset by an angle (counter-clockwise).
#[inline]
pub fn rotate_offset(offset: GridPos, rotation_deg: i32) -> GridPos {
    offset.rotate_quarters(quarter_turns(rotation_deg))
}

/// Rotate every offset of a footprint.
pub fn rotate_footprint(footprint: &[GridPos], rotation_deg: i32) -> Vec<GridPos> {
    let turns = quarter_turns(rotation_deg);
    footprint.iter().map(|c| c.rotate_quarters(turns)).collect()
}

/// Footprint of a kind at an angle, honoring its rotation capability.
pub fn footprint_for(kind: &GizmoKind, rotation_deg: i32) -> Vec<GridPos> {
    match kind.rotation {
        RotationStrategy::Default => rotate_footprint(&kind.footprint, rotation_deg),
        RotationStrategy::Custom => kind.footprint.clone(),
    }
}

/// Absolute cells covered by a footprint anchored at `anchor`.
pub fn absolute_cells(anchor: GridPos, footprint: &[GridPos]) -> impl Iterator<Item = GridPos> + '_ {
    footprint.iter().map(move |c| anchor + *c)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::kind::GizmoCatalog;
    use proptest::prelude::*;

    #[test]
    fn test_plank_rotated_90() {
        let plank = [GridPos::new(0, 0), GridPos::new(1, 0)];
        let rotated = rotate_footprint(&plank, 90);
        let cells: Vec<_> = absolute_cells(GridPos::new(5, 5), &rotated).collect();
        assert_eq!(cells, vec![GridPos::new(5, 5), GridPos::new(5, 6)]);
    }

    #[test]
    fn test_negative_rotation_equals_positive() {
        let l = [GridPos::new(0, 0), GridPos::new(0, 1), GridPos::new(1, 0)];
        assert_eq!(rotate_footprint(&l, -90), rotate_footprint(&l, 270));
        assert_eq!(rotate_footprint(&l, -360), rotate_footprint(&l, 0));
    }

    #[test]
    fn test_quarter_turns() {
        assert_eq!(quarter_turns(0), 0);
        assert_eq!(quarter_turns(450), 1);
        assert_eq!(quarter_turns(-90), 3);
        assert!(is_quarter_turn(-180));
        assert!(!is_quarter_turn(45));
    }

    #[test]
    fn test_custom_rotation_keeps_footprint() {
        let catalog = GizmoCatalog::standard();
        let platform = catalog.get("sliding_platform").unwrap();
        assert_eq!(footprint_for(platform, 90), platform.footprint);
        let plank = catalog.get("plank").unwrap();
        assert_ne!(footprint_for(plank, 90), plank.footprint);
    }

    proptest! {
        #[test]
        fn test_four_quarter_turns_identity(
            cells in prop::collection::vec((-20i32..20, -20i32..20), 1..8),
            start in -8i32..8,
        ) {
            let footprint: Vec<GridPos> = cells.into_iter().map(GridPos::from).collect();
            let base = start * 90;
            let mut rotated = rotate_footprint(&footprint, base);
            for _ in 0..4 {
                rotated = rotate_footprint(&rotated, 90);
            }
            prop_assert_eq!(rotated, rotate_footprint(&footprint, base));
        }
    }
}
