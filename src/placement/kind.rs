//! Gizmo Kinds
//!
//! Every placeable gizmo declares its capabilities up front: base footprint,
//! how rotation affects it, whether it accepts being glued, and glue offsets
//! for glue kinds. The catalog is a lookup table keyed by kind name.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use crate::core::grid::GridPos;

/// How a rotation applies to the footprint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationStrategy {
    /// Footprint rotates with the gizmo.
    Default,
    /// Footprint stays at its 0° shape; the kind rotates something else
    /// (a sliding platform turns its slide axis by half the rotation).
    Custom,
}

/// Whether the gizmo can become the child of a glue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlueParenting {
    /// Always attachable.
    Default,
    /// Decided by the kind.
    Custom {
        /// Whether glue below may carry this gizmo
        attachable: bool,
    },
}

impl GlueParenting {
    /// Whether a glue may adopt this gizmo as a child.
    pub fn accepts_glue_parent(self) -> bool {
        match self {
            GlueParenting::Default => true,
            GlueParenting::Custom { attachable } => attachable,
        }
    }
}

/// Offsets of a glue, relative to its anchor at 0°.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlueSpec {
    /// Cell the glue sticks to
    pub bottom: GridPos,
    /// Cell whose occupant sticks to the glue
    pub top: GridPos,
}

impl Default for GlueSpec {
    fn default() -> Self {
        Self {
            bottom: GridPos::new(0, -1),
            top: GridPos::ZERO,
        }
    }
}

/// What a placed gizmo does during a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GizmoBehavior {
    /// Static solid blocks
    Solid,
    /// Glue module, no collider
    Glue,
    /// Moving platform
    SlidingPlatform,
    /// Kills on contact; detected by the owning client
    Hazard,
}

/// Catalog entry for one kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GizmoKind {
    /// Unique name (wire identifier)
    pub name: String,
    /// Cells occupied at 0°, relative to the anchor
    pub footprint: Vec<GridPos>,
    /// Rotation capability
    pub rotation: RotationStrategy,
    /// Glue-child capability
    pub glue_parenting: GlueParenting,
    /// Glue offsets, `Some` for glue kinds only
    pub glue: Option<GlueSpec>,
    /// Round behavior
    pub behavior: GizmoBehavior,
}

impl GizmoKind {
    /// Plain rotatable solid.
    pub fn solid(name: &str, footprint: &[(i32, i32)]) -> Self {
        Self {
            name: name.to_string(),
            footprint: footprint.iter().map(|&c| c.into()).collect(),
            rotation: RotationStrategy::Default,
            glue_parenting: GlueParenting::Default,
            glue: None,
            behavior: GizmoBehavior::Solid,
        }
    }

    /// Glue with default offsets.
    pub fn glue(name: &str) -> Self {
        Self {
            name: name.to_string(),
            footprint: vec![GridPos::ZERO],
            rotation: RotationStrategy::Default,
            glue_parenting: GlueParenting::Custom { attachable: false },
            glue: Some(GlueSpec::default()),
            behavior: GizmoBehavior::Glue,
        }
    }

    /// Check if this is a glue kind.
    pub fn is_glue(&self) -> bool {
        self.glue.is_some()
    }
}

/// Lookup table of kinds by name.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GizmoCatalog {
    kinds: BTreeMap<String, GizmoKind>,
}

impl GizmoCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The kinds shipped with the game.
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        catalog.insert(GizmoKind::solid("block", &[(0, 0)]));
        catalog.insert(GizmoKind::solid("plank", &[(0, 0), (1, 0)]));
        catalog.insert(GizmoKind::solid("long_plank", &[(-1, 0), (0, 0), (1, 0)]));
        catalog.insert(GizmoKind::solid("l_block", &[(0, 0), (0, 1), (1, 0)]));
        catalog.insert(GizmoKind::glue("glue"));
        catalog.insert(GizmoKind {
            rotation: RotationStrategy::Custom,
            behavior: GizmoBehavior::SlidingPlatform,
            ..GizmoKind::solid("sliding_platform", &[(-1, 0), (0, 0), (1, 0)])
        });
        catalog.insert(GizmoKind {
            glue_parenting: GlueParenting::Custom { attachable: false },
            behavior: GizmoBehavior::Hazard,
            ..GizmoKind::solid("spinning_saw", &[(0, 0)])
        });
        catalog.insert(GizmoKind {
            glue_parenting: GlueParenting::Custom { attachable: false },
            behavior: GizmoBehavior::Hazard,
            ..GizmoKind::solid("swinging_axe", &[(0, 0), (0, 1)])
        });
        catalog.insert(GizmoKind {
            glue_parenting: GlueParenting::Custom { attachable: true },
            behavior: GizmoBehavior::Hazard,
            ..GizmoKind::solid("crossbow", &[(0, 0)])
        });
        catalog.insert(GizmoKind {
            behavior: GizmoBehavior::Hazard,
            ..GizmoKind::solid("spinning_square", &[(0, 0)])
        });
        catalog
    }

    /// Add or replace a kind.
    pub fn insert(&mut self, kind: GizmoKind) {
        self.kinds.insert(kind.name.clone(), kind);
    }

    /// Look up a kind by name.
    pub fn get(&self, name: &str) -> Option<&GizmoKind> {
        self.kinds.get(name)
    }

    /// Kind names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// Number of kinds.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog() {
        let catalog = GizmoCatalog::standard();
        assert!(catalog.get("glue").unwrap().is_glue());
        assert!(!catalog.get("block").unwrap().is_glue());
        assert_eq!(catalog.get("plank").unwrap().footprint.len(), 2);
        assert_eq!(catalog.get("sliding_platform").unwrap().rotation, RotationStrategy::Custom);
        assert!(catalog.get("teleporter").is_none());
        assert_eq!(catalog.names().count(), catalog.len());
    }

    #[test]
    fn test_glue_parenting_capability() {
        assert!(GlueParenting::Default.accepts_glue_parent());
        assert!(!GlueParenting::Custom { attachable: false }.accepts_glue_parent());
        let catalog = GizmoCatalog::standard();
        assert!(!catalog.get("spinning_saw").unwrap().glue_parenting.accepts_glue_parent());
        assert!(catalog.get("crossbow").unwrap().glue_parenting.accepts_glue_parent());
    }

    #[test]
    fn test_default_glue_offsets() {
        let spec = GlueSpec::default();
        assert_eq!(spec.bottom, GridPos::new(0, -1));
        assert_eq!(spec.top, GridPos::ZERO);
    }
}
