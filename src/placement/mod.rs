//! Gizmo placement: kinds, footprints, the occupancy/glue graph and
//! server-side request handling.

pub mod kind;
pub mod footprint;
pub mod graph;
pub mod handler;

pub use kind::{GizmoBehavior, GizmoCatalog, GizmoKind, GlueParenting, GlueSpec, RotationStrategy};
pub use graph::{
    AppliedEdges, CellOccupancy, InvariantViolation, ObjectId, PlacementGraph, PlacementRecord, Rejection, Validated,
};
pub use handler::{PlacementError, PlacementHandler};
