//! Placement Graph
//!
//! Grid occupancy index plus the glue adjacency forest.
//!
//! A cell holds at most one non-glue object and at most one glue. Edges point
//! child → parent and come in two flavors:
//!
//! ```text
//! glue   --on-->  object below it      (recorded when the glue is applied)
//! object --on-->  glue below it        (try_attach, first glue wins)
//! ```
//!
//! `validate` is a pure function of graph state and request, so the server
//! and every client reach the same verdict. `apply` replays an accepted
//! record; inconsistent replays are detected before any mutation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::debug;

use crate::core::grid::{BuildingArea, GridPos};
use crate::core::hash::{StateHash, StateHasher};
use crate::placement::footprint::{absolute_cells, footprint_for, is_quarter_turn, rotate_offset};
use crate::placement::kind::{GizmoCatalog, GizmoKind};

/// Identifier of a placed object, assigned by the server.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Why a placement request was refused. A value, never a panic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Kind name not in the catalog
    #[error("unknown gizmo kind `{0}`")]
    UnknownKind(String),

    /// Sender has no selection or selected another kind
    #[error("gizmo `{0}` is not the sender's selection")]
    NotSelected(String),

    /// Rotation not a multiple of 90°
    #[error("rotation {0}° is not a multiple of 90")]
    RotationNotQuarter(i32),

    /// Anchor outside the building area
    #[error("anchor {0} is outside the building area")]
    OutOfBounds(GridPos),

    /// A glue already sits on the anchor
    #[error("a glue already sits at {0}")]
    AnchorAlreadyGlued(GridPos),

    /// Glue has nothing to stick to
    #[error("nothing below the glue at {0}")]
    NothingBelow(GridPos),

    /// Glue bottom and top inside the same object
    #[error("glue would sit inside {0}")]
    InsideSingleObject(ObjectId),

    /// Glue would join two static map cells
    #[error("glue would only connect static map cells")]
    BridgesStaticMap,

    /// Footprint cell held by an object or the map
    #[error("cell {0} is occupied")]
    CellOccupied(GridPos),
}

/// Replay inconsistent with local state. The session must abort.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Object id already used
    #[error("object id {0} applied twice")]
    DuplicateObjectId(ObjectId),

    /// Record names a kind this participant does not know
    #[error("record {object_id} has unknown kind `{kind}`")]
    UnknownKind {
        /// Record id
        object_id: ObjectId,
        /// Kind name
        kind: String,
    },

    /// Glue on an already glued anchor
    #[error("glue {object_id} on already glued anchor {position}")]
    AnchorAlreadyGlued {
        /// Record id
        object_id: ObjectId,
        /// Anchor cell
        position: GridPos,
    },

    /// Footprint cell held by another object
    #[error("{object_id} overlaps {holder} at {cell}")]
    CellTaken {
        /// Record id
        object_id: ObjectId,
        /// Contested cell
        cell: GridPos,
        /// Current holder
        holder: ObjectId,
    },
}

// =============================================================================
// RECORDS
// =============================================================================

/// An accepted placement, immutable and mirrored verbatim to all clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRecord {
    /// Assigned id
    pub object_id: ObjectId,
    /// Anchor cell
    pub position: GridPos,
    /// Rotation in degrees (multiple of 90)
    pub rotation_deg: i32,
    /// Kind name
    pub kind: String,
    /// Rotated footprint, relative to the anchor
    pub footprint: Vec<GridPos>,
    /// Whether the kind is a glue
    pub has_glue_module: bool,
}

impl PlacementRecord {
    /// Absolute cells covered.
    pub fn cells(&self) -> impl Iterator<Item = GridPos> + '_ {
        absolute_cells(self.position, &self.footprint)
    }
}

/// A request that passed validation, waiting for an object id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validated {
    /// Anchor cell
    pub position: GridPos,
    /// Rotation in degrees
    pub rotation_deg: i32,
    /// Kind name
    pub kind: String,
    /// Rotated footprint
    pub footprint: Vec<GridPos>,
    /// Whether the kind is a glue
    pub has_glue_module: bool,
}

impl Validated {
    /// Freeze into a record.
    pub fn into_record(self, object_id: ObjectId) -> PlacementRecord {
        PlacementRecord {
            object_id,
            position: self.position,
            rotation_deg: self.rotation_deg,
            kind: self.kind,
            footprint: self.footprint,
            has_glue_module: self.has_glue_module,
        }
    }
}

/// What one cell holds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellOccupancy {
    /// Non-glue object covering the cell
    pub object: Option<ObjectId>,
    /// Glue anchored on the cell
    pub glue: Option<ObjectId>,
}

/// Edges created by one `apply`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppliedEdges {
    /// `(child, parent)` pairs in creation order
    pub edges: Vec<(ObjectId, ObjectId)>,
}

// =============================================================================
// GRAPH
// =============================================================================

/// Occupancy index and glue forest for one participant.
#[derive(Clone, Debug)]
pub struct PlacementGraph {
    catalog: GizmoCatalog,
    building_area: BuildingArea,
    preoccupied: BTreeSet<GridPos>,
    cells: BTreeMap<GridPos, CellOccupancy>,
    records: BTreeMap<ObjectId, PlacementRecord>,
    parent_of: BTreeMap<ObjectId, ObjectId>,
    glue_children: BTreeSet<ObjectId>,
}

impl PlacementGraph {
    /// Empty graph over a building area and static map cells.
    pub fn new(
        catalog: GizmoCatalog,
        building_area: BuildingArea,
        preoccupied: impl IntoIterator<Item = GridPos>,
    ) -> Self {
        Self {
            catalog,
            building_area,
            preoccupied: preoccupied.into_iter().collect(),
            cells: BTreeMap::new(),
            records: BTreeMap::new(),
            parent_of: BTreeMap::new(),
            glue_children: BTreeSet::new(),
        }
    }

    /// Kind catalog.
    pub fn catalog(&self) -> &GizmoCatalog {
        &self.catalog
    }

    /// Building area.
    pub fn building_area(&self) -> BuildingArea {
        self.building_area
    }

    /// Whether static map geometry holds the cell.
    pub fn is_preoccupied(&self, cell: GridPos) -> bool {
        self.preoccupied.contains(&cell)
    }

    /// Non-glue object covering a cell.
    pub fn occupant(&self, cell: GridPos) -> Option<ObjectId> {
        self.cells.get(&cell).and_then(|c| c.object)
    }

    /// Glue anchored on a cell.
    pub fn glue_at(&self, cell: GridPos) -> Option<ObjectId> {
        self.cells.get(&cell).and_then(|c| c.glue)
    }

    /// Full occupancy of a cell.
    pub fn cell(&self, cell: GridPos) -> CellOccupancy {
        self.cells.get(&cell).copied().unwrap_or_default()
    }

    /// Record of a placed object.
    pub fn record(&self, id: ObjectId) -> Option<&PlacementRecord> {
        self.records.get(&id)
    }

    /// All records in id order.
    pub fn records(&self) -> impl Iterator<Item = &PlacementRecord> {
        self.records.values()
    }

    /// Number of placed objects (glues included).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if nothing was placed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Next unused object id.
    pub fn next_object_id(&self) -> ObjectId {
        self.records
            .keys()
            .next_back()
            .map_or(ObjectId(1), |id| ObjectId(id.0 + 1))
    }

    fn kind_of(&self, id: ObjectId) -> Option<&GizmoKind> {
        self.records.get(&id).and_then(|r| self.catalog.get(&r.kind))
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Decide whether a placement may be accepted. Never mutates.
    pub fn validate(&self, position: GridPos, rotation_deg: i32, kind_name: &str) -> Result<Validated, Rejection> {
        let kind = self
            .catalog
            .get(kind_name)
            .ok_or_else(|| Rejection::UnknownKind(kind_name.to_string()))?;

        if !is_quarter_turn(rotation_deg) {
            return Err(Rejection::RotationNotQuarter(rotation_deg));
        }

        if !self.building_area.contains(position) {
            return Err(Rejection::OutOfBounds(position));
        }

        let footprint = footprint_for(kind, rotation_deg);

        match kind.glue {
            Some(glue) => {
                if self.glue_at(position).is_some() {
                    return Err(Rejection::AnchorAlreadyGlued(position));
                }

                let bottom = position + rotate_offset(glue.bottom, rotation_deg);
                let top = position + rotate_offset(glue.top, rotation_deg);
                let below = self.occupant(bottom);
                let above = self.occupant(top);

                if below.is_none() && !self.is_preoccupied(bottom) {
                    return Err(Rejection::NothingBelow(bottom));
                }

                match (below, above) {
                    (Some(b), Some(a)) if a == b => return Err(Rejection::InsideSingleObject(b)),
                    (None, None) if self.is_preoccupied(bottom) && self.is_preoccupied(top) => {
                        return Err(Rejection::BridgesStaticMap);
                    }
                    _ => {}
                }
            }
            None => {
                for cell in absolute_cells(position, &footprint) {
                    if self.occupant(cell).is_some() || self.is_preoccupied(cell) {
                        return Err(Rejection::CellOccupied(cell));
                    }
                }
            }
        }

        Ok(Validated {
            position,
            rotation_deg,
            kind: kind.name.clone(),
            footprint,
            has_glue_module: kind.is_glue(),
        })
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Apply an accepted record. All consistency checks run before mutation.
    pub fn apply(&mut self, record: &PlacementRecord) -> Result<AppliedEdges, InvariantViolation> {
        let id = record.object_id;
        if self.records.contains_key(&id) {
            return Err(InvariantViolation::DuplicateObjectId(id));
        }
        let kind = self
            .catalog
            .get(&record.kind)
            .ok_or_else(|| InvariantViolation::UnknownKind { object_id: id, kind: record.kind.clone() })?;
        let glue = kind.glue;

        if glue.is_some() {
            if self.glue_at(record.position).is_some() {
                return Err(InvariantViolation::AnchorAlreadyGlued { object_id: id, position: record.position });
            }
        } else {
            for cell in record.cells() {
                if let Some(holder) = self.occupant(cell) {
                    return Err(InvariantViolation::CellTaken { object_id: id, cell, holder });
                }
            }
        }

        self.records.insert(id, record.clone());
        let mut applied = AppliedEdges::default();

        match glue {
            Some(glue) => {
                self.cells.entry(record.position).or_default().glue = Some(id);

                let bottom = record.position + rotate_offset(glue.bottom, record.rotation_deg);
                let top = record.position + rotate_offset(glue.top, record.rotation_deg);

                if let Some(below) = self.occupant(bottom) {
                    self.parent_of.insert(id, below);
                    applied.edges.push((id, below));
                }
                if let Some(above) = self.occupant(top) {
                    if self.try_attach(above, id) {
                        applied.edges.push((above, id));
                    }
                }
            }
            None => {
                let cells: Vec<GridPos> = record.cells().collect();
                for cell in &cells {
                    self.cells.entry(*cell).or_default().object = Some(id);
                }

                let candidates: Vec<ObjectId> = self
                    .glue_anchors()
                    .filter_map(|(anchor, glue_id)| {
                        let spec = self.kind_of(glue_id)?.glue?;
                        let rotation = self.records.get(&glue_id)?.rotation_deg;
                        let top = anchor + rotate_offset(spec.top, rotation);
                        cells.contains(&top).then_some(glue_id)
                    })
                    .collect();

                for glue_id in candidates {
                    if self.try_attach(id, glue_id) {
                        applied.edges.push((id, glue_id));
                        break;
                    }
                }
            }
        }

        debug!("Applied {} `{}` at {} with {} edge(s)", id, record.kind, record.position, applied.edges.len());
        Ok(applied)
    }

    fn glue_anchors(&self) -> impl Iterator<Item = (GridPos, ObjectId)> + '_ {
        self.cells
            .iter()
            .filter_map(|(pos, c)| c.glue.map(|g| (*pos, g)))
    }

    /// Make `child` a glue child of `glue`. Returns false without mutation
    /// if the kind refuses, the child is already glued, or the edge would
    /// close a cycle.
    pub fn try_attach(&mut self, child: ObjectId, glue: ObjectId) -> bool {
        let accepts = self
            .kind_of(child)
            .is_some_and(|k| k.glue_parenting.accepts_glue_parent());
        if !accepts || self.glue_children.contains(&child) {
            return false;
        }
        if child == glue || self.ancestors(glue).contains(&child) {
            return false;
        }

        self.parent_of.insert(child, glue);
        self.glue_children.insert(child);
        true
    }

    // -------------------------------------------------------------------------
    // Forest queries
    // -------------------------------------------------------------------------

    /// Direct parent.
    pub fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.parent_of.get(&id).copied()
    }

    /// Whether the object is a glue child.
    pub fn is_glue_child(&self, id: ObjectId) -> bool {
        self.glue_children.contains(&id)
    }

    /// Parents from nearest to root.
    pub fn ancestors(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if out.contains(&parent) || parent == id {
                break;
            }
            out.push(parent);
            current = parent;
        }
        out
    }

    /// Root of the tree containing `id` (itself if unparented).
    pub fn glue_root(&self, id: ObjectId) -> ObjectId {
        self.ancestors(id).last().copied().unwrap_or(id)
    }

    /// Direct children in id order.
    pub fn children(&self, id: ObjectId) -> Vec<ObjectId> {
        self.parent_of
            .iter()
            .filter(|(_, parent)| **parent == id)
            .map(|(child, _)| *child)
            .collect()
    }

    /// All `(child, parent)` edges in child order.
    pub fn edges(&self) -> impl Iterator<Item = (ObjectId, ObjectId)> + '_ {
        self.parent_of.iter().map(|(c, p)| (*c, *p))
    }

    /// Digest of records and edges, equal on every participant that applied
    /// the same records.
    pub fn state_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_placement_graph();

        hasher.update_u32(self.records.len() as u32);
        for record in self.records.values() {
            hasher.update_u32(record.object_id.0);
            hasher.update_grid(record.position);
            hasher.update_i32(record.rotation_deg);
            hasher.update_str(&record.kind);
            hasher.update_bool(record.has_glue_module);
            hasher.update_u32(record.footprint.len() as u32);
            for cell in &record.footprint {
                hasher.update_grid(*cell);
            }
        }

        hasher.update_u32(self.parent_of.len() as u32);
        for (child, parent) in &self.parent_of {
            hasher.update_u32(child.0);
            hasher.update_u32(parent.0);
        }

        hasher.finalize()
    }
}

// =============================================================================
// TESTS
// =============================================================================
