//! Placement Handling
//!
//! Server-side bookkeeping around the graph: which kind each client picked
//! from the gizmo box, object id assignment, and who placed what.

use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::grid::GridPos;
use crate::game::body::ClientId;
use crate::placement::graph::{InvariantViolation, ObjectId, PlacementGraph, PlacementRecord, Rejection};

/// Outcome of a failed placement request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlacementError {
    /// Request refused; no broadcast is sent
    #[error("placement rejected: {0}")]
    Rejected(#[from] Rejection),

    /// Local graph is inconsistent
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Selection and ownership tracking.
#[derive(Clone, Debug, Default)]
pub struct PlacementHandler {
    selections: BTreeMap<ClientId, String>,
    owners: BTreeMap<ObjectId, ClientId>,
}

impl PlacementHandler {
    /// Empty handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the kind a client picked. Replaces any earlier pick.
    pub fn select_gizmo(&mut self, client: ClientId, kind: impl Into<String>) {
        let kind = kind.into();
        debug!("{} selected `{}`", client, kind);
        self.selections.insert(client, kind);
    }

    /// Current selection of a client.
    pub fn selection(&self, client: ClientId) -> Option<&str> {
        self.selections.get(&client).map(String::as_str)
    }

    /// Validate a request against the sender's selection and the graph, then
    /// commit it under the next object id.
    pub fn handle_request(
        &mut self,
        graph: &mut PlacementGraph,
        sender: ClientId,
        position: GridPos,
        rotation_deg: i32,
        kind: &str,
    ) -> Result<PlacementRecord, PlacementError> {
        if self.selection(sender) != Some(kind) {
            return Err(Rejection::NotSelected(kind.to_string()).into());
        }

        let validated = graph.validate(position, rotation_deg, kind)?;
        let record = validated.into_record(graph.next_object_id());
        graph.apply(&record)?;

        self.record_placed(record.object_id, sender);
        info!("{} placed {} `{}` at {}", sender, record.object_id, record.kind, record.position);
        Ok(record)
    }

    /// Note that `placer` placed `object`, consuming its selection. Clients
    /// call this when replaying a broadcast placement.
    pub fn record_placed(&mut self, object: ObjectId, placer: ClientId) {
        self.selections.remove(&placer);
        self.owners.insert(object, placer);
    }

    /// Client that placed an object.
    pub fn owner_of(&self, object: ObjectId) -> Option<ClientId> {
        self.owners.get(&object).copied()
    }

    /// Number of objects placed through this handler.
    pub fn placed_count(&self) -> usize {
        self.owners.len()
    }

    /// Whether no selection is waiting to be placed.
    pub fn all_placed(&self) -> bool {
        self.selections.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
