//! Protocol Messages
//!
//! Wire format between the server and clients. Messages are serialized as
//! JSON for debugging ease; flat payload structs also encode with bincode.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::core::grid::GridPos;
use crate::game::body::{BodyId, ClientId};
use crate::game::reconcile::MovementSnapshot;
use crate::game::round::ScoreBreakdown;
use crate::placement::graph::{ObjectId, PlacementRecord};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// State of the sender's own body, sent while it holds authority.
    Snapshot(MovementSnapshot),

    /// Request to place the selected gizmo.
    PlaceGizmo(PlacementRequest),

    /// The sender's body touched a hazard.
    ReportDeath {
        /// Body that died
        body_id: BodyId,
        /// Trap responsible, if the client knows it
        #[serde(default)]
        trap: Option<ObjectId>,
    },
}

/// Placement request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRequest {
    /// Anchor cell `[x, y]`.
    pub position: [i32; 2],
    /// Rotation in degrees.
    pub rotation_deg: i32,
    /// Kind name.
    pub kind: String,
}

impl PlacementRequest {
    /// Anchor as a grid position.
    pub fn grid_position(&self) -> GridPos {
        GridPos::from_array(self.position)
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Shared clock origin.
    ClockStart {
        /// Session identifier
        session_id: Uuid,
        /// Server wall-clock time when `start_clock` ran
        start_utc: DateTime<Utc>,
    },

    /// A body exists and belongs to a client.
    BodySpawned {
        /// Body
        body_id: BodyId,
        /// Owning client
        owner: ClientId,
    },

    /// Authority flag for a body.
    Authority {
        /// Body
        body_id: BodyId,
        /// Whether the owning client simulates it
        has_authority: bool,
    },

    /// Body state from the server.
    Snapshot {
        /// State
        snapshot: MovementSnapshot,
        /// Owner must ignore it (relay of its own state)
        skip_owner: bool,
    },

    /// A client picked a gizmo from the box.
    GizmoSelected {
        /// Picking client
        client_id: ClientId,
        /// Kind name
        kind: String,
    },

    /// A placement was accepted and must be replayed.
    PlacementAccepted(PlacementAccepted),

    /// Round hazards started or stopped.
    RoundHazards {
        /// Whether hazards run
        active: bool,
    },

    /// Points awarded for the round just played.
    RoundScored {
        /// Per-player breakdowns
        scores: Vec<ScoreBreakdown>,
        /// Match winner, if decided
        winner: Option<ClientId>,
    },
}

/// Accepted placement, replayed verbatim by every client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementAccepted {
    /// Anchor cell `[x, y]`.
    pub position: [i32; 2],
    /// Rotation in degrees.
    pub rotation_deg: i32,
    /// Kind name.
    pub kind: String,
    /// Server-assigned id.
    pub object_id: ObjectId,
    /// Client whose selection was placed.
    pub placed_by: ClientId,
    /// Rotated footprint as `[x, y]` offsets.
    pub footprint: Vec<[i32; 2]>,
    /// Whether the kind is a glue.
    pub has_glue_module: bool,
}

impl PlacementAccepted {
    /// Wire form of a committed record.
    pub fn new(record: &PlacementRecord, placed_by: ClientId) -> Self {
        Self {
            position: record.position.to_array(),
            rotation_deg: record.rotation_deg,
            kind: record.kind.clone(),
            object_id: record.object_id,
            placed_by,
            footprint: record.footprint.iter().map(|c| c.to_array()).collect(),
            has_glue_module: record.has_glue_module,
        }
    }

    /// Record to apply locally.
    pub fn to_record(&self) -> PlacementRecord {
        PlacementRecord {
            object_id: self.object_id,
            position: GridPos::from_array(self.position),
            rotation_deg: self.rotation_deg,
            kind: self.kind.clone(),
            footprint: self.footprint.iter().map(|c| GridPos::from_array(*c)).collect(),
            has_glue_module: self.has_glue_module,
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl MovementSnapshot {
    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

impl PlacementRequest {
    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::body::BodyState;

    fn snapshot() -> MovementSnapshot {
        MovementSnapshot {
            body_id: BodyId(3),
            state: BodyState {
                position: Vec2::new(1.5, -2.0),
                velocity: Vec2::new(4.0, 0.0),
                facing: true,
            },
        }
    }

    #[test]
    fn test_client_message_json_roundtrip() {
        let msg = ClientMessage::PlaceGizmo(PlacementRequest {
            position: [4, -1],
            rotation_deg: -90,
            kind: "plank".to_string(),
        });

        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""type":"place_gizmo""#));
        assert_eq!(ClientMessage::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_report_death_trap_optional() {
        let parsed = ClientMessage::from_json(r#"{"type":"report_death","body_id":2}"#).unwrap();
        assert_eq!(parsed, ClientMessage::ReportDeath { body_id: BodyId(2), trap: None });

        let msg = ClientMessage::ReportDeath { body_id: BodyId(2), trap: Some(ObjectId(9)) };
        assert_eq!(ClientMessage::from_json(&msg.to_json().unwrap()).unwrap(), msg);
    }

    #[test]
    fn test_server_snapshot_json_roundtrip() {
        let msg = ServerMessage::Snapshot { snapshot: snapshot(), skip_owner: true };
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""type":"snapshot""#));
        assert_eq!(ServerMessage::from_json(&json).unwrap(), msg);
    }

    #[test]
    fn test_clock_start_carries_utc() {
        let start = DateTime::parse_from_rfc3339("2026-01-02T03:04:05.250Z")
            .unwrap()
            .with_timezone(&Utc);
        let msg = ServerMessage::ClockStart { session_id: Uuid::new_v4(), start_utc: start };
        let back = ServerMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_binary_serialization_snapshot() {
        // bincode cannot decode internally tagged enums; flat payloads only
        let snap = snapshot();
        let bytes = snap.to_bytes().unwrap();
        assert_eq!(bytes.len(), 4 + 17);
        assert_eq!(MovementSnapshot::from_bytes(&bytes).unwrap(), snap);
    }

    #[test]
    fn test_binary_serialization_request() {
        let request = PlacementRequest { position: [1, 2], rotation_deg: 180, kind: "glue".to_string() };
        let back = PlacementRequest::from_bytes(&request.to_bytes().unwrap()).unwrap();
        assert_eq!(back, request);
        assert_eq!(back.grid_position(), GridPos::new(1, 2));
    }

    #[test]
    fn test_placement_accepted_record_conversion() {
        let record = PlacementRecord {
            object_id: ObjectId(7),
            position: GridPos::new(5, 5),
            rotation_deg: 90,
            kind: "plank".to_string(),
            footprint: vec![GridPos::new(0, 0), GridPos::new(0, 1)],
            has_glue_module: false,
        };
        let accepted = PlacementAccepted::new(&record, ClientId(2));
        assert_eq!(accepted.position, [5, 5]);
        assert_eq!(accepted.placed_by, ClientId(2));
        assert_eq!(accepted.to_record(), record);
    }
}
