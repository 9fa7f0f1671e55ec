//! Game Events
//!
//! Notable things a session observed, drained by whoever drives it
//! (the out-of-scope phase orchestrator, the demo binary, tests).

use serde::{Serialize, Deserialize};
use crate::core::grid::GridPos;
use crate::game::body::{BodyId, ClientId};
use crate::placement::graph::ObjectId;

/// Why a player died.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    /// Left the death bounds
    OutOfBounds,
    /// Reported by the owning client (hazard contact)
    Reported {
        /// Trap that killed, if known
        trap: Option<ObjectId>,
    },
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    /// A body was spawned for a client
    BodySpawned {
        /// Body
        body_id: BodyId,
        /// Owning client
        owner: ClientId,
    },

    /// Authority flag changed
    AuthorityChanged {
        /// Body
        body_id: BodyId,
        /// New flag
        has_authority: bool,
    },

    /// Player died
    PlayerDied {
        /// Player
        client: ClientId,
        /// Cause
        cause: DeathCause,
    },

    /// Player reached the goal
    PlayerFinished {
        /// Player
        client: ClientId,
        /// 1-based arrival order
        place: u32,
    },

    /// Every player has finished or died
    RoundOver,

    /// A gizmo was placed
    GizmoPlaced {
        /// Assigned object id
        object_id: ObjectId,
        /// Kind name
        kind: String,
        /// Anchor cell
        position: GridPos,
    },

    /// Every selected gizmo has been placed
    AllGizmosPlaced,
}

impl GameEvent {
    /// Player involved, for filtering.
    pub fn client(&self) -> Option<ClientId> {
        match self {
            GameEvent::BodySpawned { owner, .. } => Some(*owner),
            GameEvent::PlayerDied { client, .. } | GameEvent::PlayerFinished { client, .. } => Some(*client),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_tag() {
        let event = GameEvent::PlayerFinished { client: ClientId(2), place: 1 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"player_finished""#));
        assert_eq!(event.client(), Some(ClientId(2)));
        assert_eq!(GameEvent::RoundOver.client(), None);
    }
}
