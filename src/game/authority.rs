//! Authority Handoff
//!
//! Per body, a one-writer token saying whether the owning client or the
//! server simulates it. Only the server mutates the token; every participant
//! applies the broadcast flag and flips the body's integration mode.
//!
//! ```text
//! Unowned --grant--> Client --revoke--> Server --grant--> Client ...
//! ```
//!
//! | participant   | authority granted | authority revoked / unowned |
//! |---------------|-------------------|-----------------------------|
//! | server        | kinematic mirror  | dynamic                     |
//! | owning client | dynamic           | kinematic mirror            |
//! | other clients | kinematic mirror  | kinematic mirror            |

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::body::{BodyId, ClientId};
use crate::sim::physics::IntegrationMode;

/// Which participant this context belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// The authoritative server
    Server,
    /// A client with its id
    Client(ClientId),
}

impl Role {
    /// Check if this is the server.
    pub fn is_server(&self) -> bool {
        matches!(self, Role::Server)
    }

    /// Client id, if a client.
    pub fn client_id(&self) -> Option<ClientId> {
        match self {
            Role::Server => None,
            Role::Client(id) => Some(*id),
        }
    }
}

/// Authority lifecycle of one body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorityState {
    /// Spawned, never granted. The server simulates.
    Unowned,
    /// Owning client simulates.
    Client,
    /// Authority revoked. The server simulates.
    Server,
}

/// Errors raised by authority operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorityError {
    /// Only the server may grant or revoke.
    #[error("authority can only be changed on the server")]
    NotServer,

    /// Body was never registered here.
    #[error("unknown body {0}")]
    UnknownBody(BodyId),
}

/// Flag change to broadcast to every participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityChange {
    /// Body whose flag changed
    pub body_id: BodyId,
    /// New flag
    pub has_authority: bool,
}

#[derive(Debug, Clone, Copy)]
struct AuthorityEntry {
    owner: ClientId,
    state: AuthorityState,
}

/// Authority flags for every body known to one participant.
#[derive(Debug, Clone)]
pub struct AuthorityChannel {
    role: Role,
    entries: BTreeMap<BodyId, AuthorityEntry>,
}

impl AuthorityChannel {
    /// Empty channel for a participant.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            entries: BTreeMap::new(),
        }
    }

    /// This participant's role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Register a freshly spawned body as `Unowned`.
    pub fn register(&mut self, body: BodyId, owner: ClientId) {
        self.entries.insert(body, AuthorityEntry { owner, state: AuthorityState::Unowned });
    }

    /// Hand the body to its owning client. Server only.
    pub fn grant(&mut self, body: BodyId) -> Result<AuthorityChange, AuthorityError> {
        self.set_server_sided(body, true)
    }

    /// Take the body back. Server only.
    pub fn revoke(&mut self, body: BodyId) -> Result<AuthorityChange, AuthorityError> {
        self.set_server_sided(body, false)
    }

    fn set_server_sided(&mut self, body: BodyId, has_authority: bool) -> Result<AuthorityChange, AuthorityError> {
        if !self.role.is_server() {
            return Err(AuthorityError::NotServer);
        }
        self.apply(AuthorityChange { body_id: body, has_authority })?;
        Ok(AuthorityChange { body_id: body, has_authority })
    }

    /// Apply a broadcast flag.
    pub fn apply(&mut self, change: AuthorityChange) -> Result<(), AuthorityError> {
        let entry = self
            .entries
            .get_mut(&change.body_id)
            .ok_or(AuthorityError::UnknownBody(change.body_id))?;
        entry.state = if change.has_authority {
            AuthorityState::Client
        } else {
            AuthorityState::Server
        };
        Ok(())
    }

    /// Lifecycle state of a body.
    pub fn state(&self, body: BodyId) -> Option<AuthorityState> {
        self.entries.get(&body).map(|e| e.state)
    }

    /// Owning client of a body.
    pub fn owner(&self, body: BodyId) -> Option<ClientId> {
        self.entries.get(&body).map(|e| e.owner)
    }

    /// Whether the owning client holds authority.
    pub fn has_authority(&self, body: BodyId) -> bool {
        self.state(body) == Some(AuthorityState::Client)
    }

    /// Whether this participant owns the body.
    pub fn is_local_owner(&self, body: BodyId) -> bool {
        match (self.role, self.owner(body)) {
            (Role::Client(me), Some(owner)) => me == owner,
            _ => false,
        }
    }

    /// Whether this participant simulates the body right now.
    pub fn simulates(&self, body: BodyId) -> bool {
        let Some(state) = self.state(body) else { return false };
        match self.role {
            Role::Server => state != AuthorityState::Client,
            Role::Client(_) => state == AuthorityState::Client && self.is_local_owner(body),
        }
    }

    /// Integration mode this participant should use for the body.
    pub fn integration_mode(&self, body: BodyId) -> IntegrationMode {
        if self.simulates(body) {
            IntegrationMode::Dynamic
        } else {
            IntegrationMode::KinematicMirror
        }
    }

    /// All registered bodies in id order.
    pub fn bodies(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.entries.keys().copied()
    }

    /// Body owned by a client, if any.
    pub fn body_of(&self, client: ClientId) -> Option<BodyId> {
        self.entries
            .iter()
            .find(|(_, e)| e.owner == client)
            .map(|(id, _)| *id)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: BodyId = BodyId(1);
    const OWNER: ClientId = ClientId(10);
    const OTHER: ClientId = ClientId(11);

    fn channels() -> (AuthorityChannel, AuthorityChannel, AuthorityChannel) {
        let mut server = AuthorityChannel::new(Role::Server);
        let mut owner = AuthorityChannel::new(Role::Client(OWNER));
        let mut other = AuthorityChannel::new(Role::Client(OTHER));
        for c in [&mut server, &mut owner, &mut other] {
            c.register(BODY, OWNER);
        }
        (server, owner, other)
    }

    fn simulators(s: &AuthorityChannel, o: &AuthorityChannel, x: &AuthorityChannel) -> usize {
        [s, o, x].iter().filter(|c| c.simulates(BODY)).count()
    }

    #[test]
    fn test_unowned_is_server_simulated() {
        let (server, owner, other) = channels();
        assert_eq!(server.state(BODY), Some(AuthorityState::Unowned));
        assert!(server.simulates(BODY));
        assert!(!owner.simulates(BODY));
        assert_eq!(simulators(&server, &owner, &other), 1);
    }

    #[test]
    fn test_grant_and_revoke_flip_modes() {
        let (mut server, mut owner, mut other) = channels();

        let change = server.grant(BODY).unwrap();
        assert!(change.has_authority);
        owner.apply(change).unwrap();
        other.apply(change).unwrap();

        assert_eq!(server.integration_mode(BODY), IntegrationMode::KinematicMirror);
        assert_eq!(owner.integration_mode(BODY), IntegrationMode::Dynamic);
        assert_eq!(other.integration_mode(BODY), IntegrationMode::KinematicMirror);
        assert_eq!(simulators(&server, &owner, &other), 1);

        let change = server.revoke(BODY).unwrap();
        owner.apply(change).unwrap();
        other.apply(change).unwrap();

        assert_eq!(server.state(BODY), Some(AuthorityState::Server));
        assert_eq!(server.integration_mode(BODY), IntegrationMode::Dynamic);
        assert_eq!(owner.integration_mode(BODY), IntegrationMode::KinematicMirror);
        assert_eq!(simulators(&server, &owner, &other), 1);
    }

    #[test]
    fn test_client_cannot_grant() {
        let (_, mut owner, _) = channels();
        assert_eq!(owner.grant(BODY), Err(AuthorityError::NotServer));
        assert_eq!(owner.revoke(BODY), Err(AuthorityError::NotServer));
    }

    #[test]
    fn test_unknown_body_rejected() {
        let (mut server, mut owner, _) = channels();
        assert_eq!(server.grant(BodyId(99)), Err(AuthorityError::UnknownBody(BodyId(99))));
        let change = AuthorityChange { body_id: BodyId(99), has_authority: true };
        assert!(owner.apply(change).is_err());
    }

    #[test]
    fn test_body_of_owner() {
        let (server, owner, _) = channels();
        assert_eq!(server.body_of(OWNER), Some(BODY));
        assert_eq!(server.body_of(OTHER), None);
        assert!(owner.is_local_owner(BODY));
        assert!(!server.is_local_owner(BODY));
    }
}
