//! Movement State Reconciliation
//!
//! Whoever simulates a body reports its state once per logic tick:
//!
//! - the owning client (while it holds authority) sends to the server, which
//!   overwrites its mirror and relays to every client except the owner;
//! - the server, for every body it simulates, broadcasts to all clients.
//!
//! Snapshots are applied last-write-wins: the receiver snaps its mirror to
//! the snapshot, no interpolation and no extrapolation.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::debug;

use crate::config::MovementConfig;
use crate::core::vec2::Vec2;
use crate::game::authority::AuthorityChannel;
use crate::game::body::{BodyId, BodyState, ClientId};
use crate::game::input::InputSource;
use crate::game::motor::Motor;
use crate::sim::physics::PhysicsWorld;

/// State of one body at one logic tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovementSnapshot {
    /// Body the state belongs to
    pub body_id: BodyId,
    /// Position, velocity, facing
    pub state: BodyState,
}

/// Protocol violations while merging snapshots.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplicationError {
    /// Operation reserved to the server.
    #[error("only the server may do this")]
    NotServer,

    /// Operation reserved to clients.
    #[error("only a client may do this")]
    NotClient,

    /// Body was never spawned here.
    #[error("unknown body {0}")]
    UnknownBody(BodyId),

    /// Sender does not own the body.
    #[error("{sender} does not own {body}")]
    NotOwner {
        /// Body named in the snapshot
        body: BodyId,
        /// Client that sent it
        sender: ClientId,
    },

    /// Sender owns the body but does not hold authority.
    #[error("snapshot for {0} sent without authority")]
    StaleSnapshot(BodyId),
}

/// Where a snapshot produced on a logic tick must go.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SnapshotEmit {
    /// Client-simulated state, to the server.
    ToServer(MovementSnapshot),
    /// Server-simulated state, to every client.
    ToClients(MovementSnapshot),
}

/// Per-participant movement replication.
#[derive(Debug, Clone)]
pub struct Reconciler {
    stats: MovementConfig,
    motors: BTreeMap<BodyId, Motor>,
}

impl Reconciler {
    /// Create with movement stats.
    pub fn new(stats: MovementConfig) -> Self {
        Self {
            stats,
            motors: BTreeMap::new(),
        }
    }

    /// Movement stats in use.
    pub fn stats(&self) -> &MovementConfig {
        &self.stats
    }

    /// Create a motor for a spawned body.
    pub fn spawn(&mut self, body: BodyId) {
        self.motors.insert(body, Motor::new());
    }

    /// Motor of a body.
    pub fn motor(&self, body: BodyId) -> Option<&Motor> {
        self.motors.get(&body)
    }

    /// Logic tick: latch local input for bodies this side controls and
    /// collect the snapshots to send.
    pub fn logic_tick(
        &mut self,
        authority: &AuthorityChannel,
        physics: &mut dyn PhysicsWorld,
        input: &mut dyn InputSource,
        now: f64,
    ) -> Vec<SnapshotEmit> {
        let mut out = Vec::new();
        let server = authority.role().is_server();

        for (&body, motor) in self.motors.iter_mut() {
            if !authority.simulates(body) {
                continue;
            }
            let Some(mut state) = physics.body_state(body) else { continue };

            if server {
                out.push(SnapshotEmit::ToClients(MovementSnapshot { body_id: body, state }));
            } else {
                let frame = input.poll(body);
                motor.latch(frame, now, &mut state, &self.stats);
                physics.set_body_state(body, state);
                out.push(SnapshotEmit::ToServer(MovementSnapshot { body_id: body, state }));
            }
        }

        out
    }

    /// `BeforePhysicsTickPlayer`: movement rules for every body simulated here.
    pub fn before_physics_player(
        &mut self,
        authority: &AuthorityChannel,
        physics: &mut dyn PhysicsWorld,
        now: f64,
    ) {
        for (&body, motor) in self.motors.iter_mut() {
            if !authority.simulates(body) {
                continue;
            }
            let Some(mut state) = physics.body_state(body) else { continue };

            if authority.has_authority(body) {
                let contacts = physics.contacts(body);
                motor.step(now, contacts, &mut state, &self.stats);
            } else {
                motor.step_passive(&mut state);
            }
            physics.set_body_state(body, state);
        }
    }

    /// `AfterPhysicsTick`: clear every body's external force buffer.
    pub fn after_physics(&mut self) {
        for motor in self.motors.values_mut() {
            motor.reset_external_force();
        }
    }

    /// Add a force to a body for the current physics tick.
    pub fn add_external_force(&mut self, body: BodyId, force: Vec2) -> Result<(), ReplicationError> {
        let motor = self.motors.get_mut(&body).ok_or(ReplicationError::UnknownBody(body))?;
        motor.add_external_force(force);
        Ok(())
    }

    /// Freeze or release a body.
    pub fn set_immobile(
        &mut self,
        body: BodyId,
        immobile: bool,
        physics: &mut dyn PhysicsWorld,
    ) -> Result<(), ReplicationError> {
        let motor = self.motors.get_mut(&body).ok_or(ReplicationError::UnknownBody(body))?;
        let mut state = physics.body_state(body).ok_or(ReplicationError::UnknownBody(body))?;
        motor.set_immobile(immobile, &mut state);
        physics.set_body_state(body, state);
        Ok(())
    }

    /// Server: merge a snapshot from a client. Returns the snapshot to relay
    /// to all clients except the owner.
    pub fn merge_client_snapshot(
        &self,
        authority: &AuthorityChannel,
        sender: ClientId,
        snapshot: MovementSnapshot,
        physics: &mut dyn PhysicsWorld,
    ) -> Result<MovementSnapshot, ReplicationError> {
        if !authority.role().is_server() {
            return Err(ReplicationError::NotServer);
        }
        let body = snapshot.body_id;
        let owner = authority.owner(body).ok_or(ReplicationError::UnknownBody(body))?;
        if owner != sender {
            return Err(ReplicationError::NotOwner { body, sender });
        }
        if !authority.has_authority(body) {
            return Err(ReplicationError::StaleSnapshot(body));
        }

        physics.set_body_state(body, snapshot.state);
        Ok(snapshot)
    }

    /// Client: merge a snapshot relayed or originated by the server.
    /// Returns whether it was applied.
    pub fn merge_server_snapshot(
        &self,
        authority: &AuthorityChannel,
        snapshot: MovementSnapshot,
        skip_owner: bool,
        physics: &mut dyn PhysicsWorld,
    ) -> Result<bool, ReplicationError> {
        if authority.role().is_server() {
            return Err(ReplicationError::NotClient);
        }
        let body = snapshot.body_id;
        if authority.owner(body).is_none() {
            return Err(ReplicationError::UnknownBody(body));
        }
        if skip_owner && authority.is_local_owner(body) {
            debug!("Skipping own relayed snapshot for {}", body);
            return Ok(false);
        }

        physics.set_body_state(body, snapshot.state);
        Ok(true)
    }

    /// Server: overwrite a body's state (spawn, teleport). The snapshot goes
    /// to every client, owner included.
    pub fn set_state_server_sided(
        &self,
        authority: &AuthorityChannel,
        body: BodyId,
        state: BodyState,
        physics: &mut dyn PhysicsWorld,
    ) -> Result<MovementSnapshot, ReplicationError> {
        if !authority.role().is_server() {
            return Err(ReplicationError::NotServer);
        }
        if !physics.set_body_state(body, state) {
            return Err(ReplicationError::UnknownBody(body));
        }
        Ok(MovementSnapshot { body_id: body, state })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::authority::Role;
    use crate::game::input::{InputFrame, ScriptedInput, IdleInput};
    use crate::sim::physics::{FlatWorld, IntegrationMode};
    use crate::core::vec2::Rect;

    const BODY: BodyId = BodyId(1);
    const OWNER: ClientId = ClientId(1);
    const OTHER: ClientId = ClientId(2);

    fn world() -> FlatWorld {
        let mut w = FlatWorld::new(-20.0, Vec2::new(0.4, 0.5));
        w.add_static_box(Rect::new(Vec2::new(-10.0, -1.0), Vec2::new(10.0, 0.0)));
        w.spawn_body(BODY, BodyState::at(Vec2::new(0.0, 0.5)), IntegrationMode::Dynamic);
        w
    }

    fn participant(role: Role) -> (AuthorityChannel, Reconciler, FlatWorld) {
        let mut auth = AuthorityChannel::new(role);
        auth.register(BODY, OWNER);
        let mut rec = Reconciler::new(MovementConfig::default());
        rec.spawn(BODY);
        (auth, rec, world())
    }

    #[test]
    fn test_server_emits_for_unowned_body() {
        let (auth, mut rec, mut world) = participant(Role::Server);
        let out = rec.logic_tick(&auth, &mut world, &mut IdleInput, 0.0);
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], SnapshotEmit::ToClients(s) if s.body_id == BODY));
    }

    #[test]
    fn test_owner_emits_only_with_authority() {
        let (mut auth, mut rec, mut world) = participant(Role::Client(OWNER));
        let mut input = ScriptedInput::new();
        assert!(rec.logic_tick(&auth, &mut world, &mut input, 0.0).is_empty());

        auth.apply(crate::game::authority::AuthorityChange { body_id: BODY, has_authority: true }).unwrap();
        let out = rec.logic_tick(&auth, &mut world, &mut input, 0.0);
        assert!(matches!(out[0], SnapshotEmit::ToServer(_)));
    }

    #[test]
    fn test_owner_input_moves_body() {
        let (mut auth, mut rec, mut world) = participant(Role::Client(OWNER));
        auth.apply(crate::game::authority::AuthorityChange { body_id: BODY, has_authority: true }).unwrap();

        let mut input = ScriptedInput::new();
        input.push(BODY, [InputFrame::with_movement(127)]);
        rec.logic_tick(&auth, &mut world, &mut input, 0.0);
        rec.before_physics_player(&auth, &mut world, 0.0);
        world.step(0.02);

        let state = world.body_state(BODY).unwrap();
        assert_eq!(state.velocity.x, 4.0);
        assert!(state.position.x > 0.0);
    }

    #[test]
    fn test_external_force_resets_after_physics() {
        let (mut auth, mut rec, mut world) = participant(Role::Client(OWNER));
        auth.apply(crate::game::authority::AuthorityChange { body_id: BODY, has_authority: true }).unwrap();

        rec.add_external_force(BODY, Vec2::new(2.0, 0.0)).unwrap();
        rec.before_physics_player(&auth, &mut world, 0.0);
        assert_eq!(world.body_state(BODY).unwrap().velocity.x, 2.0);
        rec.after_physics();

        rec.before_physics_player(&auth, &mut world, 0.02);
        assert_eq!(world.body_state(BODY).unwrap().velocity.x, 0.0);
    }

    #[test]
    fn test_server_merge_rules() {
        let (mut auth, rec, mut world) = participant(Role::Server);
        let snap = MovementSnapshot {
            body_id: BODY,
            state: BodyState::at(Vec2::new(3.0, 0.5)),
        };

        assert_eq!(
            rec.merge_client_snapshot(&auth, OWNER, snap, &mut world),
            Err(ReplicationError::StaleSnapshot(BODY))
        );

        auth.grant(BODY).unwrap();
        assert_eq!(
            rec.merge_client_snapshot(&auth, OTHER, snap, &mut world),
            Err(ReplicationError::NotOwner { body: BODY, sender: OTHER })
        );

        let unknown = MovementSnapshot { body_id: BodyId(9), ..snap };
        assert_eq!(
            rec.merge_client_snapshot(&auth, OWNER, unknown, &mut world),
            Err(ReplicationError::UnknownBody(BodyId(9)))
        );

        assert_eq!(rec.merge_client_snapshot(&auth, OWNER, snap, &mut world), Ok(snap));
        assert_eq!(world.body_state(BODY).unwrap().position.x, 3.0);
    }

    #[test]
    fn test_client_skips_own_relay() {
        let (owner_auth, rec, mut owner_world) = participant(Role::Client(OWNER));
        let (other_auth, _, mut other_world) = participant(Role::Client(OTHER));
        let snap = MovementSnapshot {
            body_id: BODY,
            state: BodyState::at(Vec2::new(5.0, 0.5)),
        };

        assert_eq!(rec.merge_server_snapshot(&owner_auth, snap, true, &mut owner_world), Ok(false));
        assert_eq!(owner_world.body_state(BODY).unwrap().position.x, 0.0);

        assert_eq!(rec.merge_server_snapshot(&other_auth, snap, true, &mut other_world), Ok(true));
        assert_eq!(other_world.body_state(BODY).unwrap().position.x, 5.0);

        // Server-sided overwrite reaches the owner too
        assert_eq!(rec.merge_server_snapshot(&owner_auth, snap, false, &mut owner_world), Ok(true));
        assert_eq!(owner_world.body_state(BODY).unwrap().position.x, 5.0);
    }

    #[test]
    fn test_set_state_server_sided_requires_server() {
        let (client_auth, rec, mut world) = participant(Role::Client(OWNER));
        let state = BodyState::at(Vec2::new(1.0, 1.0));
        assert_eq!(
            rec.set_state_server_sided(&client_auth, BODY, state, &mut world),
            Err(ReplicationError::NotServer)
        );

        let (server_auth, rec, mut world) = participant(Role::Server);
        let snap = rec.set_state_server_sided(&server_auth, BODY, state, &mut world).unwrap();
        assert_eq!(snap.state, state);
        assert_eq!(world.body_state(BODY), Some(state));
    }
}
