//! Participant Session
//!
//! One simulation context per participant (the server or one client). A
//! session owns the tick scheduler, the authority channel, the movement
//! reconciler, the physics world and the placement graph, and wires them
//! together as the scheduler's [`TickHandler`]:
//!
//! ```text
//! logic tick      -> latch input, emit snapshots
//! before physics  -> move platforms, hand carry forces to riders
//! before player   -> movement rules for bodies simulated here
//! integrate       -> PhysicsWorld::step
//! after physics   -> reset forces; server: kill and goal checks,
//!                    client: hazard contact reports
//! ```
//!
//! Incoming messages go through `handle_client_message` (server) or
//! `handle_server_message` (client). Outgoing messages accumulate in an
//! outbox drained by the transport.

use std::collections::{BTreeMap, BTreeSet};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::core::grid::GridPos;
use crate::core::hash::{StateHash, StateHasher};
use crate::core::vec2::{Rect, Vec2};
use crate::game::authority::{AuthorityChange, AuthorityChannel, AuthorityError, Role};
use crate::game::body::{BodyId, BodyState, ClientId};
use crate::game::events::{DeathCause, GameEvent};
use crate::game::input::{IdleInput, InputSource};
use crate::game::platform::SlidingPlatform;
use crate::game::reconcile::{MovementSnapshot, Reconciler, ReplicationError, SnapshotEmit};
use crate::game::round::{PointsTable, RoundOutcome, ScoreBreakdown};
use crate::network::protocol::{ClientMessage, PlacementAccepted, PlacementRequest, ServerMessage};
use crate::placement::graph::{InvariantViolation, ObjectId, PlacementGraph, PlacementRecord};
use crate::placement::handler::{PlacementError, PlacementHandler};
use crate::placement::kind::{GizmoBehavior, GizmoCatalog};
use crate::sim::physics::{FlatWorld, IntegrationMode, PhysicsWorld};
use crate::sim::tick::{LogicTick, PhysicsStep, TickHandler, TickReport, TickScheduler};

/// Half extent of a hazard's contact box inside its cell.
const HAZARD_HALF_EXTENT: f32 = 0.4;

// =============================================================================
// ERRORS
// =============================================================================

/// Errors from session operations and message handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Body was never spawned here
    #[error("unknown body {0}")]
    UnknownBody(BodyId),

    /// Sender does not own the body it talks about
    #[error("{sender} does not own {body}")]
    NotOwner {
        /// Body
        body: BodyId,
        /// Sender
        sender: ClientId,
    },

    /// Snapshot from an owner without authority
    #[error("snapshot for {0} sent without authority")]
    StaleSnapshot(BodyId),

    /// Message not valid in the current state
    #[error("unexpected message: {0}")]
    UnexpectedMessage(&'static str),

    /// Operation reserved to the server
    #[error("only the server may do this")]
    NotServer,

    /// Operation reserved to clients
    #[error("only a client may do this")]
    NotClient,

    /// Session stopped after an invariant violation
    #[error("session aborted")]
    Aborted,

    /// Local placement state diverged
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}

impl From<ReplicationError> for SessionError {
    fn from(err: ReplicationError) -> Self {
        match err {
            ReplicationError::NotServer => SessionError::NotServer,
            ReplicationError::NotClient => SessionError::NotClient,
            ReplicationError::UnknownBody(body) => SessionError::UnknownBody(body),
            ReplicationError::NotOwner { body, sender } => SessionError::NotOwner { body, sender },
            ReplicationError::StaleSnapshot(body) => SessionError::StaleSnapshot(body),
        }
    }
}

impl From<AuthorityError> for SessionError {
    fn from(err: AuthorityError) -> Self {
        match err {
            AuthorityError::NotServer => SessionError::NotServer,
            AuthorityError::UnknownBody(body) => SessionError::UnknownBody(body),
        }
    }
}

/// A message leaving this participant.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Client to server
    ToServer(ClientMessage),
    /// Server to every client
    Broadcast(ServerMessage),
}

// =============================================================================
// SESSION
// =============================================================================

/// Simulation context of one participant.
pub struct Session {
    session_id: Option<Uuid>,
    config: GameConfig,
    scheduler: TickScheduler,
    authority: AuthorityChannel,
    reconciler: Reconciler,
    physics: Box<dyn PhysicsWorld + Send>,
    input: Box<dyn InputSource + Send>,
    graph: PlacementGraph,
    placements: PlacementHandler,
    platforms: BTreeMap<ObjectId, SlidingPlatform>,
    hazards: BTreeMap<ObjectId, Vec<Rect>>,
    round_active: bool,
    round_over: bool,
    outcome: RoundOutcome,
    points: PointsTable,
    last_scores: Vec<ScoreBreakdown>,
    death_reported: BTreeSet<BodyId>,
    next_body: u32,
    /// Physics time of the last step, the time base for input latching
    clock: f64,
    outbox: Vec<Outbound>,
    events: Vec<GameEvent>,
    aborted: Option<InvariantViolation>,
}

impl Session {
    /// Session with the reference integrator and no local input.
    pub fn new(role: Role, config: GameConfig) -> Self {
        let physics = Box::new(FlatWorld::from_map(&config.map));
        let graph = PlacementGraph::new(
            GizmoCatalog::standard(),
            config.map.building_area,
            config.map.preoccupied.iter().copied(),
        );

        Self {
            session_id: None,
            scheduler: TickScheduler::from_config(&config.tick),
            authority: AuthorityChannel::new(role),
            reconciler: Reconciler::new(config.movement.clone()),
            physics,
            input: Box::new(IdleInput),
            graph,
            placements: PlacementHandler::new(),
            platforms: BTreeMap::new(),
            hazards: BTreeMap::new(),
            round_active: false,
            round_over: false,
            outcome: RoundOutcome::new(),
            points: PointsTable::new(config.scoring.clone(), std::iter::empty()),
            last_scores: Vec::new(),
            death_reported: BTreeSet::new(),
            next_body: 1,
            clock: 0.0,
            outbox: Vec::new(),
            events: Vec::new(),
            aborted: None,
            config,
        }
    }

    /// Server session.
    pub fn server(config: GameConfig) -> Self {
        Self::new(Role::Server, config)
    }

    /// Client session.
    pub fn client(client: ClientId, config: GameConfig) -> Self {
        Self::new(Role::Client(client), config)
    }

    /// Replace the local input source.
    pub fn with_input(mut self, input: Box<dyn InputSource + Send>) -> Self {
        self.input = input;
        self
    }

    /// Replace the physics world. Call before any body is spawned.
    pub fn with_physics(mut self, physics: Box<dyn PhysicsWorld + Send>) -> Self {
        self.physics = physics;
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Participant role.
    pub fn role(&self) -> Role {
        self.authority.role()
    }

    fn is_server(&self) -> bool {
        self.role().is_server()
    }

    /// Session id, known once the clock started.
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Configuration in use.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Tick scheduler.
    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    /// Authority flags.
    pub fn authority(&self) -> &AuthorityChannel {
        &self.authority
    }

    /// Movement reconciler.
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Placement graph.
    pub fn graph(&self) -> &PlacementGraph {
        &self.graph
    }

    /// Placement bookkeeping.
    pub fn placements(&self) -> &PlacementHandler {
        &self.placements
    }

    /// Sliding platforms by the object that spawned them.
    pub fn platforms(&self) -> &BTreeMap<ObjectId, SlidingPlatform> {
        &self.platforms
    }

    /// Current state of a body.
    pub fn body_state(&self, body: BodyId) -> Option<BodyState> {
        self.physics.body_state(body)
    }

    /// Current state of a body as a snapshot.
    pub fn snapshot(&self, body: BodyId) -> Option<MovementSnapshot> {
        self.body_state(body).map(|state| MovementSnapshot { body_id: body, state })
    }

    /// Physics mode of a body on this participant.
    pub fn body_mode(&self, body: BodyId) -> Option<IntegrationMode> {
        self.physics.mode(body)
    }

    /// Outcome of the current round.
    pub fn outcome(&self) -> &RoundOutcome {
        &self.outcome
    }

    /// Match points (server).
    pub fn points(&self) -> &PointsTable {
        &self.points
    }

    /// Breakdowns of the last scored round.
    pub fn last_scores(&self) -> &[ScoreBreakdown] {
        &self.last_scores
    }

    /// Whether round hazards and checks run.
    pub fn is_round_active(&self) -> bool {
        self.round_active
    }

    /// Violation that stopped the session.
    pub fn abort_reason(&self) -> Option<&InvariantViolation> {
        self.aborted.as_ref()
    }

    /// Whether the session stopped.
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// Take pending outgoing messages.
    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    /// Take pending events.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Digest of every body's state, for comparing participants.
    pub fn bodies_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_bodies();
        for body in self.authority.bodies() {
            hasher.update_u32(body.0);
            if let Some(state) = self.physics.body_state(body) {
                hasher.update_vec2(state.position);
                hasher.update_vec2(state.velocity);
                hasher.update_bool(state.facing);
            }
        }
        hasher.finalize()
    }

    // -------------------------------------------------------------------------
    // Clock
    // -------------------------------------------------------------------------

    /// Advance by one real frame. Does nothing once aborted.
    pub fn advance(&mut self, delta_seconds: f64) -> TickReport {
        if self.aborted.is_some() {
            return TickReport::default();
        }
        // The scheduler drives `self` as its handler
        let mut scheduler = self.scheduler.clone();
        self.clock = scheduler.physics_time();
        let report = scheduler.advance(delta_seconds, self);
        self.scheduler = scheduler;
        report
    }

    /// Server: start the clock and tell clients when.
    pub fn start_clock(&mut self) -> Result<Uuid, SessionError> {
        self.require_server()?;
        let session_id = Uuid::new_v4();
        self.session_id = Some(session_id);
        self.scheduler.start_server();

        info!("Session {} clock started", session_id);
        self.broadcast(ServerMessage::ClockStart { session_id, start_utc: Utc::now() });
        Ok(session_id)
    }

    // -------------------------------------------------------------------------
    // Server operations
    // -------------------------------------------------------------------------

    /// Server: spawn a body for a client at its spawn point.
    pub fn spawn_body(&mut self, owner: ClientId) -> Result<BodyId, SessionError> {
        self.require_server()?;
        let body = BodyId(self.next_body);
        self.next_body += 1;
        let spawn = self.spawn_point(body);

        self.register_body(body, owner, BodyState::at(spawn));
        self.points.add_player(owner);
        self.broadcast(ServerMessage::BodySpawned { body_id: body, owner });

        let snapshot = self
            .reconciler
            .set_state_server_sided(&self.authority, body, BodyState::at(spawn), &mut *self.physics)?;
        self.broadcast(ServerMessage::Snapshot { snapshot, skip_owner: false });

        info!("Spawned {} for {} at {}", body, owner, spawn);
        Ok(body)
    }

    /// Server: hand a body to its owner.
    pub fn grant_authority(&mut self, body: BodyId) -> Result<(), SessionError> {
        self.require_server()?;
        let change = self.authority.grant(body)?;
        self.publish_authority(change);
        Ok(())
    }

    /// Server: take a body back.
    pub fn revoke_authority(&mut self, body: BodyId) -> Result<(), SessionError> {
        self.require_server()?;
        let change = self.authority.revoke(body)?;
        self.publish_authority(change);
        Ok(())
    }

    /// Server: overwrite a body's position. Reaches the owner too.
    pub fn teleport(&mut self, body: BodyId, position: Vec2) -> Result<(), SessionError> {
        let snapshot = self
            .reconciler
            .set_state_server_sided(&self.authority, body, BodyState::at(position), &mut *self.physics)?;
        self.broadcast(ServerMessage::Snapshot { snapshot, skip_owner: false });
        Ok(())
    }

    /// Server: bring a body back for a new round: release it, move it to its
    /// spawn point and grant authority.
    pub fn respawn_body(&mut self, body: BodyId) -> Result<(), SessionError> {
        self.require_server()?;
        let spawn = self.spawn_point(body);

        self.reconciler.set_immobile(body, false, &mut *self.physics)?;
        self.teleport(body, spawn)?;
        self.grant_authority(body)
    }

    /// Server: start platforms and round checks, clearing the outcome.
    pub fn start_round_hazards(&mut self) -> Result<(), SessionError> {
        self.require_server()?;
        self.outcome = RoundOutcome::new();
        self.round_over = false;
        self.set_round_active(true);
        self.broadcast(ServerMessage::RoundHazards { active: true });
        Ok(())
    }

    /// Server: stop platforms and round checks.
    pub fn stop_round_hazards(&mut self) -> Result<(), SessionError> {
        self.require_server()?;
        self.set_round_active(false);
        self.broadcast(ServerMessage::RoundHazards { active: false });
        Ok(())
    }

    /// Server: record a client's pick from the gizmo box.
    pub fn select_gizmo(&mut self, client: ClientId, kind: &str) -> Result<(), SessionError> {
        self.require_server()?;
        self.placements.select_gizmo(client, kind);
        self.broadcast(ServerMessage::GizmoSelected { client_id: client, kind: kind.to_string() });
        Ok(())
    }

    /// Server: fold the round outcome into the points table.
    pub fn score_round(&mut self) -> Result<Vec<ScoreBreakdown>, SessionError> {
        self.require_server()?;
        let scores = self.points.score_round(&self.outcome);
        let winner = self.points.winner();
        if let Some(winner) = winner {
            info!("{} won the match", winner);
        }
        self.last_scores = scores.clone();
        self.broadcast(ServerMessage::RoundScored { scores: scores.clone(), winner });
        Ok(scores)
    }

    // -------------------------------------------------------------------------
    // Client operations
    // -------------------------------------------------------------------------

    /// Client: ask the server to place the selected gizmo.
    pub fn request_placement(&mut self, position: GridPos, rotation_deg: i32, kind: &str) -> Result<(), SessionError> {
        self.require_client()?;
        self.outbox.push(Outbound::ToServer(ClientMessage::PlaceGizmo(PlacementRequest {
            position: position.to_array(),
            rotation_deg,
            kind: kind.to_string(),
        })));
        Ok(())
    }

    /// Client: report the local body's death.
    pub fn report_death(&mut self, trap: Option<ObjectId>) -> Result<(), SessionError> {
        let me = self.require_client()?;
        let body = self
            .authority
            .body_of(me)
            .ok_or(SessionError::UnexpectedMessage("no body to report"))?;
        self.death_reported.insert(body);
        self.outbox.push(Outbound::ToServer(ClientMessage::ReportDeath { body_id: body, trap }));
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Message handling
    // -------------------------------------------------------------------------

    /// Server: handle a message from a client.
    #[instrument(skip(self, message), fields(role = "server"))]
    pub fn handle_client_message(&mut self, sender: ClientId, message: ClientMessage) -> Result<(), SessionError> {
        if self.aborted.is_some() {
            return Err(SessionError::Aborted);
        }
        self.require_server()?;

        match message {
            ClientMessage::Snapshot(snapshot) => {
                let relay = self
                    .reconciler
                    .merge_client_snapshot(&self.authority, sender, snapshot, &mut *self.physics)
                    .map_err(|e| {
                        debug!("Dropped snapshot from {}: {}", sender, e);
                        SessionError::from(e)
                    })?;
                self.broadcast(ServerMessage::Snapshot { snapshot: relay, skip_owner: true });
            }

            ClientMessage::PlaceGizmo(request) => {
                let position = request.grid_position();
                match self.placements.handle_request(
                    &mut self.graph,
                    sender,
                    position,
                    request.rotation_deg,
                    &request.kind,
                ) {
                    Ok(record) => {
                        self.on_placed(&record);
                        self.broadcast(ServerMessage::PlacementAccepted(PlacementAccepted::new(&record, sender)));
                    }
                    Err(PlacementError::Rejected(rejection)) => {
                        debug!("Placement from {} rejected: {}", sender, rejection);
                    }
                    Err(PlacementError::Invariant(violation)) => return Err(self.abort(violation)),
                }
            }

            ClientMessage::ReportDeath { body_id, trap } => {
                let owner = self.authority.owner(body_id).ok_or(SessionError::UnknownBody(body_id))?;
                if owner != sender {
                    warn!("{} reported the death of {} it does not own", sender, body_id);
                    return Err(SessionError::NotOwner { body: body_id, sender });
                }
                if !self.round_active {
                    debug!("Ignoring death report from {} outside a round", sender);
                    return Ok(());
                }
                self.kill(body_id, owner, DeathCause::Reported { trap })?;
            }
        }

        Ok(())
    }

    /// Client: handle a message from the server.
    pub fn handle_server_message(&mut self, message: ServerMessage) -> Result<(), SessionError> {
        self.handle_server_message_at(message, Utc::now())
    }

    /// Client: handle a message from the server with an explicit wall clock
    /// (used for the clock phase shift).
    #[instrument(skip(self, message, now_utc), fields(role = "client"))]
    pub fn handle_server_message_at(&mut self, message: ServerMessage, now_utc: DateTime<Utc>) -> Result<(), SessionError> {
        if self.aborted.is_some() {
            return Err(SessionError::Aborted);
        }
        let me = self.require_client()?;

        match message {
            ServerMessage::ClockStart { session_id, start_utc } => {
                if self.scheduler.is_started() {
                    return Err(SessionError::UnexpectedMessage("clock already started"));
                }
                self.session_id = Some(session_id);
                self.scheduler.start_client(start_utc, now_utc);
                info!("{} joined session {}", me, session_id);
            }

            ServerMessage::BodySpawned { body_id, owner } => {
                self.register_body(body_id, owner, BodyState::default());
            }

            ServerMessage::Authority { body_id, has_authority } => {
                self.authority.apply(AuthorityChange { body_id, has_authority })?;
                if has_authority {
                    self.death_reported.remove(&body_id);
                }
                self.sync_mode(body_id);
                self.events.push(GameEvent::AuthorityChanged { body_id, has_authority });
            }

            ServerMessage::Snapshot { snapshot, skip_owner } => {
                self.reconciler
                    .merge_server_snapshot(&self.authority, snapshot, skip_owner, &mut *self.physics)?;
            }

            ServerMessage::GizmoSelected { client_id, kind } => {
                self.placements.select_gizmo(client_id, kind);
            }

            ServerMessage::PlacementAccepted(accepted) => {
                let record = accepted.to_record();
                if let Err(violation) = self.graph.apply(&record) {
                    return Err(self.abort(violation));
                }
                self.placements.record_placed(record.object_id, accepted.placed_by);
                self.on_placed(&record);
            }

            ServerMessage::RoundHazards { active } => {
                if active {
                    self.outcome = RoundOutcome::new();
                }
                self.set_round_active(active);
            }

            ServerMessage::RoundScored { scores, winner } => {
                if let Some(mine) = scores.iter().find(|s| s.client == me) {
                    info!("{} scored {} this round", me, mine.total());
                }
                if let Some(winner) = winner {
                    info!("{} won the match", winner);
                }
                self.last_scores = scores;
            }
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Spawn points are handed out in body order and wrap around.
    fn spawn_point(&self, body: BodyId) -> Vec2 {
        let spawns = &self.config.map.spawn_points;
        if spawns.is_empty() {
            return Vec2::ZERO;
        }
        spawns[(body.0 as usize).saturating_sub(1) % spawns.len()]
    }

    fn require_server(&self) -> Result<(), SessionError> {
        if self.is_server() {
            Ok(())
        } else {
            Err(SessionError::NotServer)
        }
    }

    fn require_client(&self) -> Result<ClientId, SessionError> {
        self.role().client_id().ok_or(SessionError::NotClient)
    }

    fn broadcast(&mut self, message: ServerMessage) {
        self.outbox.push(Outbound::Broadcast(message));
    }

    fn abort(&mut self, violation: InvariantViolation) -> SessionError {
        error!("Aborting session: {}", violation);
        self.aborted = Some(violation.clone());
        SessionError::Invariant(violation)
    }

    fn register_body(&mut self, body: BodyId, owner: ClientId, state: BodyState) {
        self.authority.register(body, owner);
        self.reconciler.spawn(body);
        let mode = self.authority.integration_mode(body);
        self.physics.spawn_body(body, state, mode);
        self.events.push(GameEvent::BodySpawned { body_id: body, owner });
    }

    /// Immobile bodies hold still; otherwise the mode follows authority.
    fn sync_mode(&mut self, body: BodyId) {
        let frozen = self.reconciler.motor(body).is_some_and(|m| m.is_immobile());
        let mode = if frozen {
            IntegrationMode::KinematicMirror
        } else {
            self.authority.integration_mode(body)
        };
        self.physics.set_mode(body, mode);
    }

    fn publish_authority(&mut self, change: AuthorityChange) {
        self.sync_mode(change.body_id);
        self.events.push(GameEvent::AuthorityChanged {
            body_id: change.body_id,
            has_authority: change.has_authority,
        });
        self.broadcast(ServerMessage::Authority {
            body_id: change.body_id,
            has_authority: change.has_authority,
        });
    }

    fn set_round_active(&mut self, active: bool) {
        self.round_active = active;
        for (id, platform) in self.platforms.iter_mut() {
            if active {
                platform.start();
            } else {
                platform.stop();
            }
            self.physics.set_moving_box(id.0, platform.bounds());
        }
        debug!("Round hazards {}", if active { "started" } else { "stopped" });
    }

    /// Give a committed placement its physical presence.
    fn on_placed(&mut self, record: &PlacementRecord) {
        let behavior = self.graph.catalog().get(&record.kind).map(|k| k.behavior);

        match behavior {
            Some(GizmoBehavior::Solid) => {
                for cell in record.cells() {
                    self.physics.add_static_box(cell_rect(cell, 0.5));
                }
            }
            Some(GizmoBehavior::Hazard) => {
                let boxes = record.cells().map(|c| cell_rect(c, HAZARD_HALF_EXTENT)).collect();
                self.hazards.insert(record.object_id, boxes);
            }
            Some(GizmoBehavior::SlidingPlatform) => {
                let center = cell_center(record.position);
                let mut platform = SlidingPlatform::new(center, record.rotation_deg as f32 / 2.0, &self.config.platform);
                if self.round_active {
                    platform.start();
                }
                self.physics.set_moving_box(record.object_id.0, platform.bounds());
                self.platforms.insert(record.object_id, platform);
            }
            Some(GizmoBehavior::Glue) | None => {}
        }

        self.events.push(GameEvent::GizmoPlaced {
            object_id: record.object_id,
            kind: record.kind.clone(),
            position: record.position,
        });
        if self.placements.all_placed() {
            self.events.push(GameEvent::AllGizmosPlaced);
        }
    }

    /// Server: take a finished or dead body out of play.
    fn retire(&mut self, body: BodyId) -> Result<(), SessionError> {
        self.reconciler.set_immobile(body, true, &mut *self.physics)?;
        let change = self.authority.revoke(body)?;
        self.publish_authority(change);
        Ok(())
    }

    fn kill(&mut self, body: BodyId, owner: ClientId, cause: DeathCause) -> Result<(), SessionError> {
        if !self.outcome.record_death(owner) {
            return Ok(());
        }
        self.retire(body)?;

        if let DeathCause::Reported { trap: Some(trap) } = cause {
            match self.placements.owner_of(trap) {
                Some(placer) if placer != owner => self.outcome.credit_trap_kill(placer),
                _ => {}
            }
        }

        info!("{} died ({:?})", owner, cause);
        self.events.push(GameEvent::PlayerDied { client: owner, cause });
        self.check_round_over();
        Ok(())
    }

    fn finish(&mut self, body: BodyId, owner: ClientId) -> Result<(), SessionError> {
        if !self.outcome.record_finish(owner) {
            return Ok(());
        }
        self.retire(body)?;

        let place = self.outcome.finished.len() as u32;
        info!("{} finished in place {}", owner, place);
        self.events.push(GameEvent::PlayerFinished { client: owner, place });
        self.check_round_over();
        Ok(())
    }

    fn check_round_over(&mut self) {
        if self.round_over {
            return;
        }
        let players: Vec<ClientId> = self.authority.bodies().filter_map(|b| self.authority.owner(b)).collect();
        if self.outcome.all_done(players.iter()) {
            self.round_over = true;
            info!("Round over");
            self.events.push(GameEvent::RoundOver);
        }
    }

    /// Server: death bounds and goal on post-integration positions.
    fn check_kill_and_goal(&mut self) {
        let death_bounds = self.config.map.death_bounds();
        let goal = self.config.map.goal;
        let bodies: Vec<BodyId> = self.authority.bodies().collect();

        for body in bodies {
            let Some(owner) = self.authority.owner(body) else { continue };
            if self.outcome.is_done(owner) {
                continue;
            }
            let Some(bounds) = self.physics.body_bounds(body) else { continue };

            let result = if !death_bounds.contains(bounds.center()) {
                self.kill(body, owner, DeathCause::OutOfBounds)
            } else if goal.overlaps(&bounds) {
                self.finish(body, owner)
            } else {
                Ok(())
            };
            if let Err(e) = result {
                warn!("Round check failed for {}: {}", body, e);
            }
        }
    }

    /// Client: report contact between the local body and a hazard.
    fn check_hazards(&mut self) {
        if self.hazards.is_empty() {
            return;
        }
        let bodies: Vec<BodyId> = self
            .authority
            .bodies()
            .filter(|b| self.authority.simulates(*b) && !self.death_reported.contains(b))
            .collect();

        for body in bodies {
            let Some(bounds) = self.physics.body_bounds(body) else { continue };
            let hit = self
                .hazards
                .iter()
                .find(|(_, boxes)| boxes.iter().any(|b| b.overlaps(&bounds)))
                .map(|(id, _)| *id);

            if let Some(trap) = hit {
                debug!("{} touched hazard {}", body, trap);
                self.death_reported.insert(body);
                self.outbox.push(Outbound::ToServer(ClientMessage::ReportDeath { body_id: body, trap: Some(trap) }));
            }
        }
    }

    fn emit_snapshots(&mut self, emits: Vec<SnapshotEmit>) {
        for emit in emits {
            match emit {
                SnapshotEmit::ToServer(snapshot) => {
                    self.outbox.push(Outbound::ToServer(ClientMessage::Snapshot(snapshot)));
                }
                SnapshotEmit::ToClients(snapshot) => {
                    self.broadcast(ServerMessage::Snapshot { snapshot, skip_owner: false });
                }
            }
        }
    }
}

/// World center of a grid cell.
fn cell_center(cell: GridPos) -> Vec2 {
    Vec2::new(cell.x as f32, cell.y as f32)
}

fn cell_rect(cell: GridPos, half_extent: f32) -> Rect {
    Rect::from_center(cell_center(cell), Vec2::new(half_extent, half_extent))
}

// =============================================================================
// TICK HANDLER
// =============================================================================

impl TickHandler for Session {
    fn logic_tick(&mut self, _tick: LogicTick) {
        let emits = self
            .reconciler
            .logic_tick(&self.authority, &mut *self.physics, &mut *self.input, self.clock);
        self.emit_snapshots(emits);
    }

    fn before_physics(&mut self, step: PhysicsStep) {
        self.clock = step.time;
        if !self.round_active {
            return;
        }

        for (id, platform) in self.platforms.iter_mut() {
            platform.advance(step.dt);
            self.physics.set_moving_box(id.0, platform.bounds());

            let force = platform.carry_force(step.dt);
            if force == Vec2::ZERO {
                continue;
            }
            // Only riders stepped under authority take the carry force
            for body in self.authority.bodies() {
                if !self.authority.simulates(body) || !self.authority.has_authority(body) {
                    continue;
                }
                let riding = self.physics.body_bounds(body).is_some_and(|b| platform.touches(&b));
                if riding {
                    if let Err(e) = self.reconciler.add_external_force(body, force) {
                        debug!("No motor for rider {}: {}", body, e);
                    }
                }
            }
        }
    }

    fn before_physics_player(&mut self, step: PhysicsStep) {
        self.reconciler
            .before_physics_player(&self.authority, &mut *self.physics, step.time);
    }

    fn integrate(&mut self, step: PhysicsStep) {
        self.physics.step(step.dt);
    }

    fn after_physics(&mut self, _step: PhysicsStep) {
        self.reconciler.after_physics();
        if !self.round_active {
            return;
        }
        if self.is_server() {
            self.check_kill_and_goal();
        } else {
            self.check_hazards();
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
