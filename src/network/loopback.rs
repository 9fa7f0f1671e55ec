//! Loopback Transport
//!
//! Routes messages between one server session and its client sessions in
//! the same process. Each endpoint has an unbounded `tokio::sync::mpsc`
//! inbox; delivery is in send order and needs no runtime (`try_recv`).

use std::collections::BTreeMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::game::authority::Role;
use crate::game::body::ClientId;
use crate::network::protocol::{ClientMessage, ServerMessage};
use crate::network::session::{Outbound, Session, SessionError};
use crate::sim::tick::TickReport;

/// Upper bound on routing rounds per `pump`.
const MAX_PUMP_ROUNDS: usize = 64;

struct ClientEndpoint {
    session: Session,
    inbox_tx: UnboundedSender<ServerMessage>,
    inbox_rx: UnboundedReceiver<ServerMessage>,
}

/// In-process network of one server and its clients.
pub struct Loopback {
    server: Session,
    server_tx: UnboundedSender<(ClientId, ClientMessage)>,
    server_rx: UnboundedReceiver<(ClientId, ClientMessage)>,
    clients: BTreeMap<ClientId, ClientEndpoint>,
    delivered: u64,
}

impl Loopback {
    /// Network around a server session.
    pub fn new(server: Session) -> Result<Self, SessionError> {
        if !server.role().is_server() {
            return Err(SessionError::NotServer);
        }
        let (server_tx, server_rx) = mpsc::unbounded_channel();
        Ok(Self {
            server,
            server_tx,
            server_rx,
            clients: BTreeMap::new(),
            delivered: 0,
        })
    }

    /// Attach a client session.
    pub fn add_client(&mut self, session: Session) -> Result<ClientId, SessionError> {
        let Role::Client(id) = session.role() else {
            return Err(SessionError::NotClient);
        };
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        self.clients.insert(id, ClientEndpoint { session, inbox_tx, inbox_rx });
        debug!("{} attached to loopback", id);
        Ok(id)
    }

    /// Server session.
    pub fn server(&self) -> &Session {
        &self.server
    }

    /// Server session, mutable.
    pub fn server_mut(&mut self) -> &mut Session {
        &mut self.server
    }

    /// A client session.
    pub fn client(&self, id: ClientId) -> Option<&Session> {
        self.clients.get(&id).map(|c| &c.session)
    }

    /// A client session, mutable.
    pub fn client_mut(&mut self, id: ClientId) -> Option<&mut Session> {
        self.clients.get_mut(&id).map(|c| &mut c.session)
    }

    /// Attached client ids.
    pub fn client_ids(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.clients.keys().copied()
    }

    /// Messages delivered so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Advance every participant by one frame, then deliver all traffic.
    /// Returns the server's tick report.
    pub fn advance(&mut self, delta_seconds: f64) -> TickReport {
        let report = self.server.advance(delta_seconds);
        for endpoint in self.clients.values_mut() {
            endpoint.session.advance(delta_seconds);
        }
        self.pump();
        report
    }

    /// Route and deliver until no participant has anything left to send.
    pub fn pump(&mut self) {
        for _ in 0..MAX_PUMP_ROUNDS {
            if self.route() == 0 {
                return;
            }
            self.deliver();
        }
        warn!("Loopback still busy after {} rounds", MAX_PUMP_ROUNDS);
    }

    /// Move outboxes into inboxes. Returns the number of messages queued.
    fn route(&mut self) -> usize {
        let mut queued = 0;

        for outbound in self.server.drain_outbox() {
            match outbound {
                Outbound::Broadcast(message) => {
                    for endpoint in self.clients.values() {
                        if endpoint.inbox_tx.send(message.clone()).is_ok() {
                            queued += 1;
                        }
                    }
                }
                Outbound::ToServer(_) => warn!("Server tried to send to itself"),
            }
        }

        for (&id, endpoint) in self.clients.iter_mut() {
            for outbound in endpoint.session.drain_outbox() {
                match outbound {
                    Outbound::ToServer(message) => {
                        if self.server_tx.send((id, message)).is_ok() {
                            queued += 1;
                        }
                    }
                    Outbound::Broadcast(_) => warn!("{} tried to broadcast", id),
                }
            }
        }

        queued
    }

    /// Hand every queued message to its session. Protocol violations are
    /// dropped; the sessions keep running.
    fn deliver(&mut self) {
        while let Ok((sender, message)) = self.server_rx.try_recv() {
            self.delivered += 1;
            if let Err(e) = self.server.handle_client_message(sender, message) {
                debug!("Server dropped message from {}: {}", sender, e);
            }
        }

        for (&id, endpoint) in self.clients.iter_mut() {
            while let Ok(message) = endpoint.inbox_rx.try_recv() {
                self.delivered += 1;
                if let Err(e) = endpoint.session.handle_server_message(message) {
                    debug!("{} dropped server message: {}", id, e);
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
