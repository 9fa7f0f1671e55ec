//! # Gizmo Party Server
//!
//! Simulation core for Gizmo Party, a party platformer where players build
//! the level out of gizmos and then race through it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    GIZMO PARTY SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Shared primitives                         │
//! │  ├── vec2.rs     - 2D vectors and boxes                      │
//! │  ├── grid.rs     - Grid cells and the building area          │
//! │  └── hash.rs     - State digests for convergence checks      │
//! │                                                              │
//! │  sim/            - Time and physics boundary                 │
//! │  ├── tick.rs     - Logic and physics tick scheduler          │
//! │  └── physics.rs  - PhysicsWorld trait, reference integrator  │
//! │                                                              │
//! │  game/           - Bodies and round rules                    │
//! │  ├── authority.rs- Who simulates each body                   │
//! │  ├── motor.rs    - Run, jump and wall jump                   │
//! │  ├── reconcile.rs- Movement snapshots                        │
//! │  ├── platform.rs - Sliding platforms                         │
//! │  └── round.rs    - Round outcome and scoring                 │
//! │                                                              │
//! │  placement/      - Gizmo building                            │
//! │  ├── kind.rs     - Gizmo catalog                             │
//! │  ├── graph.rs    - Occupancy index and glue forest           │
//! │  └── handler.rs  - Selections and placement requests         │
//! │                                                              │
//! │  network/        - Messages and participants                 │
//! │  ├── protocol.rs - Message types                             │
//! │  ├── session.rs  - One participant's simulation context      │
//! │  └── loopback.rs - In-process transport                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency Model
//!
//! - Placement is validate-then-commit on the server and replay on clients;
//!   every participant ends with the same graph (`PlacementGraph::state_hash`).
//! - Movement is last-write-wins: whoever holds a body's authority simulates
//!   it, everyone else snaps to its snapshots.
//! - All bookkeeping iterates `BTreeMap`s, so replay order never depends on
//!   hashing.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod config;
pub mod sim;
pub mod game;
pub mod placement;
pub mod network;

// Re-export commonly used types
pub use config::GameConfig;
pub use core::grid::{BuildingArea, GridPos};
pub use core::vec2::{Rect, Vec2};
pub use game::body::{BodyId, BodyState, ClientId};
pub use placement::graph::{ObjectId, PlacementGraph, Rejection};
pub use sim::tick::{TickHandler, TickScheduler};
pub use network::session::Session;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
