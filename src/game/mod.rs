//! Game Logic Module
//!
//! Per-body movement, authority and replication, plus the round rules that
//! sit on top of them.
//!
//! ## Module Structure
//!
//! - `body`: Client/body identifiers and replicated body state
//! - `input`: Input frames and input sources
//! - `motor`: Player movement rules (run, jump, wall jump)
//! - `authority`: Who simulates each body
//! - `reconcile`: Snapshot production and merging
//! - `platform`: Sliding platforms
//! - `round`: Round outcome and scoring
//! - `events`: Game events for the session driver

pub mod body;
pub mod input;
pub mod motor;
pub mod authority;
pub mod reconcile;
pub mod platform;
pub mod round;
pub mod events;

// Re-export key types
pub use body::{BodyId, BodyState, ClientId};
pub use input::{IdleInput, InputFrame, InputSource, ScriptedInput};
pub use motor::Motor;
pub use authority::{AuthorityChange, AuthorityChannel, AuthorityError, AuthorityState, Role};
pub use reconcile::{MovementSnapshot, Reconciler, ReplicationError, SnapshotEmit};
pub use platform::SlidingPlatform;
pub use round::{PointsTable, RoundOutcome, ScoreBreakdown};
pub use events::{DeathCause, GameEvent};
