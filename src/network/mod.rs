//! Network Layer
//!
//! Message types, the per-participant session that reacts to them, and an
//! in-process loopback transport. Real sockets are out of scope; anything
//! that can move `ClientMessage`/`ServerMessage` values can drive a session.

pub mod protocol;
pub mod session;
pub mod loopback;

pub use protocol::{ClientMessage, ServerMessage, PlacementRequest, PlacementAccepted};
pub use session::{Session, SessionError, Outbound};
pub use loopback::Loopback;
