//! Simulation time and the physics boundary.

pub mod tick;
pub mod physics;

pub use tick::{TickScheduler, TickHandler, TickReport, LogicTick, PhysicsStep};
pub use physics::{PhysicsWorld, FlatWorld, IntegrationMode, Contacts, WallSide};
