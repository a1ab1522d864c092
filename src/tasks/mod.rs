//! Concurrent task lifecycle.
//!
//! - [`Orchestrator`]: admission under a capacity bound, TTL eviction, removal
//! - [`Engine`]: the engine a task owns, one variant per problem kind
//! - [`drive_task`]: runs a task against a client channel

mod config;
mod driver;
mod engine;
mod orchestrator;

pub use config::{OrchestratorConfig, TaskRequest};
pub use driver::{connection, drive_task, CloseCode, DriverEnd, TransportEnd};
pub use engine::{ActionEvolution, Engine, EngineReport, TourEvolution, VectorEvolution};
pub use orchestrator::{Orchestrator, TaskSnapshot, TaskTicket};
