//! Service orchestration layer
//!
//! This module drives resolved services through their lifecycle. The
//! executor runs hooks behind a panic boundary, the orchestrator tracks
//! which services reached which step, and the bootstrap ties declarations
//! to a runnable service list.

pub mod bootstrap;
pub mod executor;
pub mod lifecycle;


pub use bootstrap::Bootstrap;
pub use executor::{finit_services, start_services, stop_services, StartOutcome};
pub use lifecycle::{Orchestrator, TerminateHandle};
