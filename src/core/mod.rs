//! Core abstractions for wireup
//!
//! Declarations, resolution, the execution context and the service contract
//! that the orchestration layer drives.

pub mod container;
pub mod context;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod slot;
pub mod traits;


// Re-export commonly used types
pub use container::Injector;
pub use context::Context;
pub use error::{BoxError, Error, PanicPayload, Phase, Result, ServiceResult};
pub use registry::{Capability, Cardinality, Declarations, Injectable};
pub use slot::{CollectionSlot, Slot};
pub use traits::Service;
