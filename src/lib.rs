//! Declarative dependency wiring and service lifecycle orchestration.
//!
//! Components declare what they require and what they provide, a resolver
//! binds every requirement in one pass, and an orchestrator drives the
//! resolved services through init, start, stop and finit.

pub mod config;
pub mod core;
pub mod logging;
pub mod orchestration;
