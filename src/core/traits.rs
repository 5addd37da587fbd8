//! Core traits for wireup components
//!
//! This module defines the contract every orchestrated unit implements.

use async_trait::async_trait;

use super::{context::Context, error::ServiceResult};

/// Lifecycle contract of an orchestrated service.
///
/// Hooks are driven by the orchestrator in a fixed order: `init` and `start`
/// forward over the service list, `stop` concurrently, `finit` in reverse.
/// Services own their state and must synchronize it themselves.
#[async_trait]
pub trait Service: Send + Sync {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    /// Acquire resources. May derive a new context from `ctx`.
    async fn init(&self, ctx: &Context) -> ServiceResult<Context> {
        Ok(ctx.clone())
    }

    /// Begin active operation. May derive a new context from `ctx`.
    ///
    /// A failing `start` must not leave the service needing `stop`.
    async fn start(&self, ctx: &Context) -> ServiceResult<Context> {
        Ok(ctx.clone())
    }

    /// Release active-operation resources. Called at most once, and only
    /// after `start` succeeded. Other services may already be stopped.
    async fn stop(&self, _ctx: &Context) {}

    /// Release what `init` acquired. Called at most once, and only after
    /// `init` succeeded.
    async fn finit(&self, _ctx: &Context) {}
}
