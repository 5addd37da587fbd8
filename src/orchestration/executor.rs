//! Service hook execution
//!
//! This module invokes lifecycle hooks on lists of services. Every call goes
//! through a panic boundary, so a faulty service surfaces as an error value
//! instead of tearing down the caller.
//!
//! The free functions here carry no tracking state of their own, which lets
//! callers drive independent service lists side by side.

use std::{future::Future, panic::AssertUnwindSafe, sync::Arc};

use futures::{future::join_all, FutureExt};
use log::{debug, error, info, warn};

use crate::core::{
    context::Context,
    error::{Error, PanicPayload, Phase, Result, ServiceResult},
    traits::Service,
};

/// Result of [`start_services`]
pub struct StartOutcome {
    /// Context after the last successful `start`
    pub ctx: Context,
    /// Services whose `start` succeeded, in start order
    pub started: Vec<Arc<dyn Service>>,
    /// First failure, if any
    pub result: Result<()>,
}

impl StartOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Call `init` on one service behind the panic boundary
pub async fn init_service(
    index: usize,
    service: &dyn Service,
    ctx: &Context,
    verbose: bool,
) -> Result<Context> {
    invoke(Phase::Init, index, service, ctx, verbose, service.init(ctx)).await
}

/// Call `start` on one service behind the panic boundary
pub async fn start_service(
    index: usize,
    service: &dyn Service,
    ctx: &Context,
    verbose: bool,
) -> Result<Context> {
    invoke(Phase::Start, index, service, ctx, verbose, service.start(ctx)).await
}

/// Start `services` in order, stopping at the first failure.
///
/// Services started before the failure stay running; they are listed in
/// [`StartOutcome::started`] so the caller can stop exactly that subset. A
/// service rejected with [`Error::ContextDiscarded`] did start and is listed
/// too.
pub async fn start_services(
    ctx: Context,
    services: &[Arc<dyn Service>],
    verbose: bool,
) -> StartOutcome {
    let mut ctx = ctx;
    let mut started = Vec::with_capacity(services.len());

    for (index, service) in services.iter().enumerate() {
        match start_service(index, service.as_ref(), &ctx, verbose).await {
            Ok(next) => {
                info!(service = service.name(); "Service started");
                ctx = next;
                started.push(service.clone());
            }
            Err(err) => {
                // start ran to completion, so the service still needs stop
                if matches!(err, Error::ContextDiscarded { .. }) {
                    started.push(service.clone());
                }
                return StartOutcome {
                    ctx,
                    started,
                    result: Err(err),
                };
            }
        }
    }

    StartOutcome {
        ctx,
        started,
        result: Ok(()),
    }
}

/// Stop every service concurrently, one task per service, and wait for all
/// of them. Panics inside `stop` are contained.
pub async fn stop_services(ctx: &Context, started: &[Arc<dyn Service>], verbose: bool) {
    if started.is_empty() {
        return;
    }
    debug!("Stopping {} services", started.len());

    let names: Vec<String> = started.iter().map(|s| s.name().to_string()).collect();
    let handles = started.iter().map(|service| {
        let service = service.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move { service.stop(&ctx).await })
    });

    for (name, joined) in names.iter().zip(join_all(handles).await) {
        match joined {
            Ok(()) => info!(service = name.as_str(); "Service stopped"),
            Err(err) if err.is_panic() => {
                if verbose {
                    let payload = PanicPayload::new(err.into_panic());
                    error!("Service '{name}' panicked during stop: {payload}");
                }
            }
            Err(err) => warn!("Stop task of service '{name}' did not complete: {err}"),
        }
    }
}

/// Finalize `inited` sequentially in exact reverse order.
pub async fn finit_services(ctx: &Context, inited: &[Arc<dyn Service>], verbose: bool) {
    for service in inited.iter().rev() {
        let name = service.name();
        match AssertUnwindSafe(service.finit(ctx)).catch_unwind().await {
            Ok(()) => info!(service = name; "Service finited"),
            Err(payload) => {
                if verbose {
                    let payload = PanicPayload::new(payload);
                    error!("Service '{name}' panicked during finit: {payload}");
                }
            }
        }
    }
}

async fn invoke<F>(
    phase: Phase,
    index: usize,
    service: &dyn Service,
    ctx: &Context,
    verbose: bool,
    call: F,
) -> Result<Context>
where
    F: Future<Output = ServiceResult<Context>>,
{
    let name = service.name();
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(next)) if next.extends(ctx) => Ok(next),
        Ok(Ok(_)) => {
            warn!("Service '{name}' dropped context entries during {phase}");
            Err(Error::ContextDiscarded {
                service: name.to_string(),
                phase,
            })
        }
        Ok(Err(source)) => {
            warn!("Service '{name}' failed to {phase}: {source}");
            let service = name.to_string();
            Err(match phase {
                Phase::Init => Error::ServiceInitFailed { service, source },
                _ => Error::ServiceStartFailed { service, source },
            })
        }
        Err(payload) => {
            let payload = PanicPayload::new(payload);
            if verbose {
                error!("Service '{name}' (#{index}) panicked during {phase}: {payload}");
            }
            Err(Error::PanicInService {
                service: name.to_string(),
                index,
                phase,
                payload,
            })
        }
    }
}
