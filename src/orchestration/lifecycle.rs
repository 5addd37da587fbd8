//! Service lifecycle management
//!
//! The [`Orchestrator`] drives an ordered service list through init, start,
//! stop and finit, and keeps track of which services reached which step so
//! that teardown is always symmetric with what actually happened.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::{debug, error, info, warn};
use tokio::sync::{watch, Mutex};

use super::executor::{finit_services, init_service, start_services, stop_services};
use crate::{
    config::LifecycleConfig,
    core::{
        context::Context,
        error::{Error, Result},
        traits::Service,
    },
};

/// Releases a blocked [`Orchestrator::run`]. Cheap to clone and idempotent.
#[derive(Clone)]
pub struct TerminateHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl TerminateHandle {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Request termination. Extra calls are no-ops.
    pub fn terminate(&self) {
        if !self.sender.send_replace(true) {
            info!("Termination requested");
        }
    }

    pub fn is_terminated(&self) -> bool {
        *self.sender.borrow()
    }

    async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        // the sender lives in self, so the channel cannot close while waiting
        let _ = receiver.wait_for(|terminated| *terminated).await;
    }

    fn rearm(&self) {
        self.sender.send_replace(false);
    }
}

impl Default for TerminateHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the lifecycle of an ordered service list
pub struct Orchestrator {
    services: Vec<Arc<dyn Service>>,
    inited: Mutex<Vec<Arc<dyn Service>>>,
    started: Mutex<Vec<Arc<dyn Service>>>,
    active: AtomicBool,
    verbose: AtomicBool,
    handle_signals: bool,
    terminate: TerminateHandle,
}

impl Orchestrator {
    /// Create an orchestrator with default settings
    pub fn new(services: Vec<Arc<dyn Service>>) -> Self {
        Self::with_config(services, &LifecycleConfig::default())
    }

    pub fn with_config(services: Vec<Arc<dyn Service>>, config: &LifecycleConfig) -> Self {
        Self::with_terminate_handle(services, config, TerminateHandle::new())
    }

    /// Create an orchestrator released by an existing handle
    pub fn with_terminate_handle(
        services: Vec<Arc<dyn Service>>,
        config: &LifecycleConfig,
        terminate: TerminateHandle,
    ) -> Self {
        Self {
            services,
            inited: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
            active: AtomicBool::new(false),
            verbose: AtomicBool::new(config.verbose),
            handle_signals: config.handle_signals,
            terminate,
        }
    }

    pub fn services(&self) -> &[Arc<dyn Service>] {
        &self.services
    }

    /// Set whether recovered panics are logged; returns the previous value
    pub fn set_verbose(&self, verbose: bool) -> bool {
        self.verbose.swap(verbose, Ordering::SeqCst)
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::SeqCst)
    }

    pub fn terminate_handle(&self) -> TerminateHandle {
        self.terminate.clone()
    }

    /// Release a blocked [`run`](Self::run); safe to call repeatedly
    pub fn terminate(&self) {
        self.terminate.terminate();
    }

    /// Names of services currently inited, in init order
    pub async fn inited_names(&self) -> Vec<String> {
        names(&self.inited.lock().await)
    }

    /// Names of services currently started, in start order
    pub async fn started_names(&self) -> Vec<String> {
        names(&self.started.lock().await)
    }

    /// Init every service in order, then start every service in order.
    ///
    /// Each phase stops at its first failure. Services already inited or
    /// started stay that way and are torn down by
    /// [`stop_and_finit`](Self::stop_and_finit).
    ///
    /// Calling this again before that teardown fails with
    /// [`Error::AlreadyInitialized`] and touches no service.
    pub async fn init_and_start(&self, ctx: Context) -> (Context, Result<()>) {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            error!("Services are already initialized, refusing to init again");
            return (ctx, Err(Error::AlreadyInitialized));
        }

        let verbose = self.is_verbose();
        info!("Initializing {} services...", self.services.len());

        let mut ctx = ctx;
        for (index, service) in self.services.iter().enumerate() {
            match init_service(index, service.as_ref(), &ctx, verbose).await {
                Ok(next) => {
                    info!(service = service.name(); "Service inited");
                    ctx = next;
                    self.inited.lock().await.push(service.clone());
                }
                Err(err) => {
                    // init ran to completion, so the service still needs finit
                    if matches!(err, Error::ContextDiscarded { .. }) {
                        self.inited.lock().await.push(service.clone());
                    }
                    return (ctx, Err(err));
                }
            }
        }

        info!("Starting {} services...", self.services.len());
        let outcome = start_services(ctx, &self.services, verbose).await;
        self.started.lock().await.extend(outcome.started);
        if outcome.result.is_ok() {
            info!("All services started");
        }
        (outcome.ctx, outcome.result)
    }

    /// Stop every started service concurrently, then finit every inited
    /// service in reverse order.
    pub async fn stop_and_finit(&self, ctx: &Context) {
        let verbose = self.is_verbose();

        let started = std::mem::take(&mut *self.started.lock().await);
        info!("Stopping {} services...", started.len());
        stop_services(ctx, &started, verbose).await;

        let inited = std::mem::take(&mut *self.inited.lock().await);
        info!("Finalizing {} services...", inited.len());
        finit_services(ctx, &inited, verbose).await;

        self.active.store(false, Ordering::SeqCst);
        info!("Graceful shutdown completed");
    }

    /// Start all services, block until terminated, then tear everything down.
    ///
    /// When startup fails the teardown happens right away and the startup
    /// error is returned. A termination request is consumed once `run` is
    /// released; one arriving during teardown stays pending and releases the
    /// next `run` as soon as its services have started.
    pub async fn run(&self, ctx: Context) -> Result<()> {
        let (ctx, result) = self.init_and_start(ctx).await;

        // another run owns the services
        if matches!(result, Err(Error::AlreadyInitialized)) {
            return result;
        }

        match &result {
            Ok(()) => {
                self.wait_for_termination().await;
                self.terminate.rearm();
            }
            Err(err) => warn!("Startup failed, shutting down: {err}"),
        }

        self.stop_and_finit(&ctx).await;
        result
    }

    async fn wait_for_termination(&self) {
        if self.handle_signals {
            tokio::select! {
                _ = self.terminate.wait() => {}
                _ = shutdown_signal() => info!("Shutdown signal received"),
            }
        } else {
            self.terminate.wait().await;
        }
        debug!("Run released");
    }
}

fn names(services: &[Arc<dyn Service>]) -> Vec<String> {
    services.iter().map(|s| s.name().to_string()).collect()
}

/// Resolves on Ctrl-C or, on unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
