//! Host-side wiring
//!
//! [`Bootstrap`] owns the declarations of a process together with the
//! service collection requirement, so a host can declare everything, resolve
//! once and hand the resulting service list to an [`Orchestrator`].

use std::sync::Arc;

use log::{error, info};

use super::lifecycle::{Orchestrator, TerminateHandle};
use crate::{
    config::LifecycleConfig,
    core::{
        container::Injector,
        context::Context,
        error::{Error, Result},
        registry::{Capability, Declarations},
        slot::CollectionSlot,
        traits::Service,
    },
};

/// Declarations plus the ordered service list they provide
pub struct Bootstrap {
    declarations: Declarations,
    services: CollectionSlot<Arc<dyn Service>>,
    config: LifecycleConfig,
    terminate: TerminateHandle,
}

impl Bootstrap {
    pub fn new() -> Self {
        Self::with_config(&LifecycleConfig::default())
    }

    pub fn with_config(config: &LifecycleConfig) -> Self {
        let services = CollectionSlot::new();
        let mut declarations = Declarations::new();
        declarations.require_collection(&services);
        Self {
            declarations,
            services,
            config: config.clone(),
            terminate: TerminateHandle::new(),
        }
    }

    /// Declarations of this host, for requirements and provisions of any kind
    pub fn declarations(&mut self) -> &mut Declarations {
        &mut self.declarations
    }

    /// Append a service to the service list
    pub fn provide_service<S: Service + 'static>(&mut self, service: S) {
        self.declarations
            .provide_element::<Arc<dyn Service>>(Arc::new(service));
    }

    /// Append a service built from other provisions
    pub fn provide_service_with<S, F>(
        &mut self,
        dependencies: impl IntoIterator<Item = Capability>,
        ctor: F,
    ) where
        S: Service + 'static,
        F: FnOnce(&Injector) -> Result<S> + Send + 'static,
    {
        self.declarations
            .provide_element_with::<Arc<dyn Service>, _>(dependencies, move |injector: &Injector| {
                ctor(injector).map(|service| Arc::new(service) as Arc<dyn Service>)
            });
    }

    /// Handle able to release [`run`](Self::run) from another task
    pub fn terminate_handle(&self) -> TerminateHandle {
        self.terminate.clone()
    }

    /// Resolve all declarations and build the orchestrator.
    ///
    /// Any resolution error fails the whole bootstrap with every error attached.
    pub fn resolve(self) -> Result<Orchestrator> {
        let Bootstrap {
            declarations,
            services,
            config,
            terminate,
        } = self;

        let errors = declarations.resolve_all();
        if !errors.is_empty() {
            for err in &errors {
                error!("{err}");
            }
            return Err(Error::Resolution(errors));
        }

        info!("Resolved {} services", services.len());
        Ok(Orchestrator::with_terminate_handle(
            services.to_vec(),
            &config,
            terminate,
        ))
    }

    /// Resolve, then run the services until terminated
    pub async fn run(self, ctx: Context) -> Result<()> {
        let orchestrator = self.resolve()?;
        orchestrator.run(ctx).await
    }
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::new()
    }
}
