//! Extension points supplied by the embedding framework
//!
//! - [`ModuleHooks`]: per-module activation, persistence and event callbacks
//! - [`ContainerAdaptor`]: container-wide services (resolver, collision hook,
//!   visibility filter, container events, hook factory)
//! - [`CollisionHook`]: decides which identity collisions are tolerated
//!
//! Every method has a default so embedders implement only what they need.

use crate::module::Module;
use crate::resolver::{CapabilityResolver, Resolver};
use modula_core::{
    Error, HookError, ModuleEvent, ModuleId, ModuleRevision, ModuleRevisionBuilder, StartOptions,
    StopOptions,
};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Per-module callbacks
///
/// Called while the module's state-change lock is held, except
/// [`fire_event`](Self::fire_event) which is called after it is released.
pub trait ModuleHooks: Send + Sync {
    /// Activate the module
    fn start_worker(&self, _module: &Module) -> Result<(), HookError> {
        Ok(())
    }

    /// Deactivate the module
    fn stop_worker(&self, _module: &Module) -> Result<(), HookError> {
        Ok(())
    }

    /// Prepare the module for a new revision; an error keeps the prior revision
    fn update_worker(
        &self,
        _module: &Module,
        _builder: &ModuleRevisionBuilder,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// Record persistent start options
    fn persist_start_options(&self, _module: &Module, _options: StartOptions) {}

    /// Record persistent stop options
    fn persist_stop_options(&self, _module: &Module, _options: StopOptions) {}

    /// Release resources held for a revision that was removed
    fn cleanup(&self, _module: &Module, _revision: &ModuleRevision) {}

    /// Whether a start request should park the module in LAZY_STARTING
    fn is_lazy_activate(&self, module: &Module, options: StartOptions) -> bool {
        options.use_activation_policy
            && !options.lazy_trigger
            && module
                .current_revision()
                .map_or(false, |r| r.flags().lazy_activation)
    }

    /// Lifecycle event notification
    fn fire_event(&self, _module: &Module, _event: ModuleEvent) {}
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl ModuleHooks for NoopHooks {}

/// Operation that detected an identity collision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPhase {
    /// A new module is being installed
    Installing,
    /// An existing module is being updated
    Updating,
}

/// Filters identity collisions
///
/// Candidates left in the list after filtering are treated as real
/// collisions and fail the install or update.
pub trait CollisionHook: Send + Sync {
    /// Remove candidates the new or updated module may coexist with
    fn filter_collisions(
        &self,
        phase: CollisionPhase,
        target: Option<&Module>,
        candidates: &mut Vec<Arc<Module>>,
    );
}

/// Container-wide notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerEvent {
    /// A refresh finished
    Refresh,
    /// The start level changed
    StartLevel,
    /// A failure was swallowed during teardown or restart
    Error,
    /// Something unusual but recoverable happened
    Warning,
    /// Informational message
    Info,
}

impl fmt::Display for ContainerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerEvent::Refresh => "REFRESH",
            ContainerEvent::StartLevel => "START_LEVEL",
            ContainerEvent::Error => "ERROR",
            ContainerEvent::Warning => "WARNING",
            ContainerEvent::Info => "INFO",
        };
        f.write_str(name)
    }
}

/// Container-wide services
pub trait ContainerAdaptor: Send + Sync {
    /// Resolver used by every resolve pass
    fn resolver(&self) -> Arc<dyn Resolver>;

    /// Collision hook consulted under [`IdentityPolicy::Managed`](crate::IdentityPolicy::Managed)
    fn collision_hook(&self) -> Option<Arc<dyn CollisionHook>> {
        None
    }

    /// Create the hooks for a newly installed module
    fn create_hooks(&self, _location: &str, _id: ModuleId) -> Arc<dyn ModuleHooks> {
        Arc::new(NoopHooks)
    }

    /// Remove modules `origin` may not see
    fn filter_visible(&self, _origin: &Module, _candidates: &mut Vec<Arc<Module>>) {}

    /// Container event notification; the default logs it
    fn publish_container_event(
        &self,
        event: ContainerEvent,
        module: Option<&Module>,
        error: Option<&Error>,
    ) {
        let module = module.map(|m| m.id());
        match (event, error) {
            (ContainerEvent::Error, Some(e)) => {
                error!(target: "modula::container", %event, ?module, error = %e, "Container event")
            }
            (ContainerEvent::Warning, _) | (_, Some(_)) => {
                warn!(target: "modula::container", %event, ?module, error = ?error.map(|e| e.to_string()), "Container event")
            }
            _ => info!(target: "modula::container", %event, ?module, "Container event"),
        }
    }
}

/// Adaptor with a configurable resolver and collision hook and no other behaviour
pub struct DefaultAdaptor {
    resolver: Arc<dyn Resolver>,
    collision_hook: Option<Arc<dyn CollisionHook>>,
}

impl DefaultAdaptor {
    /// Adaptor using [`CapabilityResolver`] and no collision hook
    pub fn new() -> Self {
        Self {
            resolver: Arc::new(CapabilityResolver::new()),
            collision_hook: None,
        }
    }

    /// Replace the resolver
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Install a collision hook
    pub fn with_collision_hook(mut self, hook: Arc<dyn CollisionHook>) -> Self {
        self.collision_hook = Some(hook);
        self
    }
}

impl Default for DefaultAdaptor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerAdaptor for DefaultAdaptor {
    fn resolver(&self) -> Arc<dyn Resolver> {
        Arc::clone(&self.resolver)
    }

    fn collision_hook(&self) -> Option<Arc<dyn CollisionHook>> {
        self.collision_hook.clone()
    }
}
