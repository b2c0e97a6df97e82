//! Install, update and uninstall

use super::ModuleContainer;
use crate::config::IdentityPolicy;
use crate::database::DatabaseState;
use crate::hooks::{CollisionPhase, ContainerEvent};
use crate::module::Module;
use modula_concurrency::{LockError, LockSetGuard};
use modula_core::{
    Error, ModuleEvent, ModuleRevisionBuilder, Result, StartOptions, State, StopOptions, Version,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl ModuleContainer {
    /// Install a module at `location`
    ///
    /// Installing at a location that is already in use returns the existing
    /// module without firing any event, provided `origin` can see it.
    ///
    /// # Arguments
    ///
    /// * `origin` - module on whose behalf the install happens, used for visibility
    ///   and handed to the collision hook
    /// * `location` - install location, unique per module
    /// * `builder` - description of the first revision
    ///
    /// # Errors
    ///
    /// - [`Error::StateChange`] if the location or name lock times out
    /// - [`Error::RejectedByHook`] if the existing module is hidden from `origin`
    /// - [`Error::DuplicateIdentity`] if the symbolic name and version are taken
    pub fn install(
        &self,
        origin: Option<&Module>,
        location: &str,
        builder: ModuleRevisionBuilder,
    ) -> Result<Arc<Module>> {
        let location_guard = self.lock_location(location)?;
        let name_guard = self.lock_name(builder.get_symbolic_name(), ModuleEvent::Installed)?;

        let (existing, collisions) = {
            let db = self.database.read();
            match db.module_by_location(location) {
                Some(existing) => (Some(Arc::clone(existing)), Vec::new()),
                None => (None, self.collision_candidates(&db, &builder, None)),
            }
        };

        if let Some(existing) = existing {
            if let Some(origin) = origin {
                let mut visible = vec![Arc::clone(&existing)];
                self.adaptor.filter_visible(origin, &mut visible);
                if visible.is_empty() {
                    return Err(Error::RejectedByHook(format!(
                        "module at '{}' is not visible to module {}",
                        location,
                        origin.id()
                    )));
                }
            }
            debug!(target: "modula::container", location, module = %existing.id(), "Location already installed");
            return Ok(existing);
        }

        // The hook filters from the installing module's point of view
        self.check_collisions(CollisionPhase::Installing, origin, &builder, collisions)?;

        let id = self.database.next_module_id();
        let module = Module::new(
            id,
            location,
            self.config.state_change_timeout(),
            self.adaptor.create_hooks(location, id),
            self.this.clone(),
        );
        let revision = Arc::new(builder.build(self.database.next_revision_id(), id));
        self.database.write().install(Arc::clone(&module), revision);
        info!(target: "modula::container", module = %id, location, name = ?builder.get_symbolic_name(), "Installed module");

        drop(name_guard);
        drop(location_guard);
        module.fire_event(ModuleEvent::Installed);
        Ok(module)
    }

    /// Replace the current revision of `module`
    ///
    /// An active module is stopped first and restarted afterwards; a
    /// failed restart is reported as a container error event, not returned.
    ///
    /// # Errors
    ///
    /// - [`Error::StateChange`] if a lock times out or the transition may not nest
    /// - [`Error::IllegalState`] if the module is uninstalled
    /// - [`Error::DuplicateIdentity`] if the new identity is taken
    /// - [`Error::Activator`] if stopping the module fails
    /// - [`Error::UpdateFailed`] if the update worker fails; the prior revision is kept
    pub fn update(&self, module: &Arc<Module>, builder: ModuleRevisionBuilder) -> Result<()> {
        let name_guard = self.lock_name(builder.get_symbolic_name(), ModuleEvent::Updated)?;
        let collisions = {
            let db = self.database.read();
            self.collision_candidates(&db, &builder, Some(module.as_ref()))
        };
        self.check_collisions(
            CollisionPhase::Updating,
            Some(module.as_ref()),
            &builder,
            collisions,
        )?;

        let guard = module.lock_state_change(ModuleEvent::Updated)?;
        let previous = module.state();
        if previous == State::Uninstalled {
            return Err(Error::IllegalState(format!(
                "module {} is uninstalled",
                module.id()
            )));
        }

        let mut events = Vec::new();
        let result = self.update0(module, &builder, previous, &mut events);
        drop(guard);
        drop(name_guard);
        for event in events {
            module.fire_event(event);
        }

        if result.is_ok() && previous.is_active() {
            self.restart(module);
        }
        result
    }

    fn update0(
        &self,
        module: &Arc<Module>,
        builder: &ModuleRevisionBuilder,
        previous: State,
        events: &mut Vec<ModuleEvent>,
    ) -> Result<()> {
        if previous.is_active() {
            module.stop(StopOptions::transient())?;
        }
        module
            .hooks()
            .update_worker(module, builder)
            .map_err(|source| Error::UpdateFailed {
                module: module.id(),
                source,
            })?;

        if module.state().is_resolved() {
            module.set_state(State::Installed);
            events.push(ModuleEvent::Unresolved);
        }
        let revision = Arc::new(builder.build(self.database.next_revision_id(), module.id()));
        self.database.write().update(module, revision);
        events.push(ModuleEvent::Updated);
        info!(target: "modula::container", module = %module.id(), name = ?builder.get_symbolic_name(), "Updated module");
        Ok(())
    }

    /// Uninstall `module`
    ///
    /// An active module is stopped first; a failing stop is reported as a
    /// container error event and the uninstall proceeds. Wired revisions stay
    /// in the database as removal pending until the next refresh.
    ///
    /// # Errors
    ///
    /// - [`Error::StateChange`] if the lock times out or the transition may not nest
    /// - [`Error::IllegalState`] if the module is already uninstalled
    pub fn uninstall(&self, module: &Arc<Module>) -> Result<()> {
        let guard = module.lock_state_change(ModuleEvent::Uninstalled)?;
        if module.state() == State::Uninstalled {
            return Err(Error::IllegalState(format!(
                "module {} is already uninstalled",
                module.id()
            )));
        }

        if module.state().is_active() {
            if let Err(e) = module.stop(StopOptions::transient()) {
                warn!(target: "modula::container", module = %module.id(), error = %e, "Stop failed during uninstall");
                self.adaptor
                    .publish_container_event(ContainerEvent::Error, Some(module.as_ref()), Some(&e));
            }
        }

        self.database.write().uninstall(module);
        module.set_state(State::Uninstalled);
        info!(target: "modula::container", module = %module.id(), location = module.location(), "Uninstalled module");
        drop(guard);

        module.fire_event(ModuleEvent::Uninstalled);
        Ok(())
    }

    /// Best-effort transient restart after an update or refresh
    pub(super) fn restart(&self, module: &Arc<Module>) {
        if let Err(e) = module.start(StartOptions::transient().with_activation_policy()) {
            warn!(target: "modula::container", module = %module.id(), error = %e, "Restart failed");
            self.adaptor
                .publish_container_event(ContainerEvent::Error, Some(module.as_ref()), Some(&e));
        }
    }

    fn lock_location(&self, location: &str) -> Result<LockSetGuard<'_, String>> {
        self.location_locks
            .try_lock(location.to_string(), self.config.identity_lock_timeout())
            .map_err(|e| identity_lock_error(format!("location '{}'", location), ModuleEvent::Installed, e))
    }

    fn lock_name(
        &self,
        name: Option<&str>,
        event: ModuleEvent,
    ) -> Result<Option<LockSetGuard<'_, String>>> {
        let Some(name) = name else {
            return Ok(None);
        };
        self.name_locks
            .try_lock(name.to_string(), self.config.identity_lock_timeout())
            .map(Some)
            .map_err(|e| identity_lock_error(format!("name '{}'", name), event, e))
    }

    fn collision_candidates(
        &self,
        db: &DatabaseState,
        builder: &ModuleRevisionBuilder,
        exclude: Option<&Module>,
    ) -> Vec<Arc<Module>> {
        if self.config.identity_policy == IdentityPolicy::Multiple {
            return Vec::new();
        }
        match builder.get_symbolic_name() {
            Some(name) => {
                db.identity_collisions(name, builder.get_version(), exclude.map(|m| m.id()))
            }
            None => Vec::new(),
        }
    }

    fn check_collisions(
        &self,
        phase: CollisionPhase,
        target: Option<&Module>,
        builder: &ModuleRevisionBuilder,
        mut candidates: Vec<Arc<Module>>,
    ) -> Result<()> {
        if candidates.is_empty() {
            return Ok(());
        }
        if self.config.identity_policy == IdentityPolicy::Managed {
            if let Some(hook) = self.adaptor.collision_hook() {
                hook.filter_collisions(phase, target, &mut candidates);
            }
        }
        if candidates.is_empty() {
            return Ok(());
        }
        let name = builder.get_symbolic_name().unwrap_or_default().to_string();
        let version: Version = builder.get_version().clone();
        debug!(target: "modula::container", ?phase, %name, %version, collisions = candidates.len(), "Identity collision");
        Err(Error::DuplicateIdentity { name, version })
    }
}

fn identity_lock_error(subject: String, event: ModuleEvent, err: LockError) -> Error {
    Error::StateChange {
        subject,
        event,
        reason: err.to_string(),
    }
}
