//! Installed module and its start/stop state machine
//!
//! A module is created by [`ModuleContainer::install`](crate::ModuleContainer::install)
//! and lives in the database until it is uninstalled and all of its
//! revisions have been refreshed away.
//!
//! # Locking
//!
//! Every lifecycle transition holds the module's [`StateChangeLock`] for its
//! event. Events are fired after the lock for that transition is released.

use crate::container::ModuleContainer;
use crate::hooks::ModuleHooks;
use crate::revisions::ModuleRevisions;
use modula_concurrency::{LockError, StateChangeLock};
use modula_core::{
    Error, EventSet, HookError, ModuleEvent, ModuleId, ModuleRevision, Result, StartOptions,
    State, StopOptions,
};
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// An installed module
pub struct Module {
    id: ModuleId,
    location: String,
    state: RwLock<State>,
    state_lock: StateChangeLock,
    revisions: ModuleRevisions,
    hooks: Arc<dyn ModuleHooks>,
    container: Weak<ModuleContainer>,
    this: Weak<Module>,
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("location", &self.location)
            .field("state", &self.state())
            .finish()
    }
}

impl Module {
    pub(crate) fn new(
        id: ModuleId,
        location: impl Into<String>,
        lock_timeout: Duration,
        hooks: Arc<dyn ModuleHooks>,
        container: Weak<ModuleContainer>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Module {
            id,
            location: location.into(),
            state: RwLock::new(State::Installed),
            state_lock: StateChangeLock::new(lock_timeout),
            revisions: ModuleRevisions::new(id),
            hooks,
            container,
            this: this.clone(),
        })
    }

    /// Module id, unique for the container's lifetime
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Install location
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Current lifecycle state
    pub fn state(&self) -> State {
        *self.state.read()
    }

    /// Revision history
    pub fn revisions(&self) -> &ModuleRevisions {
        &self.revisions
    }

    /// Current revision; `None` once uninstalled
    pub fn current_revision(&self) -> Option<Arc<ModuleRevision>> {
        self.revisions.current()
    }

    /// Whether the current revision is a fragment
    pub fn is_fragment(&self) -> bool {
        self.current_revision().map_or(false, |r| r.is_fragment())
    }

    /// Transitions currently in flight on this module
    pub fn in_flight(&self) -> EventSet {
        self.state_lock.in_flight()
    }

    pub(crate) fn hooks(&self) -> &dyn ModuleHooks {
        self.hooks.as_ref()
    }

    /// Acquire the state-change lock for `event`
    ///
    /// The returned guard releases the lock when dropped.
    ///
    /// # Errors
    ///
    /// [`Error::StateChange`] on timeout or if `event` may not nest inside the
    /// transitions this thread already has in flight.
    pub fn lock_state_change(&self, event: ModuleEvent) -> Result<StateChangeGuard<'_>> {
        self.state_lock
            .lock(event)
            .map_err(|e| self.state_change_error(event, e))?;
        Ok(StateChangeGuard {
            module: self,
            event,
        })
    }

    fn state_change_error(&self, event: ModuleEvent, err: LockError) -> Error {
        Error::StateChange {
            subject: format!("module {}", self.id),
            event,
            reason: err.to_string(),
        }
    }

    /// Set the lifecycle state; callers hold the state-change lock
    pub(crate) fn set_state(&self, state: State) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        debug!(target: "modula::module", module = %self.id, from = %previous, to = %state, "State changed");
    }

    pub(crate) fn fire_event(&self, event: ModuleEvent) {
        self.hooks.fire_event(self, event);
    }

    fn container(&self) -> Result<Arc<ModuleContainer>> {
        self.container
            .upgrade()
            .ok_or_else(|| Error::IllegalState("container has been dropped".to_string()))
    }

    fn arc(&self) -> Result<Arc<Module>> {
        self.this
            .upgrade()
            .ok_or_else(|| Error::IllegalState(format!("module {} has been dropped", self.id)))
    }

    /// Start the module
    ///
    /// Resolves the module first if needed. With `use_activation_policy` and a
    /// lazy revision the module is parked in LAZY_STARTING until started again
    /// with a lazy trigger.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidOperation`] for fragments
    /// - [`Error::InvalidArgument`] for a persistent lazy trigger
    /// - [`Error::IllegalState`] if the module is uninstalled
    /// - [`Error::Resolve`] if the module cannot be resolved
    /// - [`Error::Activator`] if the start worker fails; the module is back in RESOLVED
    /// - [`Error::StateChange`] if the lock cannot be obtained
    pub fn start(&self, options: StartOptions) -> Result<()> {
        if self.is_fragment() {
            return Err(Error::InvalidOperation(format!(
                "module {} is a fragment and cannot be started",
                self.id
            )));
        }
        if options.lazy_trigger && !options.transient {
            return Err(Error::InvalidArgument(
                "a lazy trigger start must be transient".to_string(),
            ));
        }
        let container = self.container()?;

        let guard = self.lock_state_change(ModuleEvent::Started)?;
        if self.state() == State::Uninstalled {
            return Err(Error::IllegalState(format!(
                "module {} is uninstalled",
                self.id
            )));
        }
        if !options.transient {
            self.hooks.persist_start_options(self, options);
        }
        if self.state() == State::Active {
            return Ok(());
        }
        if self.state() == State::Installed {
            container.resolve(&[self.arc()?], true)?;
            if self.state() == State::Installed {
                return Err(Error::Resolve(format!(
                    "module {} could not be resolved",
                    self.id
                )));
            }
        }

        let outcome = self.start_sequence(options);
        drop(guard);
        match outcome {
            Ok(event) => {
                if let Some(event) = event {
                    self.fire_event(event);
                }
                Ok(())
            }
            Err(source) => {
                self.fire_event(ModuleEvent::Stopped);
                Err(Error::Activator {
                    module: self.id,
                    source,
                })
            }
        }
    }

    /// Runs under the STARTED lock; a failed worker leaves the module
    /// RESOLVED with STOPPED still to be fired
    fn start_sequence(
        &self,
        options: StartOptions,
    ) -> std::result::Result<Option<ModuleEvent>, HookError> {
        if self.hooks.is_lazy_activate(self, options) {
            if self.state() == State::LazyStarting {
                return Ok(None);
            }
            self.set_state(State::LazyStarting);
            return Ok(Some(ModuleEvent::LazyActivation));
        }

        self.set_state(State::Starting);
        self.fire_event(ModuleEvent::Starting);
        if let Err(source) = self.hooks.start_worker(self) {
            warn!(target: "modula::module", module = %self.id, error = %source, "Start worker failed");
            self.set_state(State::Stopping);
            self.fire_event(ModuleEvent::Stopping);
            self.set_state(State::Resolved);
            return Err(source);
        }
        self.set_state(State::Active);
        info!(target: "modula::module", module = %self.id, "Module started");
        Ok(Some(ModuleEvent::Started))
    }

    /// Stop the module
    ///
    /// A no-op unless the module is STARTING, LAZY_STARTING or ACTIVE. The stop
    /// worker runs only for a module that was ACTIVE; the module ends in
    /// RESOLVED even if the worker fails.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidOperation`] for fragments
    /// - [`Error::Activator`] if the stop worker fails
    /// - [`Error::StateChange`] if the lock cannot be obtained
    pub fn stop(&self, options: StopOptions) -> Result<()> {
        if self.is_fragment() {
            return Err(Error::InvalidOperation(format!(
                "module {} is a fragment and cannot be stopped",
                self.id
            )));
        }

        let guard = self.lock_state_change(ModuleEvent::Stopped)?;
        if !options.transient {
            self.hooks.persist_stop_options(self, options);
        }
        let previous = self.state();
        if !previous.is_active() {
            return Ok(());
        }

        self.set_state(State::Stopping);
        self.fire_event(ModuleEvent::Stopping);
        let result = if previous == State::Active {
            self.hooks.stop_worker(self)
        } else {
            Ok(())
        };
        self.set_state(State::Resolved);
        drop(guard);

        self.fire_event(ModuleEvent::Stopped);
        match result {
            Ok(()) => {
                info!(target: "modula::module", module = %self.id, "Module stopped");
                Ok(())
            }
            Err(source) => Err(Error::Activator {
                module: self.id,
                source,
            }),
        }
    }
}

/// Holds a module's state-change lock for one event; releases on drop
#[must_use = "the state-change lock is released as soon as the guard is dropped"]
pub struct StateChangeGuard<'a> {
    module: &'a Module,
    event: ModuleEvent,
}

impl StateChangeGuard<'_> {
    /// Event this guard holds the lock for
    pub fn event(&self) -> ModuleEvent {
        self.event
    }
}

impl std::fmt::Debug for StateChangeGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateChangeGuard")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

impl Drop for StateChangeGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.module.state_lock.unlock(self.event) {
            warn!(target: "modula::module", module = %self.module.id, error = %e, "Failed to release state change lock");
        }
    }
}
