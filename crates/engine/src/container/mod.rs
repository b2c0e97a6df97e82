//! Module container
//!
//! The container is the entry point of the runtime. It owns the
//! [`Database`], the install locks and the adaptor, and implements the
//! operations that touch more than one module:
//! - lifecycle: install, update, uninstall
//! - wiring: resolve, unresolve, refresh, dependency closure
//!
//! Start and stop are on [`Module`] itself.
//!
//! # Lock order
//!
//! location lock → name lock → module state-change locks (ascending module
//! id) → database lock. Events are fired after every lock taken for the
//! operation has been released, except events of nested transitions.

mod lifecycle;
mod wiring;

use crate::closure;
use crate::config::ContainerConfig;
use crate::database::Database;
use crate::hooks::{ContainerAdaptor, DefaultAdaptor};
use crate::module::Module;
use modula_concurrency::LockSet;
use modula_core::{ModuleId, ModuleRevision, ModuleWire, ModuleWiring, Result, RevisionId};
use std::sync::{Arc, Weak};
use tracing::info;

/// The module container
pub struct ModuleContainer {
    adaptor: Arc<dyn ContainerAdaptor>,
    config: ContainerConfig,
    database: Database,
    location_locks: LockSet<String>,
    name_locks: LockSet<String>,
    this: Weak<ModuleContainer>,
}

impl std::fmt::Debug for ModuleContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContainer")
            .field("config", &self.config)
            .field("timestamp", &self.database.timestamp())
            .finish()
    }
}

impl ModuleContainer {
    /// Create a container
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](modula_core::Error::Config) if the config does not validate.
    pub fn new(adaptor: Arc<dyn ContainerAdaptor>, config: ContainerConfig) -> Result<Arc<Self>> {
        config.validate()?;
        info!(
            target: "modula::container",
            state_change_timeout_ms = config.state_change_timeout_ms,
            identity_lock_timeout_ms = config.identity_lock_timeout_ms,
            policy = ?config.identity_policy,
            "Creating module container"
        );
        Ok(Arc::new_cyclic(|this| ModuleContainer {
            adaptor,
            config,
            database: Database::new(),
            location_locks: LockSet::new(),
            name_locks: LockSet::new(),
            this: this.clone(),
        }))
    }

    /// Container with [`DefaultAdaptor`] and the default config
    pub fn with_defaults() -> Result<Arc<Self>> {
        Self::new(Arc::new(DefaultAdaptor::new()), ContainerConfig::default())
    }

    /// Active configuration
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Adaptor supplied at construction
    pub fn adaptor(&self) -> &Arc<dyn ContainerAdaptor> {
        &self.adaptor
    }

    /// Underlying database
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Database timestamp; increases with every committed mutation
    pub fn timestamp(&self) -> u64 {
        self.database.timestamp()
    }

    /// Installed module by id
    pub fn module(&self, id: ModuleId) -> Option<Arc<Module>> {
        self.database.read().module(id).cloned()
    }

    /// Installed module by location
    pub fn module_by_location(&self, location: &str) -> Option<Arc<Module>> {
        self.database.read().module_by_location(location).cloned()
    }

    /// All installed modules in id order
    pub fn modules(&self) -> Vec<Arc<Module>> {
        self.database.read().modules().cloned().collect()
    }

    /// Wiring of a revision, if it is resolved
    pub fn wiring(&self, revision: RevisionId) -> Option<Arc<ModuleWiring>> {
        self.database.read().wiring(revision).cloned()
    }

    /// Wiring at the provider end of a valid wire
    pub fn provider_wiring(&self, wire: &ModuleWire) -> Option<Arc<ModuleWiring>> {
        if !wire.is_valid() {
            return None;
        }
        self.wiring(wire.provider())
    }

    /// Wiring at the requirer end of a valid wire
    pub fn requirer_wiring(&self, wire: &ModuleWire) -> Option<Arc<ModuleWiring>> {
        if !wire.is_valid() {
            return None;
        }
        self.wiring(wire.requirer())
    }

    /// Non-current revisions that are still wired
    pub fn removal_pending(&self) -> Vec<Arc<ModuleRevision>> {
        self.database.read().removal_pending()
    }

    /// Modules that would be unresolved together with `initial`, seeds first
    pub fn dependency_closure(&self, initial: &[Arc<Module>]) -> Vec<Arc<Module>> {
        closure::dependency_closure(&self.database.read(), initial.iter().cloned())
    }

    /// Revision-level counterpart of [`dependency_closure`](Self::dependency_closure)
    pub fn revision_closure(&self, initial: &[Arc<ModuleRevision>]) -> Vec<Arc<ModuleRevision>> {
        closure::revision_closure(&self.database.read(), initial.iter().cloned())
    }
}
