//! Module database
//!
//! Owns every module, every retained revision and the wiring map, all behind
//! a single read/write lock. Each committed mutation increments a timestamp.
//! Resolve and unresolve passes snapshot under the read lock, work without
//! it, then commit under the write lock only if the timestamp is unchanged.
//!
//! Mutators are crate-private: the container is the only writer.

use crate::module::Module;
use modula_core::{
    Capability, ModuleId, ModuleRevision, ModuleWiring, Requirement, RevisionId, Version,
};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Revision id → wiring
pub type WiringMap = FxHashMap<RevisionId, Arc<ModuleWiring>>;

#[derive(Debug)]
struct RevisionEntry {
    revision: Arc<ModuleRevision>,
    module: Arc<Module>,
}

/// Shared database state; reach it through [`Database::read`]
#[derive(Debug, Default)]
pub struct DatabaseState {
    modules: BTreeMap<ModuleId, Arc<Module>>,
    locations: FxHashMap<String, ModuleId>,
    revisions: FxHashMap<RevisionId, RevisionEntry>,
    wirings: WiringMap,
    capabilities: FxHashMap<String, Vec<(RevisionId, Capability)>>,
    timestamp: u64,
}

/// Module database
#[derive(Debug)]
pub struct Database {
    state: RwLock<DatabaseState>,
    next_module_id: AtomicU64,
    next_revision_id: AtomicU64,
}

impl Database {
    /// Create an empty database at timestamp 0
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DatabaseState::default()),
            next_module_id: AtomicU64::new(1),
            next_revision_id: AtomicU64::new(1),
        }
    }

    /// Acquire the database read lock
    pub fn read(&self) -> RwLockReadGuard<'_, DatabaseState> {
        self.state.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, DatabaseState> {
        self.state.write()
    }

    /// Current timestamp
    pub fn timestamp(&self) -> u64 {
        self.state.read().timestamp
    }

    /// Consistent copy of the timestamp and wiring map
    pub fn snapshot(&self) -> (u64, WiringMap) {
        let state = self.state.read();
        (state.timestamp, state.wirings.clone())
    }

    pub(crate) fn next_module_id(&self) -> ModuleId {
        ModuleId::new(self.next_module_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn next_revision_id(&self) -> RevisionId {
        RevisionId::new(self.next_revision_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseState {
    /// Timestamp of the last committed mutation
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Installed module by id
    pub fn module(&self, id: ModuleId) -> Option<&Arc<Module>> {
        self.modules.get(&id)
    }

    /// Installed module by install location
    pub fn module_by_location(&self, location: &str) -> Option<&Arc<Module>> {
        self.locations.get(location).and_then(|id| self.modules.get(id))
    }

    /// Installed modules in id order
    pub fn modules(&self) -> impl Iterator<Item = &Arc<Module>> + '_ {
        self.modules.values()
    }

    /// Retained revision by id, current or removal pending
    pub fn revision(&self, id: RevisionId) -> Option<&Arc<ModuleRevision>> {
        self.revisions.get(&id).map(|e| &e.revision)
    }

    /// Module a retained revision belongs to (uninstalled modules included)
    pub fn owner(&self, id: RevisionId) -> Option<&Arc<Module>> {
        self.revisions.get(&id).map(|e| &e.module)
    }

    /// Full wiring map
    pub fn wirings(&self) -> &WiringMap {
        &self.wirings
    }

    /// Wiring of a revision
    pub fn wiring(&self, id: RevisionId) -> Option<&Arc<ModuleWiring>> {
        self.wirings.get(&id)
    }

    /// Capabilities of retained revisions matching `requirement`, in revision id order
    pub fn find_providers(
        &self,
        requirement: &Requirement,
    ) -> Vec<(Arc<ModuleRevision>, Capability)> {
        let Some(indexed) = self.capabilities.get(&requirement.namespace) else {
            return Vec::new();
        };
        let mut found: Vec<(Arc<ModuleRevision>, Capability)> = indexed
            .iter()
            .filter(|(_, cap)| requirement.matches(cap))
            .filter_map(|(id, cap)| self.revision(*id).map(|r| (Arc::clone(r), cap.clone())))
            .collect();
        found.sort_by_key(|(r, _)| r.id());
        found
    }

    /// Installed modules other than `exclude` whose current revision has this identity
    pub fn identity_collisions(
        &self,
        name: &str,
        version: &Version,
        exclude: Option<ModuleId>,
    ) -> Vec<Arc<Module>> {
        self.modules
            .values()
            .filter(|m| Some(m.id()) != exclude)
            .filter(|m| {
                m.current_revision()
                    .map_or(false, |r| r.same_identity(name, version))
            })
            .cloned()
            .collect()
    }

    /// Non-current revisions that are still wired, in revision id order
    pub fn removal_pending(&self) -> Vec<Arc<ModuleRevision>> {
        let mut pending: Vec<Arc<ModuleRevision>> = self
            .revisions
            .values()
            .filter(|e| !e.module.revisions().is_current(e.revision.id()))
            .filter(|e| self.wirings.contains_key(&e.revision.id()))
            .map(|e| Arc::clone(&e.revision))
            .collect();
        pending.sort_by_key(|r| r.id());
        pending
    }

    pub(crate) fn install(&mut self, module: Arc<Module>, revision: Arc<ModuleRevision>) {
        self.locations
            .insert(module.location().to_string(), module.id());
        self.modules.insert(module.id(), Arc::clone(&module));
        self.add_revision(module, revision);
        self.increment_timestamp();
    }

    pub(crate) fn update(&mut self, module: &Arc<Module>, revision: Arc<ModuleRevision>) {
        if let Some(previous) = module.current_revision() {
            if !self.wirings.contains_key(&previous.id()) {
                self.purge_revision(module, previous.id());
            }
        }
        self.add_revision(Arc::clone(module), revision);
        self.increment_timestamp();
    }

    pub(crate) fn uninstall(&mut self, module: &Arc<Module>) {
        self.modules.remove(&module.id());
        self.locations.remove(module.location());
        module.revisions().uninstall();
        for revision in module.revisions().all() {
            if !self.wirings.contains_key(&revision.id()) {
                self.purge_revision(module, revision.id());
            }
        }
        self.increment_timestamp();
    }

    pub(crate) fn insert_wiring(&mut self, wiring: Arc<ModuleWiring>) {
        self.wirings.insert(wiring.revision(), wiring);
    }

    pub(crate) fn remove_wiring(&mut self, id: RevisionId) -> Option<Arc<ModuleWiring>> {
        self.wirings.remove(&id)
    }

    /// Drop a revision from the module history, the capability index and the
    /// revision table
    pub(crate) fn purge_revision(&mut self, module: &Module, id: RevisionId) {
        module.revisions().remove(id);
        self.revisions.remove(&id);
        for entries in self.capabilities.values_mut() {
            entries.retain(|(rev, _)| *rev != id);
        }
        self.capabilities.retain(|_, entries| !entries.is_empty());
        trace!(target: "modula::container", module = %module.id(), revision = %id, "Purged revision");
    }

    pub(crate) fn increment_timestamp(&mut self) -> u64 {
        self.timestamp += 1;
        self.timestamp
    }

    fn add_revision(&mut self, module: Arc<Module>, revision: Arc<ModuleRevision>) {
        for cap in revision.capabilities(None) {
            self.capabilities
                .entry(cap.namespace.clone())
                .or_default()
                .push((revision.id(), cap.clone()));
        }
        module.revisions().add(Arc::clone(&revision));
        self.revisions
            .insert(revision.id(), RevisionEntry { revision, module });
    }
}
