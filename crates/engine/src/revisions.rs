//! Revision history of one module
//!
//! Newest revision first. Mutation happens only through the database while
//! it holds its write lock, so a reader holding the database read lock sees
//! a history consistent with the wiring map.

use modula_core::{ModuleId, ModuleRevision, RevisionId};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Ordered revisions of a module plus its uninstalled flag
#[derive(Debug)]
pub struct ModuleRevisions {
    module: ModuleId,
    revisions: RwLock<Vec<Arc<ModuleRevision>>>,
    uninstalled: AtomicBool,
}

impl ModuleRevisions {
    pub(crate) fn new(module: ModuleId) -> Self {
        Self {
            module,
            revisions: RwLock::new(Vec::new()),
            uninstalled: AtomicBool::new(false),
        }
    }

    /// Owning module
    pub fn module_id(&self) -> ModuleId {
        self.module
    }

    /// Current revision; `None` once the module is uninstalled
    pub fn current(&self) -> Option<Arc<ModuleRevision>> {
        if self.is_uninstalled() {
            return None;
        }
        self.revisions.read().first().cloned()
    }

    /// All revisions still retained, newest first
    pub fn all(&self) -> Vec<Arc<ModuleRevision>> {
        self.revisions.read().clone()
    }

    /// Whether `revision` is the current revision
    pub fn is_current(&self, revision: RevisionId) -> bool {
        self.current().map_or(false, |r| r.id() == revision)
    }

    /// Whether the module has been uninstalled
    pub fn is_uninstalled(&self) -> bool {
        self.uninstalled.load(Ordering::Acquire)
    }

    pub(crate) fn add(&self, revision: Arc<ModuleRevision>) {
        self.revisions.write().insert(0, revision);
    }

    pub(crate) fn remove(&self, revision: RevisionId) -> bool {
        let mut revisions = self.revisions.write();
        let before = revisions.len();
        revisions.retain(|r| r.id() != revision);
        revisions.len() != before
    }

    pub(crate) fn uninstall(&self) {
        self.uninstalled.store(true, Ordering::Release);
    }
}
