//! Resolved wiring graph: wirings (nodes) and wires (edges)
//!
//! Wires reference revisions by [`RevisionId`] instead of holding pointers to
//! the wirings on either end; the database resolves ids back to wirings.
//! Both wires and wirings carry a `valid` flag that is cleared exactly once
//! and never set again.

use crate::types::{Capability, Requirement, RevisionId};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A resolved edge from a requirer's requirement to a provider's capability
#[derive(Debug)]
pub struct ModuleWire {
    provider: RevisionId,
    requirer: RevisionId,
    capability: Capability,
    requirement: Requirement,
    valid: AtomicBool,
}

impl ModuleWire {
    /// Create a valid wire
    pub fn new(
        provider: RevisionId,
        capability: Capability,
        requirer: RevisionId,
        requirement: Requirement,
    ) -> Self {
        Self {
            provider,
            requirer,
            capability,
            requirement,
            valid: AtomicBool::new(true),
        }
    }

    /// Revision providing the capability
    pub fn provider(&self) -> RevisionId {
        self.provider
    }

    /// Revision declaring the requirement
    pub fn requirer(&self) -> RevisionId {
        self.requirer
    }

    /// Capability at the provider end
    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// Requirement at the requirer end
    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// False once [`invalidate`](Self::invalidate) has been called
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Permanently invalidate this wire
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

/// Resolved state of one revision
///
/// The wire lists are replaced in place when a later resolve augments the
/// wiring, so the wiring's identity survives resolves that add wires to it.
#[derive(Debug)]
pub struct ModuleWiring {
    revision: RevisionId,
    provided: RwLock<Vec<Arc<ModuleWire>>>,
    required: RwLock<Vec<Arc<ModuleWire>>>,
    valid: AtomicBool,
}

impl ModuleWiring {
    /// Create a valid wiring
    pub fn new(
        revision: RevisionId,
        provided: Vec<Arc<ModuleWire>>,
        required: Vec<Arc<ModuleWire>>,
    ) -> Self {
        Self {
            revision,
            provided: RwLock::new(provided),
            required: RwLock::new(required),
            valid: AtomicBool::new(true),
        }
    }

    /// Revision this wiring belongs to
    pub fn revision(&self) -> RevisionId {
        self.revision
    }

    /// Wires where this revision is the provider, optionally filtered by namespace
    pub fn provided_wires(&self, namespace: Option<&str>) -> Vec<Arc<ModuleWire>> {
        filter_wires(&self.provided.read(), namespace)
    }

    /// Wires where this revision is the requirer, optionally filtered by namespace
    pub fn required_wires(&self, namespace: Option<&str>) -> Vec<Arc<ModuleWire>> {
        filter_wires(&self.required.read(), namespace)
    }

    /// Replace the provided wire list
    pub fn set_provided_wires(&self, wires: Vec<Arc<ModuleWire>>) {
        *self.provided.write() = wires;
    }

    /// Replace the required wire list
    pub fn set_required_wires(&self, wires: Vec<Arc<ModuleWire>>) {
        *self.required.write() = wires;
    }

    /// Drop the given wires from the provided list (pointer identity)
    pub fn remove_provided_wires(&self, removed: &[Arc<ModuleWire>]) {
        self.provided
            .write()
            .retain(|w| !removed.iter().any(|r| Arc::ptr_eq(w, r)));
    }

    /// False once [`invalidate`](Self::invalidate) has been called
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Permanently invalidate this wiring
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

fn filter_wires(wires: &[Arc<ModuleWire>], namespace: Option<&str>) -> Vec<Arc<ModuleWire>> {
    wires
        .iter()
        .filter(|w| namespace.map_or(true, |ns| w.capability.namespace == ns))
        .cloned()
        .collect()
}
