//! Dependency closure over the wiring graph
//!
//! The closure of a set of modules is everything that would have to be
//! unresolved alongside them:
//! - every module whose revision requires a capability provided by any
//!   revision of a member (current or removal pending)
//! - for a fragment member, its host
//!
//! Both walks are breadth first and visit each node once, so cycles in the
//! wiring graph terminate and the result is in discovery order.

use crate::database::DatabaseState;
use crate::module::Module;
use modula_core::{namespace, ModuleId, ModuleRevision, RevisionId};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::Arc;

struct Walk<K, T> {
    visited: FxHashSet<K>,
    order: Vec<T>,
    pending: VecDeque<T>,
}

impl<K: Eq + Hash, T: Clone> Walk<K, T> {
    fn new() -> Self {
        Self {
            visited: FxHashSet::default(),
            order: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    fn visit(&mut self, key: K, item: T) {
        if self.visited.insert(key) {
            self.order.push(item.clone());
            self.pending.push_back(item);
        }
    }
}

/// Module-level closure, seeds first
pub fn dependency_closure<I>(db: &DatabaseState, seeds: I) -> Vec<Arc<Module>>
where
    I: IntoIterator<Item = Arc<Module>>,
{
    let mut walk: Walk<ModuleId, Arc<Module>> = Walk::new();
    for module in seeds {
        walk.visit(module.id(), module);
    }

    while let Some(module) = walk.pending.pop_front() {
        for revision in module.revisions().all() {
            let Some(wiring) = db.wiring(revision.id()) else {
                continue;
            };
            for wire in wiring.provided_wires(None) {
                if let Some(requirer) = db.owner(wire.requirer()) {
                    walk.visit(requirer.id(), Arc::clone(requirer));
                }
            }
            if revision.is_fragment() {
                for wire in wiring.required_wires(Some(namespace::HOST)) {
                    if let Some(host) = db.owner(wire.provider()) {
                        walk.visit(host.id(), Arc::clone(host));
                    }
                }
            }
        }
    }
    walk.order
}

/// Revision-level closure, seeds first
///
/// Same rules as [`dependency_closure`], applied to individual revisions.
pub fn revision_closure<I>(db: &DatabaseState, seeds: I) -> Vec<Arc<ModuleRevision>>
where
    I: IntoIterator<Item = Arc<ModuleRevision>>,
{
    let mut walk: Walk<RevisionId, Arc<ModuleRevision>> = Walk::new();
    for revision in seeds {
        walk.visit(revision.id(), revision);
    }

    while let Some(revision) = walk.pending.pop_front() {
        let Some(wiring) = db.wiring(revision.id()) else {
            continue;
        };
        for wire in wiring.provided_wires(None) {
            if let Some(requirer) = db.revision(wire.requirer()) {
                walk.visit(requirer.id(), Arc::clone(requirer));
            }
        }
        if revision.is_fragment() {
            for wire in wiring.required_wires(Some(namespace::HOST)) {
                if let Some(host) = db.revision(wire.provider()) {
                    walk.visit(host.id(), Arc::clone(host));
                }
            }
        }
    }
    walk.order
}
