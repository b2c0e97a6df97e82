//! Resolve, unresolve and refresh
//!
//! Both passes follow the same optimistic protocol: snapshot under the
//! database read lock, do the expensive work and take module locks without
//! it, then commit under the write lock only if the timestamp has not moved.
//! A moved timestamp releases everything and retries from scratch.

use super::ModuleContainer;
use crate::closure;
use crate::hooks::ContainerEvent;
use crate::module::{Module, StateChangeGuard};
use modula_core::{
    Error, ModuleEvent, ModuleId, ModuleRevision, ModuleWire, ModuleWiring, Result, RevisionId,
    State, StopOptions,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl ModuleContainer {
    /// Resolve the current revisions of `triggers`, plus whatever else the
    /// resolver can wire on the way
    ///
    /// Modules that become wired move from INSTALLED to RESOLVED and get a
    /// RESOLVED event once every lock is released.
    ///
    /// # Errors
    ///
    /// - [`Error::Resolve`] if `mandatory` and a trigger cannot be resolved
    /// - [`Error::StateChange`] if a module lock cannot be obtained
    pub fn resolve(&self, triggers: &[Arc<Module>], mandatory: bool) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if self.resolve0(triggers, mandatory)? {
                return Ok(());
            }
            debug!(target: "modula::resolve", attempt, "Database changed during resolve, retrying");
        }
    }

    fn resolve0(&self, triggers: &[Arc<Module>], mandatory: bool) -> Result<bool> {
        let (timestamp, snapshot, trigger_revisions, unresolved, owners) = {
            let db = self.database.read();
            let snapshot = db.wirings().clone();
            let trigger_revisions: Vec<Arc<ModuleRevision>> = triggers
                .iter()
                .filter_map(|m| m.current_revision())
                .filter(|r| !snapshot.contains_key(&r.id()))
                .collect();
            let mut unresolved = Vec::new();
            let mut owners: FxHashMap<RevisionId, Arc<Module>> = FxHashMap::default();
            for module in db.modules() {
                if let Some(revision) = module.current_revision() {
                    if !snapshot.contains_key(&revision.id()) {
                        owners.insert(revision.id(), Arc::clone(module));
                        unresolved.push(revision);
                    }
                }
            }
            (db.timestamp(), snapshot, trigger_revisions, unresolved, owners)
        };

        let delta = self.adaptor.resolver().resolve_delta(
            &trigger_revisions,
            mandatory,
            &unresolved,
            &snapshot,
            &self.database,
        )?;
        if delta.is_empty() {
            return Ok(true);
        }

        let mut entering: Vec<Arc<Module>> = Vec::new();
        for id in delta.keys().filter(|id| !snapshot.contains_key(id)) {
            let module = owners.get(id).ok_or_else(|| {
                Error::Resolve(format!("resolver produced a wiring for unknown revision {}", id))
            })?;
            entering.push(Arc::clone(module));
        }
        entering.sort_by_key(|m| m.id());

        let mut guards: Vec<StateChangeGuard<'_>> = Vec::with_capacity(entering.len());
        for module in &entering {
            guards.push(module.lock_state_change(ModuleEvent::Resolved)?);
        }

        {
            let mut db = self.database.write();
            if db.timestamp() != timestamp {
                return Ok(false);
            }
            for (id, wiring) in delta {
                // Merge into an existing wiring so its identity survives
                if let Some(existing) = db.wiring(id).cloned() {
                    existing.set_provided_wires(wiring.provided_wires(None));
                    existing.set_required_wires(wiring.required_wires(None));
                } else {
                    db.insert_wiring(Arc::new(wiring));
                }
            }
            db.increment_timestamp();
        }

        let mut resolved = Vec::with_capacity(entering.len());
        for module in &entering {
            if module.state() == State::Installed {
                module.set_state(State::Resolved);
                resolved.push(Arc::clone(module));
            }
        }
        drop(guards);

        info!(target: "modula::resolve", resolved = resolved.len(), "Committed resolution");
        for module in &resolved {
            module.fire_event(ModuleEvent::Resolved);
        }
        Ok(true)
    }

    /// Unresolve `initial` and its dependency closure
    ///
    /// With `None`, the modules owning removal-pending revisions are used.
    /// Active members are stopped first, non-current revisions are removed
    /// and every wiring of a member is invalidated. Returns the members that
    /// were active, so a refresh knows what to restart.
    ///
    /// # Errors
    ///
    /// - [`Error::StateChange`] if a module lock cannot be obtained
    /// - [`Error::IllegalState`] if a member is still active after being stopped
    pub fn unresolve(&self, initial: Option<&[Arc<Module>]>) -> Result<Vec<Arc<Module>>> {
        let mut stopped: FxHashSet<ModuleId> = FxHashSet::default();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if let Some(refreshed) = self.unresolve0(initial, &mut stopped)? {
                return Ok(refreshed);
            }
            debug!(target: "modula::resolve", attempt, "Database changed during unresolve, retrying");
        }
    }

    fn unresolve0(
        &self,
        initial: Option<&[Arc<Module>]>,
        stopped: &mut FxHashSet<ModuleId>,
    ) -> Result<Option<Vec<Arc<Module>>>> {
        let (timestamp, members, removed_revisions, removed_wirings, dangling) = {
            let db = self.database.read();
            let seeds: Vec<Arc<Module>> = match initial {
                Some(modules) => modules.to_vec(),
                None => db
                    .removal_pending()
                    .iter()
                    .filter_map(|r| db.owner(r.id()).cloned())
                    .collect(),
            };
            let members = closure::dependency_closure(&db, seeds);

            let mut removed_revisions: Vec<(Arc<Module>, Arc<ModuleRevision>)> = Vec::new();
            let mut removed_wirings: Vec<Arc<ModuleWiring>> = Vec::new();
            for module in &members {
                for revision in module.revisions().all() {
                    if !module.revisions().is_current(revision.id()) {
                        removed_revisions.push((Arc::clone(module), Arc::clone(&revision)));
                    }
                    if let Some(wiring) = db.wiring(revision.id()) {
                        removed_wirings.push(Arc::clone(wiring));
                    }
                }
            }

            // Wires from surviving providers into wirings about to be removed
            let mut dangling: FxHashMap<RevisionId, (Arc<ModuleWiring>, Vec<Arc<ModuleWire>>)> =
                FxHashMap::default();
            for wiring in &removed_wirings {
                for wire in wiring.required_wires(None) {
                    if let Some(provider) = db.wiring(wire.provider()) {
                        dangling
                            .entry(wire.provider())
                            .or_insert_with(|| (Arc::clone(provider), Vec::new()))
                            .1
                            .push(wire);
                    }
                }
            }
            (db.timestamp(), members, removed_revisions, removed_wirings, dangling)
        };

        let mut lock_order = members.clone();
        lock_order.sort_by_key(|m| m.id());
        let mut guards: Vec<StateChangeGuard<'_>> = Vec::with_capacity(lock_order.len());
        for module in &lock_order {
            guards.push(module.lock_state_change(ModuleEvent::Unresolved)?);
        }

        // Dependents were discovered after their providers; stop them first
        for module in members.iter().rev() {
            if module.state().is_active() {
                stopped.insert(module.id());
                if let Err(e) = module.stop(StopOptions::transient()) {
                    warn!(target: "modula::resolve", module = %module.id(), error = %e, "Stop failed during unresolve");
                    self.adaptor
                        .publish_container_event(ContainerEvent::Error, Some(module.as_ref()), Some(&e));
                }
            }
        }
        if let Some(module) = lock_order.iter().find(|m| m.state().is_active()) {
            return Err(Error::IllegalState(format!(
                "module {} is still active after being stopped",
                module.id()
            )));
        }

        {
            let mut db = self.database.write();
            if db.timestamp() != timestamp {
                return Ok(None);
            }
            for (provider, wires) in dangling.values() {
                provider.remove_provided_wires(wires);
                for wire in wires {
                    wire.invalidate();
                }
            }
            for (module, revision) in &removed_revisions {
                db.purge_revision(module, revision.id());
            }
            for wiring in &removed_wirings {
                db.remove_wiring(wiring.revision());
                for wire in wiring.provided_wires(None) {
                    wire.invalidate();
                }
                wiring.invalidate();
            }
            // An empty closure changes nothing; leave concurrent passes alone
            if !(dangling.is_empty() && removed_revisions.is_empty() && removed_wirings.is_empty()) {
                db.increment_timestamp();
            }
        }

        for (module, revision) in &removed_revisions {
            module.hooks().cleanup(module, revision);
        }

        let mut unresolved = Vec::new();
        for module in &lock_order {
            if module.state() == State::Resolved {
                module.set_state(State::Installed);
                unresolved.push(Arc::clone(module));
            }
        }
        drop(guards);

        info!(
            target: "modula::resolve",
            closure = members.len(),
            unresolved = unresolved.len(),
            removed_revisions = removed_revisions.len(),
            "Committed unresolve"
        );
        for module in &unresolved {
            module.fire_event(ModuleEvent::Unresolved);
        }

        Ok(Some(
            members
                .into_iter()
                .filter(|m| stopped.contains(&m.id()))
                .collect(),
        ))
    }

    /// Unresolve `initial` and its closure, resolve again and restart the
    /// modules that were active
    ///
    /// With `None`, refreshes the modules owning removal-pending revisions.
    /// Restart failures are published as container error events. Publishes
    /// [`ContainerEvent::Refresh`] when done and returns the restarted set.
    ///
    /// # Errors
    ///
    /// Any error from [`unresolve`](Self::unresolve) or [`resolve`](Self::resolve).
    pub fn refresh(&self, initial: Option<&[Arc<Module>]>) -> Result<Vec<Arc<Module>>> {
        let refreshed = self.unresolve(initial)?;
        self.resolve(&refreshed, false)?;
        for module in &refreshed {
            self.restart(module);
        }
        info!(target: "modula::container", restarted = refreshed.len(), "Refresh complete");
        self.adaptor
            .publish_container_event(ContainerEvent::Refresh, None, None);
        Ok(refreshed)
    }
}
