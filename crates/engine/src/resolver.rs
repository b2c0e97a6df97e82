//! Resolver seam and the reference capability resolver
//!
//! The container never decides wiring itself. Each resolve pass hands a
//! [`Resolver`] the trigger revisions, the unresolved revisions and a
//! snapshot of the wiring map, and commits whatever delta comes back.
//!
//! A delta maps revision ids to wirings. Entries for revisions that are
//! already wired in the snapshot are merged into the existing wiring, so
//! they should carry that wiring's full wire lists plus the new wires.

use crate::database::{Database, WiringMap};
use modula_core::{
    Capability, Error, ModuleRevision, ModuleWire, ModuleWiring, Result, RevisionId,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::debug;

/// Wirings produced by one resolve pass
pub type ResolutionDelta = FxHashMap<RevisionId, ModuleWiring>;

/// Computes wirings for unresolved revisions
pub trait Resolver: Send + Sync {
    /// Resolve as many of `triggers` as possible
    ///
    /// Revisions in `unresolved` may be wired along the way when a trigger
    /// needs them as providers; unrelated ones are left alone. `snapshot` is
    /// the wiring map the delta will be merged into; the database may be
    /// read for capability lookups.
    ///
    /// # Errors
    ///
    /// With `mandatory`, an error if any trigger cannot be resolved.
    fn resolve_delta(
        &self,
        triggers: &[Arc<ModuleRevision>],
        mandatory: bool,
        unresolved: &[Arc<ModuleRevision>],
        snapshot: &WiringMap,
        database: &Database,
    ) -> Result<ResolutionDelta>;
}

type Choices = Vec<Vec<(RevisionId, Capability)>>;

/// Wires each requirement to the first matching capability
///
/// Candidates are the triggers plus any unresolved provider needed by a
/// candidate requirement that no wired provider satisfies. Iterates to a
/// fixed point: a candidate stays resolvable while every
/// mandatory requirement has a provider that is either already wired or
/// itself resolvable. Wired providers are preferred over new ones, then
/// lower revision ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct CapabilityResolver;

impl CapabilityResolver {
    /// Create the resolver
    pub fn new() -> Self {
        Self
    }
}

impl Resolver for CapabilityResolver {
    fn resolve_delta(
        &self,
        triggers: &[Arc<ModuleRevision>],
        mandatory: bool,
        unresolved: &[Arc<ModuleRevision>],
        snapshot: &WiringMap,
        database: &Database,
    ) -> Result<ResolutionDelta> {
        let available: FxHashMap<RevisionId, &Arc<ModuleRevision>> =
            unresolved.iter().map(|r| (r.id(), r)).collect();
        let mut pending: Vec<Arc<ModuleRevision>> = triggers
            .iter()
            .filter(|r| !snapshot.contains_key(&r.id()))
            .cloned()
            .collect();

        // Triggers plus the unresolved providers they transitively need
        let mut candidates: FxHashMap<RevisionId, Arc<ModuleRevision>> = FxHashMap::default();
        let mut choices: FxHashMap<RevisionId, Choices> = FxHashMap::default();
        {
            let db = database.read();
            while let Some(revision) = pending.pop() {
                let id = revision.id();
                if candidates.contains_key(&id) {
                    continue;
                }
                let per_requirement: Choices = revision
                    .requirements(None)
                    .into_iter()
                    .map(|req| {
                        db.find_providers(req)
                            .into_iter()
                            .filter(|(provider, _)| provider.id() != id)
                            .map(|(provider, cap)| (provider.id(), cap))
                            .collect()
                    })
                    .collect();
                for options in &per_requirement {
                    if options.iter().any(|(p, _)| snapshot.contains_key(p)) {
                        continue;
                    }
                    for (provider, _) in options {
                        if let Some(r) = available.get(provider) {
                            if !candidates.contains_key(provider) {
                                pending.push(Arc::clone(r));
                            }
                        }
                    }
                }
                choices.insert(id, per_requirement);
                candidates.insert(id, revision);
            }
        }

        let mut resolvable: FxHashSet<RevisionId> = candidates.keys().copied().collect();
        loop {
            let failing: Vec<RevisionId> = resolvable
                .iter()
                .copied()
                .filter(|id| {
                    candidates[id]
                        .requirements(None)
                        .into_iter()
                        .zip(&choices[id])
                        .any(|(req, options)| {
                            !req.optional
                                && !options.iter().any(|(p, _)| {
                                    snapshot.contains_key(p) || resolvable.contains(p)
                                })
                        })
                })
                .collect();
            if failing.is_empty() {
                break;
            }
            for id in failing {
                resolvable.remove(&id);
            }
        }

        if mandatory {
            if let Some(missing) = triggers
                .iter()
                .find(|t| candidates.contains_key(&t.id()) && !resolvable.contains(&t.id()))
            {
                return Err(Error::Resolve(format!(
                    "revision {} of module {} has unsatisfied requirements",
                    missing.id(),
                    missing.module_id()
                )));
            }
        }

        let mut ordered: Vec<RevisionId> = resolvable.iter().copied().collect();
        ordered.sort();

        let mut delta = ResolutionDelta::default();
        let mut provided: FxHashMap<RevisionId, Vec<Arc<ModuleWire>>> = FxHashMap::default();
        for id in &ordered {
            let mut required = Vec::new();
            for (req, options) in candidates[id].requirements(None).into_iter().zip(&choices[id]) {
                let choice = options
                    .iter()
                    .find(|(p, _)| snapshot.contains_key(p))
                    .or_else(|| options.iter().find(|(p, _)| resolvable.contains(p)));
                if let Some((provider, cap)) = choice {
                    let wire = Arc::new(ModuleWire::new(*provider, cap.clone(), *id, req.clone()));
                    provided.entry(*provider).or_default().push(Arc::clone(&wire));
                    required.push(wire);
                }
            }
            delta.insert(*id, ModuleWiring::new(*id, Vec::new(), required));
        }

        for (provider, wires) in provided {
            if let Some(wiring) = delta.get(&provider) {
                let mut all = wiring.provided_wires(None);
                all.extend(wires);
                wiring.set_provided_wires(all);
            } else if let Some(existing) = snapshot.get(&provider) {
                let mut all = existing.provided_wires(None);
                all.extend(wires);
                delta.insert(
                    provider,
                    ModuleWiring::new(provider, all, existing.required_wires(None)),
                );
            }
        }

        debug!(
            target: "modula::resolve",
            candidates = candidates.len(),
            resolved = ordered.len(),
            delta = delta.len(),
            "Computed resolution delta"
        );
        Ok(delta)
    }
}
