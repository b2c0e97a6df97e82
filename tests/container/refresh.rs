//! Unresolve and Refresh Tests
//!
//! - Unresolving invalidates wires and wirings permanently
//! - Refresh restarts exactly the modules that were active
//! - Removal-pending revisions are discarded by a refresh
//! - Dependency closure follows requirers and fragment hosts

use crate::common::*;
use modula::{ContainerEvent, ModuleEvent, ModuleId, StartOptions, State, Version};
use std::sync::Arc;

fn ids(modules: &[Arc<modula::Module>]) -> Vec<ModuleId> {
    modules.iter().map(|m| m.id()).collect()
}

// ============================================================================
// Unresolve
// ============================================================================

#[test]
fn unresolve_invalidates_wires_and_new_resolve_creates_fresh_ones() {
    let h = Harness::new();
    let (a, b) = h.install_pair();
    h.container.resolve(&[b.clone()], true).unwrap();

    let b_rev = h.rev(&b);
    let b_wiring = h.container.wiring(b_rev).unwrap();
    let old_wire = b_wiring.required_wires(None)[0].clone();

    let stopped = h.container.unresolve(Some(&[a.clone()])).unwrap();
    assert!(stopped.is_empty(), "nothing was active");

    assert_eq!(a.state(), State::Installed);
    assert_eq!(b.state(), State::Installed);
    assert!(!old_wire.is_valid());
    assert!(!b_wiring.is_valid());
    assert!(h.container.wiring(b_rev).is_none());
    assert!(h.container.provider_wiring(&old_wire).is_none());
    assert_eq!(h.hooks().count(b.id(), ModuleEvent::Unresolved), 1);

    h.container.resolve(&[b.clone()], true).unwrap();
    let new_wire = h.container.wiring(b_rev).unwrap().required_wires(None)[0].clone();
    assert!(new_wire.is_valid());
    assert!(!Arc::ptr_eq(&old_wire, &new_wire));
    assert!(!old_wire.is_valid(), "invalidation is permanent");
}

#[test]
fn unresolve_of_requirer_leaves_provider_resolved() {
    let h = Harness::new();
    let (a, b) = h.install_pair();
    h.container.resolve(&[b.clone()], true).unwrap();
    let a_wiring = h.container.wiring(h.rev(&a)).unwrap();

    h.container.unresolve(Some(&[b.clone()])).unwrap();

    assert_eq!(a.state(), State::Resolved);
    assert_eq!(b.state(), State::Installed);
    assert!(a_wiring.is_valid());
    assert!(a_wiring.provided_wires(None).is_empty(), "dangling wire removed");
}

// ============================================================================
// Refresh
// ============================================================================

#[test]
fn refresh_restarts_previously_active_modules() {
    let h = Harness::new();
    let (a, b) = h.install_pair();
    b.start(StartOptions::new()).unwrap();
    let old_wire = h.container.wiring(h.rev(&b)).unwrap().required_wires(None)[0].clone();
    h.hooks().clear_events();

    let restarted = h.container.refresh(Some(&[a.clone()])).unwrap();

    assert_eq!(ids(&restarted), vec![b.id()]);
    assert_eq!(a.state(), State::Resolved);
    assert_eq!(b.state(), State::Active);
    assert!(!old_wire.is_valid());

    let new_wire = h.container.wiring(h.rev(&b)).unwrap().required_wires(None)[0].clone();
    assert!(new_wire.is_valid());
    assert_eq!(new_wire.provider(), h.rev(&a));

    assert_eq!(
        h.hooks().events_for(b.id()),
        vec![
            ModuleEvent::Stopping,
            ModuleEvent::Stopped,
            ModuleEvent::Unresolved,
            ModuleEvent::Resolved,
            ModuleEvent::Starting,
            ModuleEvent::Started,
        ]
    );
    assert_eq!(
        h.hooks().events_for(a.id()),
        vec![ModuleEvent::Unresolved, ModuleEvent::Resolved]
    );
    assert!(h
        .adaptor
        .container_events()
        .contains(&(ContainerEvent::Refresh, None)));
}

#[test]
fn refresh_of_inactive_provider_leaves_requirer_installed() {
    let h = Harness::new();
    let (a, b) = h.install_pair();
    h.container.resolve(&[b.clone()], true).unwrap();
    let old_wire = h.container.wiring(h.rev(&b)).unwrap().required_wires(None)[0].clone();

    let restarted = h.container.refresh(Some(&[a.clone()])).unwrap();

    assert!(restarted.is_empty());
    assert_eq!(a.state(), State::Installed);
    assert_eq!(b.state(), State::Installed);
    assert!(!old_wire.is_valid());
    assert!(h.container.wiring(h.rev(&b)).is_none());

    h.container.resolve(&[b.clone()], true).unwrap();
    let new_wire = h.container.wiring(h.rev(&b)).unwrap().required_wires(None)[0].clone();
    assert!(new_wire.is_valid());
    assert!(!Arc::ptr_eq(&old_wire, &new_wire));
}

#[test]
fn refresh_twice_has_same_effect_as_once() {
    let h = Harness::new();
    let (a, b) = h.install_pair();
    b.start(StartOptions::new()).unwrap();

    h.container.refresh(Some(&[a.clone()])).unwrap();
    h.hooks().clear_events();
    let restarted = h.container.refresh(Some(&[a.clone()])).unwrap();

    assert_eq!(ids(&restarted), vec![b.id()]);
    assert_eq!(h.hooks().count(a.id(), ModuleEvent::Unresolved), 1);
    assert_eq!(h.hooks().count(b.id(), ModuleEvent::Unresolved), 1);
    assert_eq!(a.state(), State::Resolved);
    assert_eq!(b.state(), State::Active);
}

#[test]
fn refresh_pending_discards_old_revisions() {
    let h = Harness::new();
    let (a, b) = h.install_pair();
    h.container.resolve(&[b.clone()], true).unwrap();
    let old = h.rev(&a);
    h.container
        .update(&a, provider("a", "p").version(Version::new(2, 0, 0)))
        .unwrap();
    assert_eq!(h.container.removal_pending().len(), 1);

    let restarted = h.container.refresh(None).unwrap();

    assert!(restarted.is_empty());
    assert!(h.container.removal_pending().is_empty());
    assert_eq!(h.hooks().cleaned(), vec![old]);
    assert_eq!(a.revisions().all().len(), 1);
    // Nothing was active, so nothing is resolved again
    assert_eq!(a.state(), State::Installed);
    assert_eq!(b.state(), State::Installed);

    h.container.resolve(&[b.clone()], true).unwrap();
    assert_eq!(a.state(), State::Resolved);
    let wires = h.container.wiring(h.rev(&b)).unwrap().required_wires(None);
    assert_eq!(wires[0].provider(), h.rev(&a), "rewired to the new revision");
}

#[test]
fn refresh_with_nothing_pending_keeps_timestamp() {
    let h = Harness::new();
    let (_, b) = h.install_pair();
    h.container.resolve(&[b.clone()], true).unwrap();
    let before = h.container.timestamp();

    assert!(h.container.refresh(None).unwrap().is_empty());
    assert!(h.container.unresolve(None).unwrap().is_empty());

    assert_eq!(h.container.timestamp(), before);
    assert_eq!(b.state(), State::Resolved);
}

#[test]
fn refresh_after_uninstall_drops_module_entirely() {
    let h = Harness::new();
    let (a, b) = h.install_pair();
    h.container.resolve(&[b.clone()], true).unwrap();
    let a_rev = h.rev(&a);

    h.container.uninstall(&a).unwrap();
    assert_eq!(a.state(), State::Uninstalled);
    assert!(h.container.module(a.id()).is_none());
    let pending: Vec<_> = h.container.removal_pending().iter().map(|r| r.id()).collect();
    assert_eq!(pending, vec![a_rev]);
    assert_eq!(b.state(), State::Resolved);

    h.container.refresh(None).unwrap();

    assert!(h.container.removal_pending().is_empty());
    assert_eq!(h.hooks().cleaned(), vec![a_rev]);
    assert!(a.revisions().all().is_empty());
    assert_eq!(a.state(), State::Uninstalled);
    assert_eq!(b.state(), State::Installed, "provider is gone");
}

#[test]
fn refresh_reports_restart_failure_as_container_error() {
    let h = Harness::new();
    let (a, b) = h.install_pair();
    b.start(StartOptions::new()).unwrap();
    h.hooks().fail_start(b.id());

    let restarted = h.container.refresh(Some(&[a.clone()])).unwrap();

    assert_eq!(ids(&restarted), vec![b.id()]);
    assert_eq!(b.state(), State::Resolved);
    let events = h.adaptor.container_events();
    assert!(events.contains(&(ContainerEvent::Error, Some(b.id()))));
    assert!(events.contains(&(ContainerEvent::Refresh, None)));
}

// ============================================================================
// Dependency closure
// ============================================================================

#[test]
fn dependency_closure_follows_requirers_only() {
    let h = Harness::new();
    let a = h.install("file:a", provider("a", "p"));
    let b = h.install("file:b", consumer("b", "p").capability(package("q")));
    let c = h.install("file:c", consumer("c", "q"));
    let other = h.install("file:x", plain("x"));
    c.start(StartOptions::new()).unwrap();

    let closure = h.container.dependency_closure(&[a.clone()]);
    assert_eq!(ids(&closure), vec![a.id(), b.id(), c.id()]);
    assert!(!ids(&closure).contains(&other.id()));

    let closure = h.container.dependency_closure(&[c.clone()]);
    assert_eq!(ids(&closure), vec![c.id()]);

    let revisions = h.container.revision_closure(&[a.current_revision().unwrap()]);
    assert_eq!(revisions.len(), 3);
}

#[test]
fn fragment_closure_includes_host() {
    let h = Harness::new();
    let host = h.install("file:host", plain("host"));
    let frag = h.install("file:frag", plain("frag").fragment_of("host"));

    h.container.resolve(&[frag.clone()], true).unwrap();
    assert_eq!(host.state(), State::Resolved);
    assert_eq!(frag.state(), State::Resolved);

    let closure = h.container.dependency_closure(&[frag.clone()]);
    assert_eq!(ids(&closure), vec![frag.id(), host.id()]);

    h.container.unresolve(Some(&[frag.clone()])).unwrap();
    assert_eq!(host.state(), State::Installed);
    assert_eq!(frag.state(), State::Installed);
}
