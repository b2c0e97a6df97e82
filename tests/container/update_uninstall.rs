//! Update and Uninstall Tests

use crate::common::*;
use modula::{CollisionPhase, ContainerEvent, Error, ModuleEvent, StartOptions, State, Version};
use std::sync::Arc;

// ============================================================================
// Update
// ============================================================================

#[test]
fn update_of_active_module_stops_replaces_and_restarts() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a").version(Version::new(1, 0, 0)));
    a.start(StartOptions::new()).unwrap();
    let old = h.rev(&a);
    h.hooks().clear_events();

    h.container
        .update(&a, plain("a").version(Version::new(2, 0, 0)))
        .unwrap();

    assert_eq!(a.state(), State::Active);
    assert_ne!(h.rev(&a), old);
    assert_eq!(
        a.current_revision().unwrap().version(),
        &Version::new(2, 0, 0)
    );
    assert_eq!(
        h.hooks().events_for(a.id()),
        vec![
            ModuleEvent::Stopping,
            ModuleEvent::Stopped,
            ModuleEvent::Unresolved,
            ModuleEvent::Updated,
            ModuleEvent::Resolved,
            ModuleEvent::Starting,
            ModuleEvent::Started,
        ]
    );
}

#[test]
fn update_of_installed_module_only_fires_updated() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a"));
    h.hooks().clear_events();

    h.container.update(&a, plain("a")).unwrap();
    assert_eq!(a.state(), State::Installed);
    assert_eq!(h.hooks().events_for(a.id()), vec![ModuleEvent::Updated]);
    // The unwired previous revision is dropped right away
    assert_eq!(a.revisions().all().len(), 1);
    assert!(h.container.removal_pending().is_empty());
}

#[test]
fn update_worker_failure_keeps_prior_revision() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a"));
    a.start(StartOptions::new()).unwrap();
    let old = h.rev(&a);
    h.hooks().fail_update(a.id());

    let err = h
        .container
        .update(&a, plain("a").version(Version::new(2, 0, 0)))
        .unwrap_err();

    assert!(matches!(err, Error::UpdateFailed { .. }));
    assert_eq!(h.rev(&a), old);
    assert_eq!(h.hooks().count(a.id(), ModuleEvent::Updated), 0);
    // Stopped for the update and not restarted
    assert_eq!(a.state(), State::Resolved);
}

#[test]
fn update_into_taken_identity_is_rejected() {
    let h = Harness::new();
    h.install("file:x", plain("x"));
    let y = h.install("file:y", plain("y"));

    let err = h.container.update(&y, plain("x")).unwrap_err();
    assert!(matches!(err, Error::DuplicateIdentity { .. }));
    assert_eq!(y.current_revision().unwrap().symbolic_name(), Some("y"));

    // A module never collides with itself
    h.container.update(&y, plain("y")).unwrap();
}

#[test]
fn collision_hook_sees_updating_phase() {
    let h = Harness::new();
    let hook = Arc::new(AllowDuplicates::default());
    h.adaptor.set_collision_hook(hook.clone());
    h.install("file:x", plain("x"));
    let y = h.install("file:y", plain("y"));

    h.container.update(&y, plain("x")).unwrap();
    assert_eq!(*hook.phases.lock(), vec![CollisionPhase::Updating]);
    assert_eq!(*hook.targets.lock(), vec![Some(y.id())]);
}

#[test]
fn update_of_uninstalled_module_is_illegal() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a"));
    h.container.uninstall(&a).unwrap();
    assert!(matches!(
        h.container.update(&a, plain("a")),
        Err(Error::IllegalState(_))
    ));
}

// ============================================================================
// Uninstall
// ============================================================================

#[test]
fn uninstall_stops_active_module() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a"));
    a.start(StartOptions::new()).unwrap();
    h.hooks().clear_events();

    h.container.uninstall(&a).unwrap();

    assert_eq!(a.state(), State::Uninstalled);
    assert!(a.current_revision().is_none());
    assert!(h.container.module_by_location("file:a").is_none());
    assert_eq!(
        h.hooks().events_for(a.id()),
        vec![
            ModuleEvent::Stopping,
            ModuleEvent::Stopped,
            ModuleEvent::Uninstalled,
        ]
    );
    // The revision was resolved, so it waits for a refresh
    assert_eq!(h.container.removal_pending().len(), 1);
    h.container.refresh(None).unwrap();
    assert!(h.container.removal_pending().is_empty());
}

#[test]
fn uninstall_proceeds_when_stop_fails() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a"));
    a.start(StartOptions::new()).unwrap();
    h.hooks().fail_stop(a.id());

    h.container.uninstall(&a).unwrap();

    assert_eq!(a.state(), State::Uninstalled);
    assert!(h
        .adaptor
        .container_events()
        .contains(&(ContainerEvent::Error, Some(a.id()))));
}

#[test]
fn uninstall_twice_is_illegal() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a"));
    h.container.uninstall(&a).unwrap();
    assert!(matches!(
        h.container.uninstall(&a),
        Err(Error::IllegalState(_))
    ));
}

#[test]
fn uninstalled_unwired_module_leaves_nothing_behind() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a"));
    h.container.uninstall(&a).unwrap();

    assert!(a.revisions().all().is_empty());
    assert!(h.container.removal_pending().is_empty());
    assert!(h.container.modules().is_empty());

    // The location is free again and gets a new module
    let again = h.install("file:a", plain("a"));
    assert_ne!(again.id(), a.id());
}
