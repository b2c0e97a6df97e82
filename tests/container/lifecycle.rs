//! Start/Stop Lifecycle Tests
//!
//! - Event order for start and stop
//! - Activation failure rolls back to RESOLVED
//! - Lazy activation and lazy triggers
//! - Fragments cannot be started or stopped
//! - Nested transitions that are not allowed fail with a state-change error

use crate::common::*;
use modula::{Error, ModuleEvent, StartOptions, State, StopOptions};

#[test]
fn start_and_stop_fire_events_in_order() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a"));

    a.start(StartOptions::new()).unwrap();
    assert_eq!(a.state(), State::Active);
    a.stop(StopOptions::new()).unwrap();
    assert_eq!(a.state(), State::Resolved);

    assert_eq!(
        h.hooks().events_for(a.id()),
        vec![
            ModuleEvent::Installed,
            ModuleEvent::Resolved,
            ModuleEvent::Starting,
            ModuleEvent::Started,
            ModuleEvent::Stopping,
            ModuleEvent::Stopped,
        ]
    );
    assert_eq!(h.hooks().start_calls(), 1);
    assert_eq!(h.hooks().stop_calls(), 1);
    assert!(a.in_flight().is_empty());
}

#[test]
fn start_of_active_module_is_noop() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a"));
    a.start(StartOptions::new()).unwrap();
    a.start(StartOptions::new()).unwrap();

    assert_eq!(h.hooks().count(a.id(), ModuleEvent::Started), 1);
    assert_eq!(h.hooks().start_calls(), 1);
}

#[test]
fn stop_of_resolved_module_is_noop() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a"));
    h.container.resolve(&[a.clone()], true).unwrap();

    a.stop(StopOptions::new()).unwrap();
    assert_eq!(a.state(), State::Resolved);
    assert_eq!(h.hooks().stop_calls(), 0);
    assert_eq!(h.hooks().count(a.id(), ModuleEvent::Stopped), 0);
}

#[test]
fn persistent_options_are_recorded_transient_are_not() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a"));

    a.start(StartOptions::transient()).unwrap();
    a.stop(StopOptions::transient()).unwrap();
    assert!(h.hooks().persisted_starts().is_empty());
    assert!(h.hooks().persisted_stops().is_empty());

    a.start(StartOptions::new()).unwrap();
    a.stop(StopOptions::new()).unwrap();
    assert_eq!(h.hooks().persisted_starts(), vec![(a.id(), StartOptions::new())]);
    assert_eq!(h.hooks().persisted_stops(), vec![(a.id(), StopOptions::new())]);
}

// ============================================================================
// Activation failures
// ============================================================================

#[test]
fn activator_failure_rolls_back_to_resolved() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a"));
    h.hooks().fail_start(a.id());

    let err = a.start(StartOptions::new()).unwrap_err();
    match &err {
        Error::Activator { module, .. } => assert_eq!(*module, a.id()),
        other => panic!("Expected Activator error, got {:?}", other),
    }
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(a.state(), State::Resolved);
    assert_eq!(
        h.hooks().events_for(a.id()),
        vec![
            ModuleEvent::Installed,
            ModuleEvent::Resolved,
            ModuleEvent::Starting,
            ModuleEvent::Stopping,
            ModuleEvent::Stopped,
        ]
    );
    assert!(a.in_flight().is_empty());
}

#[test]
fn rollback_stopped_event_fires_after_unlock() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a"));
    h.hooks().fail_start(a.id());

    a.start(StartOptions::new()).unwrap_err();

    // STOPPED is delivered with no transition in flight, like a regular stop
    let seen = h.hooks().in_flight_when_fired(a.id(), ModuleEvent::Stopped);
    assert_eq!(seen.len(), 1);
    assert!(seen[0].is_empty(), "fired while holding {:?}", seen[0]);

    a.start(StartOptions::new()).unwrap_err();
    let seen = h.hooks().in_flight_when_fired(a.id(), ModuleEvent::Stopped);
    assert!(seen.iter().all(|set| set.is_empty()));
}

#[test]
fn deactivator_failure_still_ends_resolved() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a"));
    a.start(StartOptions::new()).unwrap();
    h.hooks().fail_stop(a.id());

    let err = a.stop(StopOptions::new()).unwrap_err();
    assert!(matches!(err, Error::Activator { .. }));
    assert_eq!(a.state(), State::Resolved);
    assert_eq!(h.hooks().count(a.id(), ModuleEvent::Stopped), 1);
}

// ============================================================================
// Lazy activation
// ============================================================================

#[test]
fn lazy_module_waits_for_trigger() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a").lazy_activation(true));

    a.start(StartOptions::new().with_activation_policy()).unwrap();
    assert_eq!(a.state(), State::LazyStarting);
    assert_eq!(h.hooks().start_calls(), 0);
    assert_eq!(h.hooks().count(a.id(), ModuleEvent::LazyActivation), 1);

    // Asking again while parked changes nothing
    a.start(StartOptions::new().with_activation_policy()).unwrap();
    assert_eq!(h.hooks().count(a.id(), ModuleEvent::LazyActivation), 1);

    a.start(StartOptions::lazy_trigger().with_activation_policy())
        .unwrap();
    assert_eq!(a.state(), State::Active);
    assert_eq!(h.hooks().start_calls(), 1);
    assert_eq!(h.hooks().count(a.id(), ModuleEvent::Started), 1);
}

#[test]
fn lazy_module_starts_eagerly_without_activation_policy() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a").lazy_activation(true));

    a.start(StartOptions::new()).unwrap();
    assert_eq!(a.state(), State::Active);
    assert_eq!(h.hooks().count(a.id(), ModuleEvent::LazyActivation), 0);
}

#[test]
fn stopping_lazy_starting_module_skips_deactivator() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a").lazy_activation(true));
    a.start(StartOptions::new().with_activation_policy()).unwrap();

    a.stop(StopOptions::new()).unwrap();
    assert_eq!(a.state(), State::Resolved);
    assert_eq!(h.hooks().stop_calls(), 0);
    assert_eq!(h.hooks().count(a.id(), ModuleEvent::Stopped), 1);
}

#[test]
fn persistent_lazy_trigger_is_rejected() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a").lazy_activation(true));
    let options = StartOptions {
        transient: false,
        ..StartOptions::lazy_trigger()
    };
    assert!(matches!(a.start(options), Err(Error::InvalidArgument(_))));
}

// ============================================================================
// Fragments and terminal state
// ============================================================================

#[test]
fn fragments_cannot_be_started_or_stopped() {
    let h = Harness::new();
    h.install("file:host", plain("host"));
    let frag = h.install("file:frag", plain("frag").fragment_of("host"));

    assert!(matches!(
        frag.start(StartOptions::new()),
        Err(Error::InvalidOperation(_))
    ));
    assert!(matches!(
        frag.stop(StopOptions::new()),
        Err(Error::InvalidOperation(_))
    ));
    assert_eq!(frag.state(), State::Installed);
}

#[test]
fn uninstalled_module_cannot_start_but_stop_is_noop() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a"));
    h.container.uninstall(&a).unwrap();

    assert!(matches!(
        a.start(StartOptions::new()),
        Err(Error::IllegalState(_))
    ));
    a.stop(StopOptions::new()).unwrap();
    assert_eq!(a.state(), State::Uninstalled);
}

// ============================================================================
// Nested transitions
// ============================================================================

#[test]
fn initiating_transition_cannot_nest_inside_another() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a"));
    let guard = a.lock_state_change(ModuleEvent::Started).unwrap();

    let err = h.container.update(&a, plain("a")).unwrap_err();
    assert!(err.is_state_change());
    let err = h.container.uninstall(&a).unwrap_err();
    assert!(err.is_state_change());
    let err = h.container.unresolve(Some(&[a.clone()])).unwrap_err();
    assert!(err.is_state_change());

    // Nothing leaked into the in-flight set
    assert_eq!(a.in_flight(), modula::EventSet::of(&[ModuleEvent::Started]));
    drop(guard);
    assert!(a.in_flight().is_empty());
    assert_eq!(a.state(), State::Installed);
}

#[test]
fn resolve_may_nest_inside_start() {
    let h = Harness::new();
    let a = h.install("file:a", plain("a"));
    let guard = a.lock_state_change(ModuleEvent::Started).unwrap();

    h.container.resolve(&[a.clone()], true).unwrap();
    assert_eq!(a.state(), State::Resolved);
    drop(guard);
}
