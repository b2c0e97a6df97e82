//! Nested-transition validity table
//!
//! A module may have several transitions in flight at once on the same
//! thread (an update stops the module before replacing its revision, a start
//! resolves the module first). This table decides which nestings are legal.
//! It is pure data so it can be tested without any locking.
//!
//! | Requested | Allowed while in flight |
//! |-----------|-------------------------|
//! | STARTED, UPDATED, UNINSTALLED, UNRESOLVED | nothing |
//! | RESOLVED | ⊆ {STARTED} |
//! | STOPPED | ⊆ {UPDATED, UNRESOLVED, UNINSTALLED} |
//! | anything else | unrestricted |

use modula_core::{EventSet, ModuleEvent};

/// Nesting rule for one requested transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestingRule {
    /// Every in-flight transition must be a member of the given set
    Within(EventSet),
    /// No restriction
    Unrestricted,
}

const IDLE: EventSet = EventSet::empty();
const DURING_START: EventSet = EventSet::empty().with(ModuleEvent::Started);
const DURING_TEARDOWN: EventSet = EventSet::empty()
    .with(ModuleEvent::Updated)
    .with(ModuleEvent::Unresolved)
    .with(ModuleEvent::Uninstalled);

/// Look up the nesting rule for a requested transition
pub const fn nesting_rule(requested: ModuleEvent) -> NestingRule {
    match requested {
        ModuleEvent::Started
        | ModuleEvent::Updated
        | ModuleEvent::Uninstalled
        | ModuleEvent::Unresolved => NestingRule::Within(IDLE),
        ModuleEvent::Resolved => NestingRule::Within(DURING_START),
        ModuleEvent::Stopped => NestingRule::Within(DURING_TEARDOWN),
        _ => NestingRule::Unrestricted,
    }
}

/// Whether `requested` may start while `in_flight` transitions are running
pub fn can_nest(in_flight: EventSet, requested: ModuleEvent) -> bool {
    match nesting_rule(requested) {
        NestingRule::Within(allowed) => in_flight.is_subset(&allowed),
        NestingRule::Unrestricted => true,
    }
}
