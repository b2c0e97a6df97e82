//! Module lifecycle states, transition events and start/stop options
//!
//! ```text
//! INSTALLED → RESOLVED → {STARTING | LAZY_STARTING} → ACTIVE → STOPPING → RESOLVED
//!                                                 any state → UNINSTALLED (terminal)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    /// Installed but not resolved
    Installed,
    /// Current revision is wired
    Resolved,
    /// Waiting for a lazy activation trigger
    LazyStarting,
    /// Activation hook running
    Starting,
    /// Started
    Active,
    /// Deactivation hook running
    Stopping,
    /// Removed from the container; terminal
    Uninstalled,
}

impl State {
    /// Member of `ACTIVE_SET = {STARTING, LAZY_STARTING, ACTIVE, STOPPING}`
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            State::Starting | State::LazyStarting | State::Active | State::Stopping
        )
    }

    /// Member of `RESOLVED_SET = ACTIVE_SET ∪ {RESOLVED}`
    pub fn is_resolved(&self) -> bool {
        *self == State::Resolved || self.is_active()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Installed => "INSTALLED",
            State::Resolved => "RESOLVED",
            State::LazyStarting => "LAZY_STARTING",
            State::Starting => "STARTING",
            State::Active => "ACTIVE",
            State::Stopping => "STOPPING",
            State::Uninstalled => "UNINSTALLED",
        };
        f.write_str(s)
    }
}

/// Lifecycle transition event
///
/// Events double as the kinds of state-change locks a module can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleEvent {
    /// Module was installed
    Installed,
    /// Module entered LAZY_STARTING
    LazyActivation,
    /// Module was resolved
    Resolved,
    /// Module finished starting
    Started,
    /// Module is starting
    Starting,
    /// Module finished stopping
    Stopped,
    /// Module is stopping
    Stopping,
    /// Module was uninstalled
    Uninstalled,
    /// Module was unresolved
    Unresolved,
    /// Module was updated
    Updated,
}

impl ModuleEvent {
    /// All events, in declaration order
    pub const ALL: [ModuleEvent; 10] = [
        ModuleEvent::Installed,
        ModuleEvent::LazyActivation,
        ModuleEvent::Resolved,
        ModuleEvent::Started,
        ModuleEvent::Starting,
        ModuleEvent::Stopped,
        ModuleEvent::Stopping,
        ModuleEvent::Uninstalled,
        ModuleEvent::Unresolved,
        ModuleEvent::Updated,
    ];

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Compact set of [`ModuleEvent`]s
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventSet(u16);

impl EventSet {
    /// The empty set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build a set from a slice of events
    pub fn of(events: &[ModuleEvent]) -> Self {
        events.iter().fold(Self::empty(), |set, e| set.with(*e))
    }

    /// Copy of this set with `event` added
    pub const fn with(self, event: ModuleEvent) -> Self {
        Self(self.0 | event.bit())
    }

    /// Insert an event; returns false if it was already present
    pub fn insert(&mut self, event: ModuleEvent) -> bool {
        let present = self.contains(event);
        self.0 |= event.bit();
        !present
    }

    /// Remove an event; returns false if it was absent
    pub fn remove(&mut self, event: ModuleEvent) -> bool {
        let present = self.contains(event);
        self.0 &= !event.bit();
        present
    }

    /// Membership test
    pub const fn contains(&self, event: ModuleEvent) -> bool {
        self.0 & event.bit() != 0
    }

    /// True when no event is present
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// True when every member of `self` is also in `other`
    pub const fn is_subset(&self, other: &EventSet) -> bool {
        self.0 & !other.0 == 0
    }

    /// Iterate members in declaration order
    pub fn iter(&self) -> impl Iterator<Item = ModuleEvent> + '_ {
        ModuleEvent::ALL.into_iter().filter(|e| self.contains(*e))
    }
}

impl fmt::Debug for EventSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Options for module start requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StartOptions {
    /// Do not persist the autostart setting
    pub transient: bool,
    /// Honor the revision's declared activation policy (lazy activation)
    pub use_activation_policy: bool,
    /// Complete a pending lazy activation; must be transient
    pub lazy_trigger: bool,
}

impl StartOptions {
    /// Persistent eager start
    pub fn new() -> Self {
        Self::default()
    }

    /// Transient start, the form used by internal restarts
    pub fn transient() -> Self {
        Self {
            transient: true,
            ..Self::default()
        }
    }

    /// Transient lazy-activation trigger
    pub fn lazy_trigger() -> Self {
        Self {
            transient: true,
            lazy_trigger: true,
            ..Self::default()
        }
    }

    /// Honor the activation policy (builder pattern)
    pub fn with_activation_policy(mut self) -> Self {
        self.use_activation_policy = true;
        self
    }
}

/// Options for stop requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StopOptions {
    /// Do not persist the autostart setting
    pub transient: bool,
}

impl StopOptions {
    /// Persistent stop
    pub fn new() -> Self {
        Self::default()
    }

    /// Transient stop, the form used by update/uninstall/refresh
    pub fn transient() -> Self {
        Self { transient: true }
    }
}
