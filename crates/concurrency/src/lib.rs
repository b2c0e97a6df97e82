//! Locking primitives for the module runtime
//!
//! This crate implements the lock discipline the container builds on:
//! - transition: the pure nested-transition validity table
//! - StateChangeLock: per-module timed reentrant lock with an in-flight event set
//! - LockSet: per-key timed exclusive locks (install locations, symbolic names)
//!
//! The database-wide read/write lock lives with the database in the engine.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod lock_set;
pub mod state_lock;
pub mod transition;

pub use lock_set::{LockSet, LockSetGuard};
pub use state_lock::StateChangeLock;
pub use transition::{can_nest, nesting_rule, NestingRule};

use modula_core::{EventSet, ModuleEvent};
use std::time::Duration;

/// Lock acquisition and release failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// Lock was not obtained within the timeout
    #[error("timed out after {0:?} waiting for lock")]
    Timeout(Duration),

    /// Requested transition may not nest inside the transitions in flight
    #[error("{requested:?} cannot start while {in_flight:?} in flight")]
    InvalidNesting {
        /// Transition that was requested
        requested: ModuleEvent,
        /// Transitions already running on the owning thread
        in_flight: EventSet,
    },

    /// Calling thread does not hold the lock for this transition
    #[error("current thread does not hold the {0:?} state change lock")]
    NotOwner(ModuleEvent),
}
