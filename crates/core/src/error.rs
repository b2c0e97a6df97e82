//! Error types for the module runtime
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::state::ModuleEvent;
use crate::types::{ModuleId, Version};
use thiserror::Error;

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error produced by a pluggable hook (activator, deactivator, update worker)
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Error types for the module runtime
#[derive(Debug, Error)]
pub enum Error {
    /// A state-change lock could not be obtained in time, or the requested
    /// transition may not nest inside the transitions already in flight
    #[error("State change {event:?} failed for {subject}: {reason}")]
    StateChange {
        /// What was being locked, e.g. `module 4` or `location 'file:a'`
        subject: String,
        /// Transition that was requested
        event: ModuleEvent,
        /// Human-readable cause
        reason: String,
    },

    /// A mandatory trigger could not be resolved
    #[error("Resolution failed: {0}")]
    Resolve(String),

    /// An activation or deactivation hook failed
    #[error("Activator error in module {module}: {source}")]
    Activator {
        /// Module whose hook failed
        module: ModuleId,
        /// Error raised by the hook
        #[source]
        source: HookError,
    },

    /// The update worker rejected the new revision; the prior revision is kept
    #[error("Update of module {module} failed: {source}")]
    UpdateFailed {
        /// Module being updated
        module: ModuleId,
        /// Error raised by the update worker
        #[source]
        source: HookError,
    },

    /// Symbolic name + version already taken and not cleared by the collision hook
    #[error("Duplicate module identity: {name} {version}")]
    DuplicateIdentity {
        /// Symbolic name in conflict
        name: String,
        /// Version in conflict
        version: Version,
    },

    /// A hook filtered out the module the caller asked for
    #[error("Rejected by hook: {0}")]
    RejectedByHook(String),

    /// Operation is not allowed for this kind of module
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Caller passed an invalid argument combination
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Module is in a state that does not permit the operation, or an
    /// internal consistency check failed
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Configuration could not be read, parsed or validated
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error is a state-change lock failure
    pub fn is_state_change(&self) -> bool {
        matches!(self, Error::StateChange { .. })
    }
}
