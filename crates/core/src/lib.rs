//! Core types for the modula module runtime
//!
//! This crate defines the foundational types used throughout the system:
//! - ModuleId / RevisionId: numeric identities
//! - Version, Capability, Requirement: revision declarations
//! - State / ModuleEvent / EventSet: the lifecycle vocabulary
//! - ModuleRevision / ModuleRevisionBuilder: immutable graph nodes and their description
//! - ModuleWiring / ModuleWire: the resolved wiring graph
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod revision;
pub mod state;
pub mod types;
pub mod wiring;

pub use error::{Error, HookError, Result};
pub use revision::{ModuleRevision, ModuleRevisionBuilder, RevisionFlags};
pub use state::{EventSet, ModuleEvent, StartOptions, State, StopOptions};
pub use types::{namespace, Capability, ModuleId, Requirement, RevisionId, Version};
pub use wiring::{ModuleWire, ModuleWiring};
