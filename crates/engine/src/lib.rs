//! Module container engine
//!
//! This crate orchestrates the lower layers:
//! - ModuleContainer: install, update, uninstall, resolve, unresolve, refresh
//! - Module: start/stop state machine and its state-change lock
//! - Database: modules, revisions and wirings behind one read/write lock
//! - Resolver: pluggable wiring computation, with a reference implementation
//! - Hooks: activation, persistence, collision and visibility callbacks
//! - Config: container settings loaded from `modula.toml`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod closure;
pub mod config;
pub mod container;
pub mod database;
pub mod hooks;
pub mod module;
pub mod resolver;
pub mod revisions;

pub use config::{ContainerConfig, IdentityPolicy, CONFIG_FILE_NAME};
pub use container::ModuleContainer;
pub use database::{Database, DatabaseState, WiringMap};
pub use hooks::{
    CollisionHook, CollisionPhase, ContainerAdaptor, ContainerEvent, DefaultAdaptor, ModuleHooks,
    NoopHooks,
};
pub use module::{Module, StateChangeGuard};
pub use resolver::{CapabilityResolver, ResolutionDelta, Resolver};
pub use revisions::ModuleRevisions;
