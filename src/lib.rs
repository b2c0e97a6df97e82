//! Modula - a module runtime with lifecycle, wiring and refresh
//!
//! Modules are installed into a [`ModuleContainer`], resolved against each
//! other's capabilities, started and stopped, updated to new revisions, and
//! refreshed so stale wirings are replaced.
//!
//! # Quick Start
//!
//! ```
//! use modula::{namespace, Capability, ModuleContainer, ModuleRevisionBuilder, Requirement,
//!              StartOptions, State};
//!
//! let container = ModuleContainer::with_defaults()?;
//! let a = container.install(
//!     None,
//!     "file:a",
//!     ModuleRevisionBuilder::new()
//!         .symbolic_name("a")
//!         .capability(Capability::new(namespace::PACKAGE).with_attribute("pkg", "p")),
//! )?;
//! let b = container.install(
//!     None,
//!     "file:b",
//!     ModuleRevisionBuilder::new()
//!         .symbolic_name("b")
//!         .requirement(Requirement::new(namespace::PACKAGE).with_filter("pkg", "p")),
//! )?;
//!
//! b.start(StartOptions::new())?;
//! assert_eq!(a.state(), State::Resolved);
//! assert_eq!(b.state(), State::Active);
//! # Ok::<(), modula::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `modula-core`: value types, revisions, wiring graph, errors
//! - `modula-concurrency`: state-change locks and keyed lock sets
//! - `modula-engine`: database, container, resolver, hooks, config

pub use modula_concurrency::{LockError, LockSet, StateChangeLock};
pub use modula_core::{
    namespace, Capability, Error, EventSet, HookError, ModuleEvent, ModuleId, ModuleRevision,
    ModuleRevisionBuilder, ModuleWire, ModuleWiring, Requirement, Result, RevisionFlags,
    RevisionId, StartOptions, State, StopOptions, Version,
};
pub use modula_engine::{
    CapabilityResolver, CollisionHook, CollisionPhase, ContainerAdaptor, ContainerConfig,
    ContainerEvent, Database, DatabaseState, DefaultAdaptor, IdentityPolicy, Module,
    ModuleContainer, ModuleHooks, ModuleRevisions, NoopHooks, ResolutionDelta, Resolver,
    StateChangeGuard, WiringMap, CONFIG_FILE_NAME,
};
