//! Module revisions and the builder that describes them
//!
//! A revision is one version of a module's declarations. Revisions are
//! immutable once built; the database assigns their ids.

use crate::types::{namespace, Capability, ModuleId, Requirement, RevisionId, Version};
use serde::{Deserialize, Serialize};

/// Type flags of a revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RevisionFlags {
    /// Revision attaches to a host instead of running on its own
    pub fragment: bool,
    /// Revision declares a lazy activation policy
    pub lazy_activation: bool,
}

/// Description of a revision, produced by manifest parsing
///
/// The container consumes a builder at install and update time to
/// materialize a [`ModuleRevision`].
///
/// # Example
///
/// ```
/// use modula_core::revision::ModuleRevisionBuilder;
/// use modula_core::types::{namespace, Capability, Version};
///
/// let builder = ModuleRevisionBuilder::new()
///     .symbolic_name("org.example.a")
///     .version(Version::new(1, 0, 0))
///     .capability(Capability::new(namespace::PACKAGE).with_attribute("pkg", "p"));
/// assert_eq!(builder.get_symbolic_name(), Some("org.example.a"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleRevisionBuilder {
    symbolic_name: Option<String>,
    version: Version,
    flags: RevisionFlags,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
}

impl ModuleRevisionBuilder {
    /// Create an empty builder (unnamed, version 0.0.0)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the symbolic name
    pub fn symbolic_name(mut self, name: impl Into<String>) -> Self {
        self.symbolic_name = Some(name.into());
        self
    }

    /// Set the version
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Mark as a fragment of the host with the given symbolic name
    ///
    /// Adds the host requirement a resolver wires to the host's
    /// [`namespace::HOST`] capability.
    pub fn fragment_of(mut self, host: impl Into<String>) -> Self {
        self.flags.fragment = true;
        self.requirements
            .push(Requirement::new(namespace::HOST).with_filter("name", host));
        self
    }

    /// Declare a lazy activation policy
    pub fn lazy_activation(mut self, lazy: bool) -> Self {
        self.flags.lazy_activation = lazy;
        self
    }

    /// Add a capability
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Add a requirement
    pub fn requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Declared symbolic name, if any
    pub fn get_symbolic_name(&self) -> Option<&str> {
        self.symbolic_name.as_deref()
    }

    /// Declared version
    pub fn get_version(&self) -> &Version {
        &self.version
    }

    /// Declared type flags
    pub fn get_flags(&self) -> RevisionFlags {
        self.flags
    }

    /// Materialize a revision with the ids assigned by the database
    ///
    /// Named, non-fragment revisions also get an identity capability and a
    /// host capability so fragments can attach to them.
    pub fn build(&self, id: RevisionId, module: ModuleId) -> ModuleRevision {
        let mut capabilities = Vec::with_capacity(self.capabilities.len() + 2);
        if let Some(name) = &self.symbolic_name {
            capabilities.push(
                Capability::new(namespace::IDENTITY)
                    .with_attribute("name", name.clone())
                    .with_attribute("version", self.version.to_string()),
            );
            if !self.flags.fragment {
                capabilities.push(Capability::new(namespace::HOST).with_attribute("name", name.clone()));
            }
        }
        capabilities.extend(self.capabilities.iter().cloned());

        ModuleRevision {
            id,
            module,
            symbolic_name: self.symbolic_name.clone(),
            version: self.version.clone(),
            flags: self.flags,
            capabilities,
            requirements: self.requirements.clone(),
        }
    }
}

/// One version of a module's declared capabilities and requirements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRevision {
    id: RevisionId,
    module: ModuleId,
    symbolic_name: Option<String>,
    version: Version,
    flags: RevisionFlags,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
}

impl ModuleRevision {
    /// Revision id
    pub fn id(&self) -> RevisionId {
        self.id
    }

    /// Id of the owning module
    pub fn module_id(&self) -> ModuleId {
        self.module
    }

    /// Symbolic name, if declared
    pub fn symbolic_name(&self) -> Option<&str> {
        self.symbolic_name.as_deref()
    }

    /// Version
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Type flags
    pub fn flags(&self) -> RevisionFlags {
        self.flags
    }

    /// True for fragment revisions
    pub fn is_fragment(&self) -> bool {
        self.flags.fragment
    }

    /// Capabilities, optionally restricted to one namespace
    pub fn capabilities(&self, namespace: Option<&str>) -> Vec<&Capability> {
        self.capabilities
            .iter()
            .filter(|c| namespace.map_or(true, |ns| c.namespace == ns))
            .collect()
    }

    /// Requirements, optionally restricted to one namespace
    pub fn requirements(&self, namespace: Option<&str>) -> Vec<&Requirement> {
        self.requirements
            .iter()
            .filter(|r| namespace.map_or(true, |ns| r.namespace == ns))
            .collect()
    }

    /// Whether this revision has the same symbolic name and version
    pub fn same_identity(&self, name: &str, version: &Version) -> bool {
        self.symbolic_name.as_deref() == Some(name) && &self.version == version
    }
}
