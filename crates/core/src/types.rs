//! Core types for the module runtime
//!
//! This module defines the foundational types:
//! - ModuleId / RevisionId: Numeric identities handed out by the database
//! - Version: Dotted `major.minor.micro[.qualifier]` module version
//! - Capability: A namespaced set of attributes a revision provides
//! - Requirement: A namespaced attribute filter a revision needs satisfied

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Well-known capability namespaces
pub mod namespace {
    /// Identity of a module (symbolic name + version)
    pub const IDENTITY: &str = "modula.identity";
    /// Exported packages
    pub const PACKAGE: &str = "modula.wiring.package";
    /// Host capability/requirement used to attach fragments
    pub const HOST: &str = "modula.wiring.host";
    /// Whole-module dependencies
    pub const MODULE: &str = "modula.wiring.module";
}

/// Unique numeric identifier of an installed module
///
/// Ids are allocated by the database in increasing order and never reused
/// for the lifetime of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId(u64);

impl ModuleId {
    /// Wrap a raw id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique numeric identifier of a module revision
///
/// Wires reference revisions by id rather than by pointer; the database
/// maps ids back to revisions and wirings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RevisionId(u64);

impl RevisionId {
    /// Wrap a raw id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Module version: `major.minor.micro[.qualifier]`
///
/// Ordering compares the numeric parts first, then the qualifier
/// lexicographically. Missing components parse as zero.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Version {
    /// Major component
    pub major: u32,
    /// Minor component
    pub minor: u32,
    /// Micro component
    pub micro: u32,
    /// Free-form qualifier (empty when absent)
    pub qualifier: String,
}

impl Version {
    /// The empty version `0.0.0`
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a version without qualifier
    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Version::empty());
        }
        let mut parts = s.splitn(4, '.');
        let mut numeric = [0u32; 3];
        for slot in numeric.iter_mut() {
            match parts.next() {
                Some(p) => {
                    *slot = p
                        .parse()
                        .map_err(|_| Error::InvalidArgument(format!("invalid version '{}'", s)))?;
                }
                None => break,
            }
        }
        let qualifier = parts.next().unwrap_or_default().to_string();
        Ok(Version {
            major: numeric[0],
            minor: numeric[1],
            micro: numeric[2],
            qualifier,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

/// A capability declared by a revision
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    /// Namespace the capability lives in (see [`namespace`])
    pub namespace: String,
    /// Attributes matched by requirement filters
    pub attributes: BTreeMap<String, String>,
}

impl Capability {
    /// Create a capability with no attributes
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute (builder pattern)
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Look up an attribute value
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// A requirement declared by a revision
///
/// The filter is a conjunction of attribute equalities. How requirements are
/// matched is ultimately the resolver's business; [`Requirement::matches`] is
/// the rule used by the reference resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    /// Namespace of the capabilities this requirement can match
    pub namespace: String,
    /// Attribute equalities a capability must satisfy
    pub filter: BTreeMap<String, String>,
    /// Optional requirements never block resolution
    pub optional: bool,
}

impl Requirement {
    /// Create a mandatory requirement with an empty filter
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            filter: BTreeMap::new(),
            optional: false,
        }
    }

    /// Add a filter attribute (builder pattern)
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }

    /// Mark the requirement optional (builder pattern)
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Check whether a capability satisfies this requirement
    pub fn matches(&self, capability: &Capability) -> bool {
        self.namespace == capability.namespace
            && self
                .filter
                .iter()
                .all(|(k, v)| capability.attribute(k) == Some(v.as_str()))
    }
}
