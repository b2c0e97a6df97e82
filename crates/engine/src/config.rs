//! Container configuration via `modula.toml`
//!
//! A container is created from a [`ContainerConfig`]. The config can be
//! built in code with the `with_*` setters or loaded from a TOML file.
//! Missing keys fall back to their defaults.

use modula_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file name used by [`ContainerConfig::write_default_if_missing`] callers.
pub const CONFIG_FILE_NAME: &str = "modula.toml";

/// How duplicate symbolic name + version pairs are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityPolicy {
    /// Duplicates are rejected unless the collision hook filters them out
    #[default]
    Managed,
    /// Duplicates are always rejected; the collision hook is not consulted
    Single,
    /// Duplicates are always allowed
    Multiple,
}

fn default_timeout_ms() -> u64 {
    5000
}

/// Container configuration loaded from `modula.toml`.
///
/// # Example
///
/// ```toml
/// # Milliseconds to wait for a module's state-change lock
/// state_change_timeout_ms = 5000
///
/// # Milliseconds to wait for an install location or symbolic name lock
/// identity_lock_timeout_ms = 5000
///
/// # "managed" (default), "single" or "multiple"
/// identity_policy = "managed"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Wait limit for a module's state-change lock, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub state_change_timeout_ms: u64,
    /// Wait limit for install/update location and name locks, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub identity_lock_timeout_ms: u64,
    /// Duplicate identity policy.
    #[serde(default)]
    pub identity_policy: IdentityPolicy,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            state_change_timeout_ms: default_timeout_ms(),
            identity_lock_timeout_ms: default_timeout_ms(),
            identity_policy: IdentityPolicy::default(),
        }
    }
}

impl ContainerConfig {
    /// Short timeouts so contention tests fail fast
    pub fn for_testing() -> Self {
        Self {
            state_change_timeout_ms: 250,
            identity_lock_timeout_ms: 250,
            identity_policy: IdentityPolicy::Managed,
        }
    }

    /// Set the state-change lock timeout
    ///
    /// Stored with millisecond granularity; see [`Self::with_identity_lock_timeout`].
    pub fn with_state_change_timeout(mut self, timeout: Duration) -> Self {
        self.state_change_timeout_ms = duration_to_ms(timeout);
        self
    }

    /// Set the location/name lock timeout
    ///
    /// Stored with millisecond granularity. A non-zero timeout below one
    /// millisecond rounds up to one; durations beyond `u64::MAX` milliseconds
    /// saturate.
    pub fn with_identity_lock_timeout(mut self, timeout: Duration) -> Self {
        self.identity_lock_timeout_ms = duration_to_ms(timeout);
        self
    }

    /// Set the duplicate identity policy
    pub fn with_identity_policy(mut self, policy: IdentityPolicy) -> Self {
        self.identity_policy = policy;
        self
    }

    /// State-change lock timeout as a `Duration`
    pub fn state_change_timeout(&self) -> Duration {
        Duration::from_millis(self.state_change_timeout_ms)
    }

    /// Location/name lock timeout as a `Duration`
    pub fn identity_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.identity_lock_timeout_ms)
    }

    /// Check the configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.state_change_timeout_ms == 0 {
            return Err(Error::Config(
                "state_change_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.identity_lock_timeout_ms == 0 {
            return Err(Error::Config(
                "identity_lock_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Modula container configuration
#
# Milliseconds to wait for a module's state-change lock (default: 5000)
state_change_timeout_ms = 5000

# Milliseconds to wait for an install location or symbolic name lock (default: 5000)
identity_lock_timeout_ms = 5000

# Duplicate symbolic name + version handling:
#   "managed"  = reject unless the collision hook filters the duplicate out
#   "single"   = always reject
#   "multiple" = always allow
identity_policy = "managed"
"#
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: ContainerConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

fn duration_to_ms(timeout: Duration) -> u64 {
    let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    if ms == 0 && !timeout.is_zero() {
        1
    } else {
        ms
    }
}
