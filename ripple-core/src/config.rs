//! Runtime configuration.
//!
//! Configuration is per thread, like the rest of the runtime state. Install it
//! with [`crate::scheduler::configure`] before mounting anything.

use serde::Deserialize;

use crate::error::Result;

/// Default cap on how many times one job may run within a single flush.
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

/// Tunables for the scheduler and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Maximum number of times a single job may run during one flush before
    /// the scheduler gives up on it.
    pub recursion_limit: usize,

    /// Emit `tracing` warnings for misuse such as writing a readonly prop.
    pub warn_misuse: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            warn_misuse: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }
}
