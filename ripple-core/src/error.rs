//! Error types for the Ripple runtime.
//!
//! Most of the runtime never fails: tracking, triggering and reconciliation are
//! deterministic functions of their inputs. The variants here cover caller
//! misuse (reported as non-fatal diagnostics) and the few renderer paths that
//! depend on the host.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Only records and lists can be made reactive.
    #[error("cannot make a {kind} value reactive; only records and lists can be observed")]
    NotStructured { kind: &'static str },

    /// A declared prop was written through the public instance.
    #[error("attempted to write declared prop `{key}`; props are readonly inside a component")]
    ReadonlyProp { key: String },

    /// A list was addressed with a field that is neither an index nor `length`.
    #[error("lists only support integer indices and `length`, got `{key}`")]
    InvalidListKey { key: String },

    /// A lifecycle hook or injection was used outside of a component setup.
    #[error("`{api}` called without an active component instance")]
    NoActiveInstance { api: &'static str },

    /// The host could not resolve a teleport target.
    #[error("teleport target `{selector}` not found")]
    TeleportTargetMissing { selector: String },

    /// A job kept re-queueing itself within a single flush.
    #[error("maximum recursive updates exceeded ({limit}) for job {job}")]
    RecursionLimit { job: u64, limit: usize },

    /// Runtime configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Report a misuse diagnostic.
///
/// Misuse never aborts the caller; the offending operation degrades to a
/// no-op. Diagnostics can be silenced through [`RuntimeConfig::warn_misuse`].
///
/// [`RuntimeConfig::warn_misuse`]: crate::config::RuntimeConfig::warn_misuse
pub(crate) fn report_misuse(err: &Error) {
    if crate::scheduler::config().warn_misuse {
        tracing::warn!(error = %err, "ripple misuse");
    }
}
