//! Error types for the host interface and kernel.
//!
//! Every fallible interface call returns one of these variants and mirrors
//! it into the diagnostic channel, so both `Result`-checking and
//! poll-style callers observe the same condition.

use kairos_diagnostics::{ErrorInfo, Severity};

/// Errors reported by host-interface operations and the run loop.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HpiError {
    /// A name lookup found no object. Recoverable: the caller may retry.
    #[error("no object named '{name}' in scope")]
    NotFound {
        /// The name that was looked up.
        name: String,
    },

    /// A handle was stale, already released, or of the wrong kind.
    #[error("invalid handle: {reason}")]
    InvalidHandle {
        /// Why the handle was rejected.
        reason: String,
    },

    /// A value's format tag is incompatible with the signal's declared type.
    #[error("format mismatch: cannot access {declared} signal as {requested}")]
    FormatMismatch {
        /// The requested or supplied format.
        requested: String,
        /// The signal's declared type.
        declared: String,
    },

    /// A value lies outside the signal's declared domain.
    #[error("value out of range: {reason}")]
    OutOfRange {
        /// Which domain constraint was violated.
        reason: String,
    },

    /// A registration descriptor's fields do not match its reason.
    #[error("invalid callback descriptor: {reason}")]
    InvalidDescriptor {
        /// Which field combination was rejected.
        reason: String,
    },

    /// A signal with this name already exists.
    #[error("duplicate signal name '{name}'")]
    DuplicateName {
        /// The conflicting name.
        name: String,
    },

    /// Too many delta cycles at one time step, indicating a zero-time loop.
    #[error("delta cycle limit exceeded at {fs} fs (max {max_deltas} deltas)")]
    DeltaCycleLimit {
        /// The time in femtoseconds where the limit was hit.
        fs: u64,
        /// The configured delta-cycle bound.
        max_deltas: u32,
    },
}

impl HpiError {
    /// The severity this error carries into the diagnostic channel.
    pub fn severity(&self) -> Severity {
        match self {
            HpiError::DeltaCycleLimit { .. } => Severity::Failure,
            _ => Severity::Error,
        }
    }

    /// Builds the channel record for this error, tagged with the interface
    /// operation that raised it.
    pub fn info(&self, origin: &'static str) -> ErrorInfo {
        ErrorInfo::new(self.severity(), self.to_string(), origin)
    }
}
