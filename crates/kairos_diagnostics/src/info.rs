//! Error records retrieved through the diagnostic channel.

use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single diagnostic record: what went wrong, how bad, and where.
///
/// `origin` names the interface operation that reported the condition
/// (for example `"get_value"`), standing in for a source location across
/// the procedural boundary.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// How severe the condition is.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// The interface operation that reported the condition.
    pub origin: String,
}

impl ErrorInfo {
    /// Creates a new record.
    pub fn new(severity: Severity, message: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            origin: origin.into(),
        }
    }

    /// Creates an [`Error`](Severity::Error)-severity record.
    pub fn error(message: impl Into<String>, origin: impl Into<String>) -> Self {
        Self::new(Severity::Error, message, origin)
    }

    /// Creates a [`Failure`](Severity::Failure)-severity record.
    pub fn failure(message: impl Into<String>, origin: impl Into<String>) -> Self {
        Self::new(Severity::Failure, message, origin)
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (in {})", self.severity, self.message, self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors() {
        let e = ErrorInfo::error("no such signal", "handle_by_name");
        assert_eq!(e.severity, Severity::Error);
        assert_eq!(e.message, "no such signal");
        assert_eq!(e.origin, "handle_by_name");

        let f = ErrorInfo::failure("boom", "assert");
        assert_eq!(f.severity, Severity::Failure);
    }

    #[test]
    fn display() {
        let e = ErrorInfo::new(Severity::Warning, "stale handle", "release");
        assert_eq!(e.to_string(), "warning: stale handle (in release)");
    }

    #[test]
    fn serde_roundtrip() {
        let e = ErrorInfo::failure("fatal", "put_value");
        let json = serde_json::to_string(&e).unwrap();
        let back: ErrorInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }
}
