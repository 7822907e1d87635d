//! Diagnostic severity levels ordered from least to most severe.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The severity of a diagnostic raised through the host interface.
///
/// Ordered from least severe (`Note`) to most severe (`Failure`), matching
/// the derived `PartialOrd`/`Ord` on declaration order. Severities at or
/// above a channel's configured threshold latch a halt request.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Severity {
    /// Informational note.
    Note,
    /// A condition worth reviewing that does not affect the run.
    Warning,
    /// A definite problem; the run continues.
    Error,
    /// A fatal assertion; the run is expected to terminate.
    Failure,
}

impl Severity {
    /// Returns `true` if this severity is [`Failure`](Severity::Failure).
    pub fn is_failure(self) -> bool {
        self == Severity::Failure
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Failure => write!(f, "failure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering() {
        assert!(Severity::Note < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Failure);
    }

    #[test]
    fn is_failure() {
        assert!(Severity::Failure.is_failure());
        assert!(!Severity::Error.is_failure());
        assert!(!Severity::Warning.is_failure());
        assert!(!Severity::Note.is_failure());
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", Severity::Note), "note");
        assert_eq!(format!("{}", Severity::Warning), "warning");
        assert_eq!(format!("{}", Severity::Error), "error");
        assert_eq!(format!("{}", Severity::Failure), "failure");
    }

    #[test]
    fn serde_roundtrip() {
        let json = serde_json::to_string(&Severity::Failure).unwrap();
        let back: Severity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Severity::Failure);
    }
}
