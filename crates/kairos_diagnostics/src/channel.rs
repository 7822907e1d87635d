//! The single-slot error channel and informational print log.

use crate::info::ErrorInfo;
use crate::severity::Severity;

/// Diagnostic state shared by every host-interface operation.
///
/// The error slot holds at most the latest unread record: reporting
/// overwrites, reading clears. Correct callers check after every fallible
/// call. Severities at or above the halt threshold latch a halt request
/// that the kernel honors between callback dispatches, never mid-callback.
#[derive(Debug)]
pub struct DiagChannel {
    last_error: Option<ErrorInfo>,
    halt_threshold: Severity,
    halt_requested: bool,
    output: Vec<String>,
}

impl DiagChannel {
    /// Creates a channel that latches a halt at `halt_threshold` or above.
    pub fn new(halt_threshold: Severity) -> Self {
        Self {
            last_error: None,
            halt_threshold,
            halt_requested: false,
            output: Vec::new(),
        }
    }

    /// Deposits a record into the error slot, overwriting any unread one.
    ///
    /// Latches the halt request when the record's severity reaches the
    /// threshold.
    pub fn report(&mut self, info: ErrorInfo) {
        if info.severity >= self.halt_threshold {
            self.halt_requested = true;
        }
        self.last_error = Some(info);
    }

    /// The severity-leveled assertion facility.
    pub fn raise(&mut self, severity: Severity, message: impl Into<String>) {
        self.report(ErrorInfo::new(severity, message, "assert"));
    }

    /// Takes the pending error, leaving the slot empty.
    pub fn check_and_clear(&mut self) -> Option<ErrorInfo> {
        self.last_error.take()
    }

    /// Returns `true` once a threshold-severity record has been reported.
    pub fn halt_requested(&self) -> bool {
        self.halt_requested
    }

    /// Appends a line to the informational print log.
    pub fn print(&mut self, message: impl Into<String>) {
        self.output.push(message.into());
    }

    /// Drains the print log in emission order.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }
}

impl Default for DiagChannel {
    fn default() -> Self {
        Self::new(Severity::Failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_channel() {
        let mut ch = DiagChannel::default();
        assert!(ch.check_and_clear().is_none());
        assert!(!ch.halt_requested());
        assert!(ch.take_output().is_empty());
    }

    #[test]
    fn check_clears_slot() {
        let mut ch = DiagChannel::default();
        ch.report(ErrorInfo::error("first", "op"));
        assert_eq!(ch.check_and_clear().unwrap().message, "first");
        assert!(ch.check_and_clear().is_none());
    }

    #[test]
    fn report_overwrites_unread() {
        let mut ch = DiagChannel::default();
        ch.report(ErrorInfo::error("first", "op"));
        ch.report(ErrorInfo::error("second", "op"));
        assert_eq!(ch.check_and_clear().unwrap().message, "second");
    }

    #[test]
    fn failure_latches_halt() {
        let mut ch = DiagChannel::default();
        ch.raise(Severity::Error, "advisory");
        assert!(!ch.halt_requested());
        ch.raise(Severity::Failure, "fatal");
        assert!(ch.halt_requested());
        // Reading the error does not clear the latch
        let _ = ch.check_and_clear();
        assert!(ch.halt_requested());
    }

    #[test]
    fn threshold_configurable() {
        let mut ch = DiagChannel::new(Severity::Error);
        ch.raise(Severity::Warning, "fine");
        assert!(!ch.halt_requested());
        ch.raise(Severity::Error, "not fine");
        assert!(ch.halt_requested());
    }

    #[test]
    fn print_log_ordered() {
        let mut ch = DiagChannel::default();
        ch.print("one");
        ch.print("two");
        assert_eq!(ch.take_output(), vec!["one", "two"]);
        assert!(ch.take_output().is_empty());
    }
}
