//! Diagnostics for the Kairos procedural host interface.
//!
//! External procedural code polls for errors rather than receiving them:
//! every fallible interface call deposits an [`ErrorInfo`] into the
//! single-slot [`DiagChannel`], where [`check_and_clear`](DiagChannel::check_and_clear)
//! retrieves and clears it. Severity-leveled assertions and the
//! informational print log live here too.

#![warn(missing_docs)]

pub mod channel;
pub mod info;
pub mod severity;

pub use channel::DiagChannel;
pub use info::ErrorInfo;
pub use severity::Severity;
