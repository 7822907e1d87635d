//! Event-driven simulation kernel with a procedural callback host interface.
//!
//! This crate implements the contract a VHDL-style simulator exposes to
//! external procedural code: opaque generation-checked handles to simulation
//! objects, a typed value codec over a uniform internal signal encoding,
//! two-word simulation time with delta cycles, callback registration keyed
//! by lifecycle and value-change reasons, a single-slot diagnostic channel,
//! and simulation control.
//!
//! # Architecture
//!
//! [`SimKernel`] owns every piece of shared state and is the sole driver of
//! time. External code populates signals and combinational processes,
//! registers startup routines, and then runs the kernel; callbacks re-enter
//! the kernel synchronously and run to completion without preemption.
//!
//! # Usage
//!
//! ```ignore
//! use kairos_sim::{SimConfig, SimKernel};
//!
//! let mut kernel = SimKernel::new(SimConfig::default());
//! // add signals, processes, and startup routines...
//! let result = kernel.run_to_completion()?;
//! println!("simulation ended at {}", result.final_time);
//! ```
//!
//! # Modules
//!
//! - `error` — the host-interface error taxonomy
//! - `time` — femtosecond time with delta cycles and two-word accessors
//! - `value` — signal types, external values, and the codec
//! - `handle` — opaque handles and the generation-checked registry
//! - `callback` — registration descriptors and states
//! - `kernel` — the event queue, delta-cycle loop, and interface surface

#![warn(missing_docs)]

pub mod callback;
pub mod error;
pub mod handle;
pub mod kernel;
pub mod time;
pub mod value;

use kairos_diagnostics::Severity;
use serde::{Deserialize, Serialize};

pub use callback::{
    CallbackData, CallbackDescriptor, CallbackId, CallbackReason, CallbackRoutine, CallbackState,
};
pub use error::HpiError;
pub use handle::{Handle, ObjectKind};
pub use kernel::{ProcessFn, ProcessUpdate, SignalView, SimKernel, SimResult};
pub use time::SimTime;
pub use value::{decode, encode, Format, PutMode, SignalId, SignalType, SimSignalState, Value};

/// Ordering policy for callbacks of different reasons due at the same
/// (time, delta) instant.
///
/// Within one reason, registration order always holds; across reasons the
/// original interface leaves the tie-break open, so it is configurable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TieBreak {
    /// Global registration order across all reasons.
    Registration,
    /// After-delay callbacks before value-change callbacks, registration
    /// order within each.
    ReasonThenRegistration,
}

/// Configuration for a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Optional time limit in femtoseconds. `None` runs until the event
    /// queue empties or termination is requested.
    pub time_limit: Option<u64>,
    /// Maximum delta cycles per time step before the run fails with
    /// [`HpiError::DeltaCycleLimit`].
    pub max_delta_per_step: u32,
    /// Diagnostics at or above this severity latch a halt request.
    pub halt_threshold: Severity,
    /// Cross-reason callback ordering at equal (time, delta).
    pub tie_break: TieBreak,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            time_limit: None,
            max_delta_per_step: 10_000,
            halt_threshold: Severity::Failure,
            tie_break: TieBreak::Registration,
        }
    }
}
