//! Simulation kernel: event queue, delta-cycle loop, callback dispatch,
//! and the procedural host interface surface.
//!
//! [`SimKernel`] owns the flat signal table, the callback registration
//! table, the handle registry, and the diagnostic channel. External
//! procedural code talks to it through handles: look up signals by name,
//! read and write values, register callbacks, request termination. The
//! kernel is the sole driver of time; callbacks and processes run to
//! completion without preemption.

use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap};

use kairos_common::{Arena, ArenaId, Ident, Interner, LogicVec};
use kairos_diagnostics::{DiagChannel, ErrorInfo, Severity};

use crate::callback::{
    CallbackData, CallbackDescriptor, CallbackId, CallbackReason, CallbackState, Registration,
};
use crate::error::HpiError;
use crate::handle::{Handle, HandleRegistry, Released};
use crate::time::SimTime;
use crate::value::{
    decode, encode, Format, PutMode, SignalId, SignalType, SimSignalState, Value,
};
use crate::{SimConfig, TieBreak};

/// An event scheduled in the kernel's queue.
struct QueueEntry {
    /// When this entry becomes due.
    time: SimTime,
    /// Monotone sequence number; the stable tie-break at equal times.
    seq: u64,
    action: QueueAction,
}

enum QueueAction {
    /// Apply a value to a signal.
    Update {
        signal: SignalId,
        value: LogicVec,
        mode: PutMode,
    },
    /// Trigger an after-delay registration.
    DelayWake { callback: CallbackId },
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time.cmp(&other.time).then(self.seq.cmp(&other.seq))
    }
}

/// Read-only view of the signal table handed to process closures.
pub struct SignalView<'a> {
    signals: &'a Arena<SignalId, SimSignalState>,
}

impl SignalView<'_> {
    /// Reads a signal in its native format.
    pub fn value(&self, id: SignalId) -> Result<Value, HpiError> {
        self.get(id, Format::ObjType)
    }

    /// Reads a signal in the requested format.
    pub fn get(&self, id: SignalId, format: Format) -> Result<Value, HpiError> {
        let state = self.signals.get(id).ok_or_else(|| HpiError::InvalidHandle {
            reason: format!("unknown signal {}", id.as_raw()),
        })?;
        decode(&state.value, &state.ty, format)
    }
}

/// A value a process wants driven onto a signal at the next delta cycle.
pub struct ProcessUpdate {
    /// The driven signal.
    pub signal: SignalId,
    /// The new value.
    pub value: Value,
}

/// The closure type for host-registered combinational processes.
pub type ProcessFn = Box<dyn FnMut(&SignalView<'_>) -> Vec<ProcessUpdate>>;

struct SimProcess {
    /// `None` only while the closure is out being executed.
    run: Option<ProcessFn>,
}

/// The result of a completed run.
#[derive(Debug, Clone)]
pub struct SimResult {
    /// The simulation time when the run ended.
    pub final_time: SimTime,
    /// Whether the run was ended by an explicit finish request.
    pub finished_by_user: bool,
    /// Total delta cycles executed.
    pub total_deltas: u64,
    /// The informational print log, drained.
    pub output: Vec<String>,
}

/// The outcome of processing a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepResult {
    /// More events may follow.
    Continued,
    /// The event queue is empty; the run has terminated.
    Exhausted,
    /// The next event lies past the time limit; the run is paused, not
    /// terminated.
    LimitReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    /// Signals, processes, and startup routines may still be added.
    Elaboration,
    /// The event loop is live.
    Running,
    /// End-of-simulation callbacks have fired.
    Ended,
}

/// The simulation kernel and host interface.
///
/// Construct with [`SimKernel::new`], populate signals and processes,
/// register startup routines, then call
/// [`run_to_completion`](SimKernel::run_to_completion) or
/// [`run`](SimKernel::run).
pub struct SimKernel {
    config: SimConfig,
    interner: Interner,
    signals: Arena<SignalId, SimSignalState>,
    name_index: HashMap<Ident, SignalId>,
    processes: Vec<SimProcess>,
    /// Signal → indices of processes sensitive to it.
    sensitivity_map: HashMap<SignalId, Vec<usize>>,
    registrations: Arena<CallbackId, Registration>,
    start_cbs: Vec<CallbackId>,
    end_cbs: Vec<CallbackId>,
    value_cbs: HashMap<SignalId, Vec<CallbackId>>,
    handles: HandleRegistry,
    event_queue: BinaryHeap<Reverse<QueueEntry>>,
    /// Monotone counter ordering registrations and queue entries.
    seq: u64,
    now: SimTime,
    phase: RunPhase,
    finish_requested: bool,
    diag: DiagChannel,
    startup: Vec<Box<dyn FnOnce(&mut SimKernel)>>,
    total_deltas: u64,
}

impl SimKernel {
    /// Creates an empty kernel with the given configuration.
    pub fn new(config: SimConfig) -> Self {
        let diag = DiagChannel::new(config.halt_threshold);
        Self {
            config,
            interner: Interner::new(),
            signals: Arena::new(),
            name_index: HashMap::new(),
            processes: Vec::new(),
            sensitivity_map: HashMap::new(),
            registrations: Arena::new(),
            start_cbs: Vec::new(),
            end_cbs: Vec::new(),
            value_cbs: HashMap::new(),
            handles: HandleRegistry::new(),
            event_queue: BinaryHeap::new(),
            seq: 0,
            now: SimTime::zero(),
            phase: RunPhase::Elaboration,
            finish_requested: false,
            diag,
            startup: Vec::new(),
            total_deltas: 0,
        }
    }

    // ---- Construction (elaboration stand-in) ----

    /// Adds a signal to the design.
    pub fn add_signal(
        &mut self,
        name: &str,
        ty: SignalType,
        init: Option<Value>,
    ) -> Result<SignalId, HpiError> {
        const ORIGIN: &str = "add_signal";
        let ident = self.interner.intern(name);
        if self.name_index.contains_key(&ident) {
            return self.fail(ORIGIN, HpiError::DuplicateName { name: name.into() });
        }
        let state = match SimSignalState::new(ident, ty, init.as_ref()) {
            Ok(state) => state,
            Err(e) => return self.fail(ORIGIN, e),
        };
        let id = self.signals.alloc(state);
        self.name_index.insert(ident, id);
        Ok(id)
    }

    /// Adds a combinational process woken whenever a sensitivity signal
    /// changes. Its updates land at the next delta cycle. Every process is
    /// also evaluated once at startup for initial propagation.
    pub fn add_process(
        &mut self,
        sensitivity: Vec<SignalId>,
        run: impl FnMut(&SignalView<'_>) -> Vec<ProcessUpdate> + 'static,
    ) {
        let index = self.processes.len();
        for sig in sensitivity {
            self.sensitivity_map.entry(sig).or_default().push(index);
        }
        self.processes.push(SimProcess {
            run: Some(Box::new(run)),
        });
    }

    /// Adds a startup routine, run once before elaboration completes.
    ///
    /// This is the registration window external code uses to look up
    /// handles and register lifecycle callbacks.
    pub fn add_startup(&mut self, routine: impl FnOnce(&mut SimKernel) + 'static) {
        self.startup.push(Box::new(routine));
    }

    /// Schedules a raw deposit of `value` on `signal` at `time`.
    pub fn schedule_event(&mut self, time: SimTime, signal: SignalId, value: LogicVec) {
        self.push_event(
            time,
            QueueAction::Update {
                signal,
                value,
                mode: PutMode::Deposit,
            },
        );
    }

    // ---- Handle registry surface ----

    /// Returns a handle to the root design instance.
    ///
    /// Each call mints a fresh handle; releasing one does not invalidate
    /// another.
    pub fn root_handle(&mut self) -> Handle {
        self.handles.mint_root()
    }

    /// Looks up a signal by name under a live root handle.
    pub fn handle_by_name(&mut self, name: &str, parent: Handle) -> Result<Handle, HpiError> {
        const ORIGIN: &str = "handle_by_name";
        if let Err(e) = self.handles.resolve_root(parent) {
            return self.fail(ORIGIN, e);
        }
        let found = self
            .interner
            .get(name)
            .and_then(|ident| self.name_index.get(&ident).copied());
        match found {
            Some(id) => Ok(self.handles.mint_signal(id)),
            None => self.fail(ORIGIN, HpiError::NotFound { name: name.into() }),
        }
    }

    /// Releases a handle, invalidating it.
    ///
    /// Releasing a callback handle cancels the registration: a pending
    /// trigger never fires. Double release reports `InvalidHandle`.
    pub fn release(&mut self, handle: Handle) -> Result<(), HpiError> {
        const ORIGIN: &str = "release";
        match self.handles.release(handle) {
            Ok(Released::Callback(id)) => {
                if let Some(reg) = self.registrations.get_mut(id) {
                    reg.cancelled = true;
                    reg.routine = None;
                    reg.user_data = None;
                }
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) => self.fail(ORIGIN, e),
        }
    }

    // ---- Value codec surface ----

    /// Reads a signal's value in the requested format.
    ///
    /// Never mutates simulation state.
    pub fn get_value(&mut self, handle: Handle, format: Format) -> Result<Value, HpiError> {
        const ORIGIN: &str = "get_value";
        let id = match self.handles.resolve_signal(handle) {
            Ok(id) => id,
            Err(e) => return self.fail(ORIGIN, e),
        };
        let Some(state) = self.signals.get(id) else {
            return self.fail(
                ORIGIN,
                HpiError::InvalidHandle {
                    reason: format!("signal {} missing from table", id.as_raw()),
                },
            );
        };
        match decode(&state.value, &state.ty, format) {
            Ok(value) => Ok(value),
            Err(e) => self.fail(ORIGIN, e),
        }
    }

    /// Writes a value to a signal.
    ///
    /// The update is scheduled at the next delta cycle: visible to other
    /// callbacks and processes at the next readable point, never
    /// synchronously within the writing callback. `ForcePropagate` beats
    /// any `Deposit` landing in the same delta. On error the signal is
    /// left unchanged.
    pub fn put_value(
        &mut self,
        handle: Handle,
        value: &Value,
        mode: PutMode,
    ) -> Result<(), HpiError> {
        const ORIGIN: &str = "put_value";
        let id = match self.handles.resolve_signal(handle) {
            Ok(id) => id,
            Err(e) => return self.fail(ORIGIN, e),
        };
        let Some(state) = self.signals.get(id) else {
            return self.fail(
                ORIGIN,
                HpiError::InvalidHandle {
                    reason: format!("signal {} missing from table", id.as_raw()),
                },
            );
        };
        let encoded = match encode(value, &state.ty) {
            Ok(encoded) => encoded,
            Err(e) => return self.fail(ORIGIN, e),
        };
        let time = self.now.next_delta();
        self.push_event(
            time,
            QueueAction::Update {
                signal: id,
                value: encoded,
                mode,
            },
        );
        Ok(())
    }

    // ---- Time surface ----

    /// The current simulation time and delta cycle index.
    ///
    /// Within a callback this is the time of the callback's triggering
    /// event, regardless of other callbacks already executed in the same
    /// delta round.
    pub fn current_time(&self) -> (SimTime, u32) {
        (self.now, self.now.delta)
    }

    // ---- Callback scheduler surface ----

    /// Registers a callback and returns its handle.
    ///
    /// Registration from within a running callback is legal and takes
    /// effect for subsequent events, never the current one.
    pub fn register_callback(&mut self, descriptor: CallbackDescriptor) -> Result<Handle, HpiError> {
        const ORIGIN: &str = "register_callback";
        if let Err(e) = descriptor.validate() {
            return self.fail(ORIGIN, e);
        }
        let CallbackDescriptor {
            reason,
            target,
            delay,
            routine,
            user_data,
            repeat,
        } = descriptor;

        match reason {
            CallbackReason::StartOfSimulation if self.phase != RunPhase::Elaboration => {
                return self.fail(
                    ORIGIN,
                    HpiError::InvalidDescriptor {
                        reason: "start of simulation has already passed".into(),
                    },
                );
            }
            CallbackReason::EndOfSimulation if self.phase == RunPhase::Ended => {
                return self.fail(
                    ORIGIN,
                    HpiError::InvalidDescriptor {
                        reason: "simulation has already ended".into(),
                    },
                );
            }
            _ => {}
        }

        let signal = match target {
            Some(h) => match self.handles.resolve_signal(h) {
                Ok(id) => Some(id),
                Err(e) => return self.fail(ORIGIN, e),
            },
            None => None,
        };

        let seq = self.next_seq();
        let id = CallbackId::from_raw(self.registrations.len() as u32);
        let handle = self.handles.mint_callback(id);
        let allocated = self.registrations.alloc(Registration {
            reason,
            state: CallbackState::Enabled,
            target_handle: target,
            routine: Some(routine),
            user_data,
            repeat,
            handle,
            seq,
            cancelled: false,
        });
        debug_assert_eq!(allocated.as_raw(), id.as_raw());

        match reason {
            CallbackReason::StartOfSimulation => self.start_cbs.push(id),
            CallbackReason::EndOfSimulation => self.end_cbs.push(id),
            CallbackReason::ValueChange => {
                if let Some(sig) = signal {
                    self.value_cbs.entry(sig).or_default().push(id);
                }
            }
            CallbackReason::AfterDelay => {
                // Relative to registration time; a zero delay means the
                // next delta cycle, never the current one.
                let wake = match delay {
                    Some(d) if d.fs > 0 => SimTime::from_fs(self.now.fs + d.fs),
                    _ => self.now.next_delta(),
                };
                self.push_event(wake, QueueAction::DelayWake { callback: id });
            }
        }
        Ok(handle)
    }

    /// Reads a registration's state property.
    pub fn callback_state(&mut self, handle: Handle) -> Result<CallbackState, HpiError> {
        const ORIGIN: &str = "callback_state";
        let id = match self.handles.resolve_callback(handle) {
            Ok(id) => id,
            Err(e) => return self.fail(ORIGIN, e),
        };
        match self.registrations.get(id) {
            Some(reg) => Ok(reg.state),
            None => self.fail(
                ORIGIN,
                HpiError::InvalidHandle {
                    reason: format!("registration {} missing from table", id.as_raw()),
                },
            ),
        }
    }

    /// Re-arms a disabled registration.
    pub fn enable_callback(&mut self, handle: Handle) -> Result<(), HpiError> {
        self.set_callback_state(handle, CallbackState::Enabled, "enable_callback")
    }

    /// Suppresses a registration without deregistering it.
    ///
    /// A suppressed after-delay registration whose trigger time passes
    /// consumes the trigger and matures.
    pub fn disable_callback(&mut self, handle: Handle) -> Result<(), HpiError> {
        self.set_callback_state(handle, CallbackState::Disabled, "disable_callback")
    }

    fn set_callback_state(
        &mut self,
        handle: Handle,
        state: CallbackState,
        origin: &'static str,
    ) -> Result<(), HpiError> {
        let id = match self.handles.resolve_callback(handle) {
            Ok(id) => id,
            Err(e) => return self.fail(origin, e),
        };
        let Some(reg) = self.registrations.get_mut(id) else {
            return self.fail(
                origin,
                HpiError::InvalidHandle {
                    reason: format!("registration {} missing from table", id.as_raw()),
                },
            );
        };
        if reg.state == CallbackState::Mature {
            let err = HpiError::InvalidDescriptor {
                reason: "registration has matured".into(),
            };
            return self.fail(origin, err);
        }
        reg.state = state;
        Ok(())
    }

    // ---- Diagnostics and control surface ----

    /// Appends a line to the informational print log.
    pub fn printf(&mut self, message: impl Into<String>) {
        self.diag.print(message);
    }

    /// Raises a severity-leveled diagnostic.
    ///
    /// Severities at or above the configured halt threshold latch a halt
    /// request honored after the current callback returns.
    pub fn raise(&mut self, severity: Severity, message: impl Into<String>) {
        self.diag.raise(severity, message);
    }

    /// Takes the pending error from the diagnostic channel, clearing it.
    pub fn check_error(&mut self) -> Option<ErrorInfo> {
        self.diag.check_and_clear()
    }

    /// Drains the informational print log.
    pub fn take_output(&mut self) -> Vec<String> {
        self.diag.take_output()
    }

    /// Requests orderly termination: no further time advances, and the
    /// end-of-simulation callbacks still fire. Idempotent.
    pub fn request_finish(&mut self) {
        self.finish_requested = true;
    }

    /// Whether a finish request is pending or was honored.
    pub fn finish_requested(&self) -> bool {
        self.finish_requested
    }

    /// The tool identification string.
    pub fn tool_name(&self) -> &'static str {
        concat!("kairos ", env!("CARGO_PKG_VERSION"))
    }

    // ---- Inspection ----

    /// Finds a signal ID by name.
    pub fn find_signal(&self, name: &str) -> Option<SignalId> {
        let ident = self.interner.get(name)?;
        self.name_index.get(&ident).copied()
    }

    /// The raw encoded value of a signal.
    pub fn signal_value(&self, id: SignalId) -> Option<&LogicVec> {
        self.signals.get(id).map(|s| &s.value)
    }

    /// The number of signals in the table.
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    // ---- Run loop ----

    /// Runs until the event queue empties, a finish request, a halt latch,
    /// or the configured time limit.
    pub fn run_to_completion(&mut self) -> Result<SimResult, HpiError> {
        let limit = self.config.time_limit;
        self.run_simulation(limit)
    }

    /// Runs for at most `duration_fs` femtoseconds past the current time.
    pub fn run(&mut self, duration_fs: u64) -> Result<SimResult, HpiError> {
        let limit = self.now.fs + duration_fs;
        self.run_simulation(Some(limit))
    }

    fn run_simulation(&mut self, time_limit: Option<u64>) -> Result<SimResult, HpiError> {
        if self.phase == RunPhase::Elaboration {
            let routines = std::mem::take(&mut self.startup);
            for routine in routines {
                routine(self);
            }
            self.phase = RunPhase::Running;

            // Start-of-simulation callbacks fire at (0, 0), in registration
            // order, before any other simulation activity.
            let due = self.start_cbs.clone();
            for id in due {
                if self.diag.halt_requested() {
                    break;
                }
                self.dispatch_callback(id);
            }

            // Initial evaluation of every process, updates at (0, delta 1).
            let schedule_at = self.now.next_delta();
            for index in 0..self.processes.len() {
                self.run_process(index, schedule_at)?;
            }
        }

        let mut paused_at_limit = false;
        while !self.finish_requested && !self.diag.halt_requested() {
            match self.step_instant(time_limit)? {
                StepResult::Continued => {}
                StepResult::Exhausted => break,
                StepResult::LimitReached => {
                    paused_at_limit = true;
                    break;
                }
            }
        }

        // End-of-simulation fires exactly once, when the run terminates —
        // by finish request, halt, or queue exhaustion, but not when a
        // time-limited run merely pauses.
        if !paused_at_limit && self.phase != RunPhase::Ended {
            self.phase = RunPhase::Ended;
            let due = self.end_cbs.clone();
            for id in due {
                self.dispatch_callback(id);
            }
        }

        Ok(SimResult {
            final_time: self.now,
            finished_by_user: self.finish_requested,
            total_deltas: self.total_deltas,
            output: self.diag.take_output(),
        })
    }

    /// Processes all queue entries due at the earliest scheduled instant.
    fn step_instant(&mut self, time_limit: Option<u64>) -> Result<StepResult, HpiError> {
        let Some(Reverse(first)) = self.event_queue.peek() else {
            return Ok(StepResult::Exhausted);
        };
        let next_time = first.time;
        if let Some(limit) = time_limit {
            if next_time.fs > limit {
                return Ok(StepResult::LimitReached);
            }
        }
        if next_time.delta >= self.config.max_delta_per_step {
            let err = HpiError::DeltaCycleLimit {
                fs: next_time.fs,
                max_deltas: self.config.max_delta_per_step,
            };
            self.diag.report(err.info("run"));
            return Err(err);
        }
        self.now = next_time;

        // Drain every entry due now, in sequence order.
        let mut updates: Vec<(SignalId, LogicVec, PutMode)> = Vec::new();
        let mut delay_wakes: Vec<CallbackId> = Vec::new();
        loop {
            match self.event_queue.peek() {
                Some(Reverse(entry)) if entry.time == self.now => {}
                _ => break,
            }
            let Some(Reverse(entry)) = self.event_queue.pop() else {
                break;
            };
            match entry.action {
                QueueAction::Update {
                    signal,
                    value,
                    mode,
                } => updates.push((signal, value, mode)),
                QueueAction::DelayWake { callback } => delay_wakes.push(callback),
            }
        }

        // Resolve the final value per signal: a force beats every deposit
        // in the same delta; within a mode class the later write wins.
        let mut final_values: HashMap<SignalId, (bool, LogicVec)> = HashMap::new();
        let mut update_order: Vec<SignalId> = Vec::new();
        for (signal, value, mode) in updates {
            let is_force = mode == PutMode::ForcePropagate;
            match final_values.entry(signal) {
                Entry::Vacant(slot) => {
                    slot.insert((is_force, value));
                    update_order.push(signal);
                }
                Entry::Occupied(mut slot) => {
                    let forced = slot.get().0;
                    if is_force || !forced {
                        slot.insert((is_force || forced, value));
                    }
                }
            }
        }

        // Apply, tracking which signals actually changed this delta.
        let mut changed: Vec<SignalId> = Vec::new();
        for signal in update_order {
            let Some((_, new_value)) = final_values.remove(&signal) else {
                continue;
            };
            let Some(state) = self.signals.get_mut(signal) else {
                continue;
            };
            if state.value != new_value {
                state.previous_value = std::mem::replace(&mut state.value, new_value);
                changed.push(signal);
            }
        }

        // Collect due callbacks: delay wakes plus value-change callbacks
        // for changed signals. The list is a snapshot — registrations made
        // during dispatch fire on subsequent events only.
        let mut due: Vec<(u8, u64, CallbackId)> = Vec::new();
        for id in delay_wakes {
            let Some(reg) = self.registrations.get_mut(id) else {
                continue;
            };
            if reg.cancelled {
                continue;
            }
            if reg.state == CallbackState::Disabled {
                // The trigger is consumed; the registration matures.
                reg.state = CallbackState::Mature;
                reg.routine = None;
                reg.user_data = None;
                continue;
            }
            due.push((0, reg.seq, id));
        }
        for &signal in &changed {
            if let Some(list) = self.value_cbs.get(&signal) {
                for &id in list {
                    if let Some(reg) = self.registrations.get(id) {
                        if reg.cancelled || reg.state != CallbackState::Enabled {
                            continue;
                        }
                        due.push((1, reg.seq, id));
                    }
                }
            }
        }
        match self.config.tie_break {
            TieBreak::Registration => due.sort_by_key(|&(_, seq, _)| seq),
            TieBreak::ReasonThenRegistration => due.sort_unstable(),
        }

        for (_, _, id) in due {
            // A halt latch stops dispatch after the raising callback
            // returns; a finish request lets the current instant complete.
            if self.diag.halt_requested() {
                break;
            }
            self.dispatch_callback(id);
        }

        // Wake sensitive processes; their updates land at the next delta.
        if !changed.is_empty() {
            let to_run = self.find_sensitive_processes(&changed);
            let schedule_at = self.now.next_delta();
            for index in to_run {
                self.run_process(index, schedule_at)?;
            }
        }

        self.total_deltas += 1;
        Ok(StepResult::Continued)
    }

    /// Invokes one registration's routine, temporarily taking it out of
    /// its slot so the routine can re-enter the kernel.
    fn dispatch_callback(&mut self, id: CallbackId) {
        let Some(reg) = self.registrations.get_mut(id) else {
            return;
        };
        if reg.cancelled || reg.state != CallbackState::Enabled {
            return;
        }
        let Some(mut routine) = reg.routine.take() else {
            return;
        };
        let data = CallbackData {
            reason: reg.reason,
            time: self.now,
            registration: reg.handle,
            target: reg.target_handle,
            user_data: reg.user_data.clone(),
        };
        routine(self, &data);
        // The routine may have released its own registration.
        if let Some(reg) = self.registrations.get_mut(id) {
            if !reg.cancelled {
                if reg.repeat {
                    reg.routine = Some(routine);
                } else {
                    reg.state = CallbackState::Mature;
                    reg.user_data = None;
                }
            }
        }
    }

    fn run_process(&mut self, index: usize, schedule_at: SimTime) -> Result<(), HpiError> {
        const ORIGIN: &str = "process";
        let Some(mut run) = self.processes[index].run.take() else {
            return Ok(());
        };
        let updates = run(&SignalView {
            signals: &self.signals,
        });
        self.processes[index].run = Some(run);

        for update in updates {
            let Some(state) = self.signals.get(update.signal) else {
                return self.fail(
                    ORIGIN,
                    HpiError::InvalidHandle {
                        reason: format!("process drives unknown signal {}", update.signal.as_raw()),
                    },
                );
            };
            let encoded = match encode(&update.value, &state.ty) {
                Ok(encoded) => encoded,
                Err(e) => return self.fail(ORIGIN, e),
            };
            self.push_event(
                schedule_at,
                QueueAction::Update {
                    signal: update.signal,
                    value: encoded,
                    mode: PutMode::Deposit,
                },
            );
        }
        Ok(())
    }

    fn find_sensitive_processes(&self, changed: &[SignalId]) -> Vec<usize> {
        let mut to_run: Vec<usize> = Vec::new();
        for signal in changed {
            if let Some(list) = self.sensitivity_map.get(signal) {
                for &index in list {
                    if !to_run.contains(&index) {
                        to_run.push(index);
                    }
                }
            }
        }
        to_run.sort_unstable();
        to_run
    }

    fn push_event(&mut self, time: SimTime, action: QueueAction) {
        let seq = self.next_seq();
        self.event_queue.push(Reverse(QueueEntry { time, seq, action }));
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.seq;
        self.seq += 1;
        seq
    }

    /// Mirrors an error into the diagnostic channel and returns it.
    fn fail<T>(&mut self, origin: &'static str, err: HpiError) -> Result<T, HpiError> {
        self.diag.report(err.info(origin));
        Err(err)
    }
}
