//! Callback registration descriptors, states, and stored registrations.
//!
//! External code registers a routine against a [`CallbackReason`]; the
//! kernel invokes it at the matching event point with a [`CallbackData`]
//! describing the trigger. Routines are `FnMut` boxes that receive the
//! kernel mutably, so a running callback can read and write values,
//! register further callbacks, or request termination.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use kairos_common::ArenaId;
use serde::{Deserialize, Serialize};

use crate::error::HpiError;
use crate::handle::Handle;
use crate::kernel::SimKernel;
use crate::time::SimTime;

/// Opaque ID for a callback registration in the kernel's table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct CallbackId(u32);

impl ArenaId for CallbackId {
    fn from_raw(index: u32) -> Self {
        Self(index)
    }

    fn as_raw(self) -> u32 {
        self.0
    }
}

/// The event category a registration is keyed on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum CallbackReason {
    /// Once, at time zero, after elaboration and before any other activity.
    StartOfSimulation,
    /// Once, after the run terminates and before teardown.
    EndOfSimulation,
    /// Once, at registration time plus the descriptor's delay.
    AfterDelay,
    /// Each delta cycle in which the target signal's value changes.
    ValueChange,
}

impl fmt::Display for CallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackReason::StartOfSimulation => write!(f, "start of simulation"),
            CallbackReason::EndOfSimulation => write!(f, "end of simulation"),
            CallbackReason::AfterDelay => write!(f, "after delay"),
            CallbackReason::ValueChange => write!(f, "value change"),
        }
    }
}

/// The observable state of a registration.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum CallbackState {
    /// Armed; will trigger on its event.
    Enabled,
    /// Suppressed; events pass without triggering, until re-enabled.
    Disabled,
    /// A one-shot registration that has executed. Its routine and user data
    /// are dropped; the handle stays valid until released.
    Mature,
}

impl fmt::Display for CallbackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackState::Enabled => write!(f, "enabled"),
            CallbackState::Disabled => write!(f, "disabled"),
            CallbackState::Mature => write!(f, "mature"),
        }
    }
}

/// The routine type invoked on a trigger.
pub type CallbackRoutine = Box<dyn FnMut(&mut SimKernel, &CallbackData)>;

/// What a routine receives when it runs.
pub struct CallbackData {
    /// Why the routine is running.
    pub reason: CallbackReason,
    /// The trigger time. [`SimKernel::current_time`] returns the same
    /// instant for the whole dispatch round.
    pub time: SimTime,
    /// The registration's own handle, releasable from within the routine.
    pub registration: Handle,
    /// The target signal handle for value-change triggers, as registered.
    pub target: Option<Handle>,
    /// The user data blob given at registration.
    pub user_data: Option<Rc<dyn Any>>,
}

/// A registration request: reason, trigger parameters, routine, user data.
///
/// Exactly one of `target` (value change) and `delay` (after delay) is
/// meaningful, depending on the reason; `repeat` only applies to value
/// change. [`SimKernel::register_callback`] validates the combination.
pub struct CallbackDescriptor {
    /// The event category to trigger on.
    pub reason: CallbackReason,
    /// The signal to watch, for value-change registrations.
    pub target: Option<Handle>,
    /// The relative delay, for after-delay registrations.
    pub delay: Option<SimTime>,
    /// The routine to invoke.
    pub routine: CallbackRoutine,
    /// Opaque data handed back on every trigger.
    pub user_data: Option<Rc<dyn Any>>,
    /// Persistent (repeating) registration; value-change only.
    pub repeat: bool,
}

impl CallbackDescriptor {
    /// Creates a descriptor with no target, delay, or user data.
    pub fn new(
        reason: CallbackReason,
        routine: impl FnMut(&mut SimKernel, &CallbackData) + 'static,
    ) -> Self {
        Self {
            reason,
            target: None,
            delay: None,
            routine: Box::new(routine),
            user_data: None,
            repeat: false,
        }
    }

    /// Sets the watched signal handle.
    pub fn target(mut self, handle: Handle) -> Self {
        self.target = Some(handle);
        self
    }

    /// Sets the relative delay.
    pub fn delay(mut self, delay: SimTime) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Attaches opaque user data.
    pub fn user_data(mut self, data: Rc<dyn Any>) -> Self {
        self.user_data = Some(data);
        self
    }

    /// Marks the registration persistent.
    pub fn repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    /// Checks the reason/field combination.
    pub(crate) fn validate(&self) -> Result<(), HpiError> {
        let fail = |reason: &str| {
            Err(HpiError::InvalidDescriptor {
                reason: reason.into(),
            })
        };
        match self.reason {
            CallbackReason::StartOfSimulation | CallbackReason::EndOfSimulation => {
                if self.target.is_some() || self.delay.is_some() {
                    return fail("lifecycle reasons take neither target nor delay");
                }
                if self.repeat {
                    return fail("lifecycle callbacks fire exactly once");
                }
            }
            CallbackReason::AfterDelay => {
                if self.delay.is_none() {
                    return fail("after-delay requires a delay");
                }
                if self.target.is_some() {
                    return fail("after-delay takes no target");
                }
                if self.repeat {
                    return fail("after-delay callbacks fire exactly once");
                }
            }
            CallbackReason::ValueChange => {
                if self.target.is_none() {
                    return fail("value-change requires a target signal");
                }
                if self.delay.is_some() {
                    return fail("value-change takes no delay");
                }
            }
        }
        Ok(())
    }
}

/// A stored registration in the kernel's callback table.
pub(crate) struct Registration {
    pub reason: CallbackReason,
    pub state: CallbackState,
    /// The target handle as the registrant passed it, echoed in
    /// [`CallbackData`].
    pub target_handle: Option<Handle>,
    /// `None` while the routine is out being executed, and permanently
    /// after the registration matures.
    pub routine: Option<CallbackRoutine>,
    pub user_data: Option<Rc<dyn Any>>,
    pub repeat: bool,
    /// The registration's own handle.
    pub handle: Handle,
    /// Global registration sequence number; the scheduler's ordering key.
    pub seq: u64,
    /// Set when the handle is released; the registration never fires again.
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(reason: CallbackReason) -> CallbackDescriptor {
        CallbackDescriptor::new(reason, |_, _| {})
    }

    #[test]
    fn callback_id_roundtrip() {
        let id = CallbackId::from_raw(11);
        assert_eq!(id.as_raw(), 11);
    }

    #[test]
    fn lifecycle_descriptor_valid() {
        assert!(descriptor(CallbackReason::StartOfSimulation)
            .validate()
            .is_ok());
        assert!(descriptor(CallbackReason::EndOfSimulation).validate().is_ok());
    }

    #[test]
    fn lifecycle_rejects_repeat_and_delay() {
        let d = descriptor(CallbackReason::StartOfSimulation).repeat(true);
        assert!(matches!(
            d.validate(),
            Err(HpiError::InvalidDescriptor { .. })
        ));
        let d = descriptor(CallbackReason::EndOfSimulation).delay(SimTime::from_ns(1));
        assert!(d.validate().is_err());
    }

    #[test]
    fn after_delay_requires_delay() {
        assert!(descriptor(CallbackReason::AfterDelay).validate().is_err());
        let d = descriptor(CallbackReason::AfterDelay).delay(SimTime::from_ns(5));
        assert!(d.validate().is_ok());
        let d = descriptor(CallbackReason::AfterDelay)
            .delay(SimTime::from_ns(5))
            .repeat(true);
        assert!(d.validate().is_err());
    }

    #[test]
    fn value_change_requires_target() {
        assert!(descriptor(CallbackReason::ValueChange).validate().is_err());
    }

    #[test]
    fn reason_display() {
        assert_eq!(
            CallbackReason::StartOfSimulation.to_string(),
            "start of simulation"
        );
        assert_eq!(CallbackReason::ValueChange.to_string(), "value change");
    }

    #[test]
    fn state_display() {
        assert_eq!(CallbackState::Enabled.to_string(), "enabled");
        assert_eq!(CallbackState::Disabled.to_string(), "disabled");
        assert_eq!(CallbackState::Mature.to_string(), "mature");
    }

    #[test]
    fn serde_roundtrip_reason_and_state() {
        let json = serde_json::to_string(&CallbackReason::AfterDelay).unwrap();
        let back: CallbackReason = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CallbackReason::AfterDelay);
        let json = serde_json::to_string(&CallbackState::Mature).unwrap();
        let back: CallbackState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CallbackState::Mature);
    }
}
