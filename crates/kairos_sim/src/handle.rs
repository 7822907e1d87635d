//! Opaque handles and the generation-checked registry behind them.
//!
//! Every object crossing the procedural boundary — the root instance,
//! signals, callback registrations — is referenced by a [`Handle`]: a kind
//! tag plus a generation-checked index into a per-kind slot arena. Releasing
//! a handle bumps its slot's generation, so any later use of the stale
//! handle reports `InvalidHandle` in O(1) instead of touching freed state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::callback::CallbackId;
use crate::error::HpiError;
use crate::value::SignalId;

/// The kind of simulation object a handle refers to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ObjectKind {
    /// The root design instance.
    Root,
    /// A signal.
    Signal,
    /// A callback registration.
    Callback,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Root => write!(f, "root"),
            ObjectKind::Signal => write!(f, "signal"),
            ObjectKind::Callback => write!(f, "callback"),
        }
    }
}

/// An opaque reference to a simulation object.
///
/// Handles are plain copyable data; validity lives in the registry. A
/// released handle compares equal to its former self but no longer
/// resolves.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Handle {
    kind: ObjectKind,
    index: u32,
    generation: u32,
}

impl Handle {
    /// The kind of object this handle refers to.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}.{}", self.kind, self.index, self.generation)
    }
}

/// What a released handle referred to, so the kernel can free the
/// associated resources (cancelling a callback registration, for one).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Released {
    /// The root instance; nothing further to free.
    Root,
    /// A signal reference.
    Signal(SignalId),
    /// A callback registration to cancel.
    Callback(CallbackId),
}

/// One slot in a generation-checked arena.
#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    payload: Option<T>,
}

/// A generation-checked slot arena for one object kind.
#[derive(Debug)]
struct Slots<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Slots<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn mint(&mut self, payload: T) -> (u32, u32) {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.payload = Some(payload);
            (index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                payload: Some(payload),
            });
            (index, 0)
        }
    }

    fn resolve(&self, index: u32, generation: u32) -> Option<&T> {
        let slot = self.slots.get(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.payload.as_ref()
    }

    fn release(&mut self, index: u32, generation: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        let payload = slot.payload.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        Some(payload)
    }
}

/// The handle registry: one generation-checked arena per object kind.
#[derive(Debug)]
pub(crate) struct HandleRegistry {
    roots: Slots<()>,
    signals: Slots<SignalId>,
    callbacks: Slots<CallbackId>,
}

fn stale(handle: Handle) -> HpiError {
    HpiError::InvalidHandle {
        reason: format!("{handle} is released or stale"),
    }
}

fn wrong_kind(handle: Handle, expected: ObjectKind) -> HpiError {
    HpiError::InvalidHandle {
        reason: format!("expected a {expected} handle, got {}", handle.kind()),
    }
}

impl HandleRegistry {
    pub(crate) fn new() -> Self {
        Self {
            roots: Slots::new(),
            signals: Slots::new(),
            callbacks: Slots::new(),
        }
    }

    /// Mints a handle to the root instance.
    pub(crate) fn mint_root(&mut self) -> Handle {
        let (index, generation) = self.roots.mint(());
        Handle {
            kind: ObjectKind::Root,
            index,
            generation,
        }
    }

    /// Mints a handle to a signal.
    pub(crate) fn mint_signal(&mut self, id: SignalId) -> Handle {
        let (index, generation) = self.signals.mint(id);
        Handle {
            kind: ObjectKind::Signal,
            index,
            generation,
        }
    }

    /// Mints a handle to a callback registration.
    pub(crate) fn mint_callback(&mut self, id: CallbackId) -> Handle {
        let (index, generation) = self.callbacks.mint(id);
        Handle {
            kind: ObjectKind::Callback,
            index,
            generation,
        }
    }

    /// Resolves a live root handle.
    pub(crate) fn resolve_root(&self, handle: Handle) -> Result<(), HpiError> {
        if handle.kind != ObjectKind::Root {
            return Err(wrong_kind(handle, ObjectKind::Root));
        }
        self.roots
            .resolve(handle.index, handle.generation)
            .map(|_| ())
            .ok_or_else(|| stale(handle))
    }

    /// Resolves a live signal handle to its signal ID.
    pub(crate) fn resolve_signal(&self, handle: Handle) -> Result<SignalId, HpiError> {
        if handle.kind != ObjectKind::Signal {
            return Err(wrong_kind(handle, ObjectKind::Signal));
        }
        self.signals
            .resolve(handle.index, handle.generation)
            .copied()
            .ok_or_else(|| stale(handle))
    }

    /// Resolves a live callback handle to its registration ID.
    pub(crate) fn resolve_callback(&self, handle: Handle) -> Result<CallbackId, HpiError> {
        if handle.kind != ObjectKind::Callback {
            return Err(wrong_kind(handle, ObjectKind::Callback));
        }
        self.callbacks
            .resolve(handle.index, handle.generation)
            .copied()
            .ok_or_else(|| stale(handle))
    }

    /// Releases a handle, invalidating it and returning what it referred to.
    ///
    /// Double release reports `InvalidHandle`.
    pub(crate) fn release(&mut self, handle: Handle) -> Result<Released, HpiError> {
        match handle.kind {
            ObjectKind::Root => self
                .roots
                .release(handle.index, handle.generation)
                .map(|()| Released::Root),
            ObjectKind::Signal => self
                .signals
                .release(handle.index, handle.generation)
                .map(Released::Signal),
            ObjectKind::Callback => self
                .callbacks
                .release(handle.index, handle.generation)
                .map(Released::Callback),
        }
        .ok_or_else(|| stale(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kairos_common::ArenaId;

    #[test]
    fn mint_and_resolve_signal() {
        let mut reg = HandleRegistry::new();
        let h = reg.mint_signal(SignalId::from_raw(3));
        assert_eq!(h.kind(), ObjectKind::Signal);
        assert_eq!(reg.resolve_signal(h).unwrap(), SignalId::from_raw(3));
    }

    #[test]
    fn release_invalidates() {
        let mut reg = HandleRegistry::new();
        let h = reg.mint_signal(SignalId::from_raw(0));
        assert_eq!(reg.release(h).unwrap(), Released::Signal(SignalId::from_raw(0)));
        assert!(matches!(
            reg.resolve_signal(h),
            Err(HpiError::InvalidHandle { .. })
        ));
    }

    #[test]
    fn double_release_reports() {
        let mut reg = HandleRegistry::new();
        let h = reg.mint_root();
        reg.release(h).unwrap();
        assert!(matches!(
            reg.release(h),
            Err(HpiError::InvalidHandle { .. })
        ));
    }

    #[test]
    fn reused_slot_rejects_stale_handle() {
        let mut reg = HandleRegistry::new();
        let old = reg.mint_signal(SignalId::from_raw(1));
        reg.release(old).unwrap();
        let new = reg.mint_signal(SignalId::from_raw(2));
        // Same slot, new generation
        assert_eq!(reg.resolve_signal(new).unwrap(), SignalId::from_raw(2));
        assert!(reg.resolve_signal(old).is_err());
    }

    #[test]
    fn wrong_kind_rejected() {
        let mut reg = HandleRegistry::new();
        let root = reg.mint_root();
        assert!(matches!(
            reg.resolve_signal(root),
            Err(HpiError::InvalidHandle { .. })
        ));
        let sig = reg.mint_signal(SignalId::from_raw(0));
        assert!(reg.resolve_root(sig).is_err());
        assert!(reg.resolve_callback(sig).is_err());
    }

    #[test]
    fn independent_root_handles() {
        let mut reg = HandleRegistry::new();
        let a = reg.mint_root();
        let b = reg.mint_root();
        assert_ne!(a, b);
        reg.release(a).unwrap();
        // Releasing one root handle leaves the other usable
        assert!(reg.resolve_root(b).is_ok());
    }

    #[test]
    fn callback_release_returns_registration() {
        let mut reg = HandleRegistry::new();
        let h = reg.mint_callback(CallbackId::from_raw(5));
        assert_eq!(
            reg.release(h).unwrap(),
            Released::Callback(CallbackId::from_raw(5))
        );
    }

    #[test]
    fn display_forms() {
        let mut reg = HandleRegistry::new();
        let h = reg.mint_signal(SignalId::from_raw(0));
        assert_eq!(h.to_string(), "signal#0.0");
        assert_eq!(ObjectKind::Callback.to_string(), "callback");
    }

    #[test]
    fn serde_roundtrip() {
        let mut reg = HandleRegistry::new();
        let h = reg.mint_root();
        let json = serde_json::to_string(&h).unwrap();
        let back: Handle = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}
