//! Value-ownership plumbing shared by the reclamation backends.

use core::cell::UnsafeCell;

/// Owning slot for a node's value.
///
/// The thread that unlinks a node moves the value out through [`take`],
/// leaving the slot empty. Destruction of the value is thereby decoupled
/// from deallocation of the node: the value drops exactly once no matter how
/// long the backend defers freeing the node's memory, and a node freed with
/// its slot still full (drain on stack drop) drops the value then.
///
/// [`take`]: ValueSlot::take
pub(crate) struct ValueSlot<T> {
    value: UnsafeCell<Option<T>>,
}

impl<T> ValueSlot<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            value: UnsafeCell::new(Some(value)),
        }
    }

    /// Moves the value out, leaving the slot empty.
    ///
    /// # Safety
    ///
    /// Only the thread whose CAS unlinked the owning node may call this, and
    /// at most once; no other thread may access the slot concurrently.
    pub(crate) unsafe fn take(&self) -> Option<T> {
        // SAFETY: the unique unlinker has exclusive access to the slot.
        unsafe { (*self.value.get()).take() }
    }
}
