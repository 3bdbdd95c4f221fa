//! Public stack facade and reclamation backend selection.

use crate::counted::CountedStack;
use crate::quiescent::QuiescentStack;

mod private {
    pub trait Sealed {}

    impl Sealed for super::Quiescent {}
    impl Sealed for super::CountedRef {}
}

/// Backend-facing stack surface. Not part of the public API.
#[doc(hidden)]
#[allow(missing_docs)]
pub trait RawStack<T>: Send + Sync {
    fn new() -> Self;
    fn push(&self, value: T);
    fn pop(&self) -> Option<T>;
    fn is_empty(&self) -> bool;
}

/// Memory reclamation policy for a [`Stack`].
///
/// The backend decides when the memory of an unlinked node is released; it
/// never changes what `push` and `pop` return. This trait is sealed.
pub trait Backend: private::Sealed {
    #[doc(hidden)]
    type Raw<T: Send>: RawStack<T>;
}

/// Quiescence-based deferred reclamation (the default).
///
/// Every pop registers itself in an in-flight counter before touching the
/// head. A node unlinked while other pops are in flight is parked on a
/// retirement list; the pop that later observes itself as the only one
/// running frees the whole list in one burst.
///
/// Known liveness caveat, inherited by design: under sustained pop traffic
/// the in-flight counter may never return to one, so the retirement list can
/// grow without bound. Reclamation is deferred, never skipped.
pub enum Quiescent {}

/// Split external/internal reference counting.
///
/// The head word carries an external count next to the node pointer; every
/// read of the head bumps it, claiming a reference before the pointer is
/// dereferenced. Threads give claims back by adjusting a signed internal
/// count on the node, and the node is freed by exactly one thread the moment
/// the two counts cancel out. No global quiescence point is needed, so
/// memory release is prompt even under constant contention.
pub enum CountedRef {}

impl Backend for Quiescent {
    type Raw<T: Send> = QuiescentStack<T>;
}

impl Backend for CountedRef {
    type Raw<T: Send> = CountedStack<T>;
}

/// Lock-free multi-producer/multi-consumer LIFO stack.
///
/// Pushes and pops are linearizable: each pop returns the value installed by
/// the latest preceding successful push in the total order of head updates.
/// Contention is absorbed by CAS retry loops; neither operation blocks on a
/// lock or surfaces an error.
///
/// Dropping the stack frees every node still linked (including any the
/// backend is holding for deferred reclamation) and runs each remaining
/// value's destructor exactly once.
pub struct Stack<T: Send, B: Backend = Quiescent> {
    raw: B::Raw<T>,
}

impl<T: Send, B: Backend> Stack<T, B> {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self {
            raw: <B::Raw<T> as RawStack<T>>::new(),
        }
    }

    /// Pushes a value onto the top of the stack.
    ///
    /// Never fails; a lost CAS race is retried with fresh state.
    pub fn push(&self, value: T) {
        self.raw.push(value);
    }

    /// Removes and returns the most recently pushed value, or `None` if the
    /// stack was empty at the linearization point. Never blocks.
    pub fn pop(&self) -> Option<T> {
        self.raw.pop()
    }

    /// Whether the stack was empty at the moment the head was sampled.
    ///
    /// Purely a snapshot: concurrent pushes and pops may have changed the
    /// answer by the time it is returned.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl<T: Send, B: Backend> Default for Stack<T, B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send, B: Backend> core::fmt::Debug for Stack<T, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stack").finish_non_exhaustive()
    }
}
