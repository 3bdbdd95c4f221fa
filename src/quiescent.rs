//! Quiescence-based deferred reclamation.
//!
//! Every pop registers itself in an in-flight counter before reading the
//! head, so a node can only be freed when the counter shows no other pop is
//! running. Nodes unlinked under contention are parked on a retirement list
//! (a separate intrusive list with its own atomic head, never mixed up with
//! the stack head) and freed in a burst by whichever pop later observes
//! itself as the last one standing.

use core::ptr;
use core::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crossbeam_utils::{Backoff, CachePadded};

use crate::slot::ValueSlot;
use crate::stack::RawStack;

struct Node<T> {
    value: ValueSlot<T>,
    /// Successor in the stack; doubles as the retirement-list link once the
    /// node has been unlinked.
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn alloc(value: T) -> *mut Self {
        Box::into_raw(Box::new(Self {
            value: ValueSlot::new(value),
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

/// Treiber stack with quiescence-deferred node reclamation.
pub struct QuiescentStack<T> {
    head: CachePadded<AtomicPtr<Node<T>>>,
    /// Number of threads currently inside `pop`, each potentially holding a
    /// raw reference to an already-unlinked node.
    in_flight: CachePadded<AtomicUsize>,
    /// Nodes unlinked while other pops were in flight, awaiting a quiescent
    /// moment.
    retired: CachePadded<AtomicPtr<Node<T>>>,
}

// SAFETY: all shared mutation goes through atomics; values of T cross
// threads by move, so `T: Send` suffices.
unsafe impl<T: Send> Send for QuiescentStack<T> {}
unsafe impl<T: Send> Sync for QuiescentStack<T> {}

impl<T: Send> RawStack<T> for QuiescentStack<T> {
    fn new() -> Self {
        Self {
            head: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
            in_flight: CachePadded::new(AtomicUsize::new(0)),
            retired: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
        }
    }

    fn push(&self, value: T) {
        let node = Node::alloc(value);
        let backoff = Backoff::new();
        // Relaxed is enough here: the release CAS below publishes the node
        // body together with the link.
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            // Not yet published; this thread still owns the allocation.
            unsafe { (*node).next.store(head, Ordering::Relaxed) };
            match self
                .head
                .compare_exchange_weak(head, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(observed) => {
                    head = observed;
                    backoff.spin();
                }
            }
        }
    }

    fn pop(&self) -> Option<T> {
        // Register before touching the head: from this point no node this
        // thread could observe will be freed by anyone else.
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        let backoff = Backoff::new();
        // SeqCst, not merely Acquire: this load must sit in the single total
        // order with the registration above and with the unlinker's CAS, or a
        // concurrent pop could both miss our registration and still hand us
        // the node it is about to free.
        let mut head = self.head.load(Ordering::SeqCst);
        loop {
            if head.is_null() {
                break;
            }
            // The in-flight registration keeps `head` dereferenceable even if
            // another pop has already unlinked it.
            let next = unsafe { (*head).next.load(Ordering::Relaxed) };
            // SeqCst success so the unlink is ordered before this thread's
            // later in-flight read in `retire`; any pop registered before
            // that read either sees the new head or is counted.
            match self
                .head
                .compare_exchange_weak(head, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => break,
                Err(observed) => {
                    head = observed;
                    backoff.spin();
                }
            }
        }

        let value = if head.is_null() {
            None
        } else {
            // SAFETY: winning the CAS made this thread the unique unlinker.
            unsafe { (*head).value.take() }
        };
        self.retire(head);
        value
    }

    fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed).is_null()
    }
}

impl<T> QuiescentStack<T> {
    /// Hands an unlinked node (possibly null, for a pop that found the stack
    /// empty) to the reclamation machinery and deregisters this pop.
    fn retire(&self, node: *mut Node<T>) {
        // SeqCst keeps this read in the single total order with every pop's
        // entry registration and unlink CAS: reading 1 here proves that any
        // pop registered before our unlink has already deregistered, and any
        // pop registered after it cannot have observed the unlinked node.
        // Weaker orderings admit a store-buffering schedule where both sides
        // miss each other and a held node gets freed.
        if self.in_flight.load(Ordering::SeqCst) == 1 {
            // No other pop in flight: nothing else can be holding a reference
            // to any unlinked node right now. Claim the parked list; the
            // full-order swap pairs with the release chaining of the threads
            // that parked it, ordering their value extractions before any
            // free below.
            let claimed = self.retired.swap(ptr::null_mut(), Ordering::SeqCst);
            if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                // Still quiescent after our own exit; the claimed nodes go.
                // SAFETY: list was swapped out, no thread can reach it.
                unsafe { free_chain(claimed) };
            } else if !claimed.is_null() {
                // Another pop slipped in during the window. It cannot hold
                // references into the claimed list (the list was unreachable
                // before that pop began), but the count no longer proves
                // quiescence, so park the list again.
                // SAFETY: we own the claimed chain.
                unsafe { self.chain_retired_list(claimed) };
            }
            if !node.is_null() {
                // Unlinked while we were the only pop in flight; any pop that
                // started since registered after the unlink and can never
                // have observed this node.
                // SAFETY: sole owner, value slot already emptied.
                unsafe { drop(Box::from_raw(node)) };
            }
        } else {
            if !node.is_null() {
                // SAFETY: we own the freshly unlinked node.
                unsafe { self.chain_retired(node, node) };
            }
            // Full order, same reasoning as the entry registration: our value
            // extraction must be ordered before whichever later pop frees the
            // node we just parked, and our deregistration must be visible to
            // any unlinker deciding whether it is alone.
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Parks the chain `first..=last` at the front of the retirement list.
    ///
    /// # Safety
    ///
    /// Caller must own the chain; every node on it must be unreachable from
    /// the stack head.
    unsafe fn chain_retired(&self, first: *mut Node<T>, last: *mut Node<T>) {
        let mut head = self.retired.load(Ordering::Relaxed);
        loop {
            // SAFETY: `last` is owned by the caller until the CAS succeeds.
            unsafe { (*last).next.store(head, Ordering::Relaxed) };
            match self.retired.compare_exchange_weak(
                head,
                first,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => head = observed,
            }
        }
    }

    /// Parks an entire claimed list, locating its tail first.
    ///
    /// # Safety
    ///
    /// Same contract as [`chain_retired`](Self::chain_retired).
    unsafe fn chain_retired_list(&self, first: *mut Node<T>) {
        let mut last = first;
        loop {
            // SAFETY: the chain is owned by the caller.
            let next = unsafe { (*last).next.load(Ordering::Relaxed) };
            if next.is_null() {
                break;
            }
            last = next;
        }
        // SAFETY: forwarded caller contract.
        unsafe { self.chain_retired(first, last) };
    }
}

impl<T> Drop for QuiescentStack<T> {
    fn drop(&mut self) {
        // Exclusive access: free the live chain (dropping any values still in
        // their slots), then release the backend-held retirement list.
        unsafe {
            free_chain(self.head.load(Ordering::Relaxed));
            free_chain(self.retired.load(Ordering::Relaxed));
        }
    }
}

/// Frees `first` and every node chained after it.
///
/// # Safety
///
/// Caller must own the whole chain; no node on it may be reachable by any
/// other thread.
unsafe fn free_chain<T>(first: *mut Node<T>) {
    let mut node = first;
    while !node.is_null() {
        // SAFETY: exclusive ownership of the chain.
        let boxed = unsafe { Box::from_raw(node) };
        node = boxed.next.load(Ordering::Relaxed);
    }
}
