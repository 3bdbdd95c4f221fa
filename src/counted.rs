//! Split reference-counting reclamation.
//!
//! A node's liveness is tracked by two counters that are reconciled lazily:
//! the *external* count rides in the packed head word and is bumped by every
//! thread that reads the head, while the *internal* count on the node (a
//! signed integer, free to go negative) absorbs the adjustments when those
//! references are handed back. Whichever thread observes the counts cancel
//! frees the node, immediately and exactly once; no quiescence point is ever
//! needed.

use core::sync::atomic::{AtomicI64, Ordering};

use crossbeam_utils::{Backoff, CachePadded};

use crate::head::{Counted, CountedHead};
use crate::slot::ValueSlot;
use crate::stack::RawStack;

struct Node<T> {
    value: ValueSlot<T>,
    /// Pending reference adjustments for this node.
    internal: AtomicI64,
    /// Head snapshot captured at link time. Written only while the pushing
    /// thread still owns the allocation; read-only once published.
    next: Counted<Node<T>>,
}

impl<T> Node<T> {
    fn alloc(value: T) -> *mut Self {
        Box::into_raw(Box::new(Self {
            value: ValueSlot::new(value),
            internal: AtomicI64::new(0),
            next: Counted::null(),
        }))
    }
}

/// Treiber stack with split external/internal reference counting.
pub struct CountedStack<T> {
    head: CachePadded<CountedHead<Node<T>>>,
}

// SAFETY: all shared mutation goes through the atomic head word and the
// per-node atomic count; values of T cross threads by move.
unsafe impl<T: Send> Send for CountedStack<T> {}
unsafe impl<T: Send> Sync for CountedStack<T> {}

impl<T: Send> RawStack<T> for CountedStack<T> {
    fn new() -> Self {
        Self {
            head: CachePadded::new(CountedHead::null()),
        }
    }

    fn push(&self, value: T) {
        let node = Node::alloc(value);
        let backoff = Backoff::new();
        // Relaxed read: the release CAS publishes the node body and its link
        // together.
        let mut current = self.head.load(Ordering::Relaxed);
        loop {
            // Not yet published; this thread still owns the allocation.
            unsafe { (*node).next = current };
            // A fresh node starts with one external reference: the stack's
            // own link to it.
            let new = Counted { external: 1, ptr: node };
            match self
                .head
                .compare_exchange_weak(current, new, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(observed) => {
                    current = observed;
                    backoff.spin();
                }
            }
        }
    }

    fn pop(&self) -> Option<T> {
        let backoff = Backoff::new();
        let mut current = self.head.load(Ordering::Relaxed);
        loop {
            // Claim a reference before dereferencing: the external bump keeps
            // the node alive even if another pop unlinks it underneath us.
            current = self.claim(current);
            let node = current.ptr;
            if node.is_null() {
                return None;
            }
            // SAFETY: our claim pins the node; `next` is immutable after
            // publication.
            let next = unsafe { (*node).next };
            // Relaxed suffices for the unlink itself: visibility of the node
            // body was already established by the acquire in `claim`, and the
            // release on the internal count below orders the extraction
            // against the eventual free.
            match self
                .head
                .compare_exchange(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => {
                    // SAFETY: the successful CAS made this thread the unique
                    // unlinker.
                    let value = unsafe { (*node).value.take() };
                    // Fold the leftover external references into the node's
                    // internal count: subtract one for the claim this thread
                    // is retiring and one for the baseline holder the
                    // external count always carries (the stack's own link).
                    let leftover = current.external - 2;
                    // Release pairs with the acquire performed by whichever
                    // thread frees the node, so the value extraction above
                    // can never be reordered past the free.
                    // SAFETY: node stays allocated until the counts cancel.
                    let prior =
                        unsafe { (*node).internal.fetch_add(leftover, Ordering::Release) };
                    if prior == -leftover {
                        // Count collapsed to zero: every other claimant had
                        // already handed its reference back. This add was the
                        // last reference; the RMW read of the final
                        // decrementer's value carries the needed ordering.
                        // SAFETY: total reference count is zero, sole owner.
                        unsafe { drop(Box::from_raw(node)) };
                    }
                    return value;
                }
                Err(observed) => {
                    // Lost the race: hand this thread's claim back.
                    // SAFETY: the claim keeps the node valid until this
                    // decrement lands.
                    let prior = unsafe { (*node).internal.fetch_sub(1, Ordering::Relaxed) };
                    if prior == 1 {
                        // Ours was the last outstanding reference. Acquire
                        // pairs with the unlinker's release so its value
                        // extraction is complete before the free.
                        // SAFETY: node still allocated; count now zero.
                        unsafe {
                            let _ = (*node).internal.load(Ordering::Acquire);
                            drop(Box::from_raw(node));
                        }
                    }
                    current = observed;
                    backoff.spin();
                }
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed).ptr.is_null()
    }
}

impl<T> CountedStack<T> {
    /// Bumps the external half of the head word, claiming a reference to the
    /// current top node so it cannot be freed out from under the caller.
    ///
    /// Returns the claimed snapshot (count already incremented).
    fn claim(&self, mut current: Counted<Node<T>>) -> Counted<Node<T>> {
        loop {
            let new = Counted {
                external: current.external + 1,
                ptr: current.ptr,
            };
            // Acquire on success: the node body published by the pushing CAS
            // must be visible before the pointer is dereferenced. Failure
            // changes nothing, so relaxed.
            match self
                .head
                .compare_exchange_weak(current, new, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => return new,
                Err(observed) => current = observed,
            }
        }
    }
}

impl<T> Drop for CountedStack<T> {
    fn drop(&mut self) {
        // Exclusive access: walk the chain and free every node still linked,
        // dropping any value still in its slot.
        let mut node = self.head.load(Ordering::Relaxed).ptr;
        while !node.is_null() {
            // SAFETY: no other thread can reach the stack during drop.
            let boxed = unsafe { Box::from_raw(node) };
            node = boxed.next.ptr;
        }
    }
}
