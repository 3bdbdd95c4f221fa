//! Reusable spinning barrier.

use core::sync::atomic::{AtomicU32, Ordering};

use crossbeam_utils::Backoff;

/// Cyclic barrier for a fixed group of spinning threads.
///
/// Unlike `std::sync::Barrier`, waiters never park in the kernel: they spin
/// (with exponential backoff) on a generation counter, which keeps wakeup
/// latency low for short rendezvous intervals. The barrier resets itself
/// after each round, and a participant can permanently [`leave`] the group,
/// shrinking the quorum for all subsequent rounds.
///
/// [`leave`]: Barrier::leave
pub struct Barrier {
    /// Threads still participating.
    count: AtomicU32,
    /// Participants that have not yet arrived in the current round.
    spaces: AtomicU32,
    /// Completed rounds.
    generation: AtomicU32,
}

impl Barrier {
    /// Creates a barrier for a group of `threads` participants.
    ///
    /// # Panics
    ///
    /// Panics if `threads` is zero.
    pub fn new(threads: u32) -> Self {
        assert!(threads > 0, "barrier needs at least one participant");
        Self {
            count: AtomicU32::new(threads),
            spaces: AtomicU32::new(threads),
            generation: AtomicU32::new(0),
        }
    }

    /// Blocks (spinning) until every participating thread has arrived.
    pub fn wait(&self) {
        let generation = self.generation.load(Ordering::Acquire);
        if self.spaces.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Last arrival: rearm for the next round, then open the gate.
            // The release on `generation` orders the rearm before any waiter
            // re-enters `wait`.
            self.spaces
                .store(self.count.load(Ordering::Relaxed), Ordering::Relaxed);
            self.generation.fetch_add(1, Ordering::Release);
        } else {
            let backoff = Backoff::new();
            while self.generation.load(Ordering::Acquire) == generation {
                backoff.snooze();
            }
        }
    }

    /// Permanently removes the calling thread from the group.
    ///
    /// The current and all subsequent rounds complete without it; if it was
    /// the last arrival the group was waiting on, the round completes now.
    pub fn leave(&self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
        if self.spaces.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.spaces
                .store(self.count.load(Ordering::Relaxed), Ordering::Relaxed);
            self.generation.fetch_add(1, Ordering::Release);
        }
    }
}
