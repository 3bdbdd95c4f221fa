//! High-contention stress for both reclamation backends.
//!
//! These runs exist to shake out use-after-free and double-free schedules;
//! the drop-tally assertions catch a value destroyed twice or not at all.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use rand::Rng;

use cairn::{Backend, CountedRef, Quiescent, Stack};

/// Canary folded into every value; a mismatch at drop time means the node
/// was scribbled over (use-after-free) or dropped twice.
const CANARY: usize = 0x5ca1_ab1e;

struct DropTally {
    tag: usize,
    check: usize,
    drops: Arc<AtomicUsize>,
}

impl DropTally {
    fn new(tag: usize, drops: Arc<AtomicUsize>) -> Self {
        Self {
            tag,
            check: tag ^ CANARY,
            drops,
        }
    }
}

impl Drop for DropTally {
    fn drop(&mut self) {
        assert_eq!(self.check, self.tag ^ CANARY, "tally corrupted before drop");
        // Poison so a double drop trips the assertion above.
        self.check = !self.check;
        self.drops.fetch_add(1, Ordering::Release);
    }
}

/// 8 threads x 10k ops of mixed push/pop hammering one stack.
fn mixed_contention<B: Backend>() {
    const THREADS: usize = 8;
    const OPS: usize = 10_000;

    let drops = Arc::new(AtomicUsize::new(0));
    let pushed = AtomicUsize::new(0);
    let popped = AtomicUsize::new(0);

    let start = Instant::now();
    {
        let stack: Stack<DropTally, B> = Stack::new();
        thread::scope(|scope| {
            for tid in 0..THREADS {
                let stack = &stack;
                let drops = &drops;
                let pushed = &pushed;
                let popped = &popped;
                scope.spawn(move || {
                    for i in 0..OPS {
                        if i % 3 == 0 {
                            stack.push(DropTally::new(tid * OPS + i, drops.clone()));
                            pushed.fetch_add(1, Ordering::Relaxed);
                        } else if stack.pop().is_some() {
                            popped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });
    }

    let total_pushed = pushed.load(Ordering::Relaxed);
    let total_popped = popped.load(Ordering::Relaxed);
    assert!(total_popped <= total_pushed);
    // Every pushed value dropped exactly once: popped ones when their tally
    // left scope, the rest when the stack drained on drop.
    assert_eq!(drops.load(Ordering::Acquire), total_pushed);

    println!(
        "mixed contention: {} ops in {:?}",
        THREADS * OPS,
        start.elapsed()
    );
}

#[test]
#[cfg_attr(miri, ignore)]
fn mixed_contention_quiescent() {
    mixed_contention::<Quiescent>();
}

#[test]
#[cfg_attr(miri, ignore)]
fn mixed_contention_counted() {
    mixed_contention::<CountedRef>();
}

/// More threads than cores, so pops routinely get preempted mid-claim.
fn oversubscribed<B: Backend>() {
    let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    let threads = cores * 4;
    const OPS: usize = 5_000;

    let drops = Arc::new(AtomicUsize::new(0));
    let pushed = AtomicUsize::new(0);
    {
        let stack: Stack<DropTally, B> = Stack::new();
        thread::scope(|scope| {
            for tid in 0..threads {
                let stack = &stack;
                let drops = &drops;
                let pushed = &pushed;
                scope.spawn(move || {
                    for i in 0..OPS {
                        if i % 2 == 0 {
                            stack.push(DropTally::new(tid * OPS + i, drops.clone()));
                            pushed.fetch_add(1, Ordering::Relaxed);
                        } else {
                            let _ = stack.pop();
                        }
                    }
                });
            }
        });
    }
    assert_eq!(drops.load(Ordering::Acquire), pushed.load(Ordering::Relaxed));
}

#[test]
#[cfg_attr(miri, ignore)]
fn oversubscribed_quiescent() {
    oversubscribed::<Quiescent>();
}

#[test]
#[cfg_attr(miri, ignore)]
fn oversubscribed_counted() {
    oversubscribed::<CountedRef>();
}

/// Randomized op mix; schedules differ every run.
fn randomized_schedule<B: Backend>() {
    const THREADS: usize = 8;
    const OPS: usize = 10_000;

    let drops = Arc::new(AtomicUsize::new(0));
    let pushed = AtomicUsize::new(0);
    {
        let stack: Stack<DropTally, B> = Stack::new();
        thread::scope(|scope| {
            for tid in 0..THREADS {
                let stack = &stack;
                let drops = &drops;
                let pushed = &pushed;
                scope.spawn(move || {
                    let mut rng = rand::rng();
                    for i in 0..OPS {
                        if rng.random_bool(0.5) {
                            stack.push(DropTally::new(tid * OPS + i, drops.clone()));
                            pushed.fetch_add(1, Ordering::Relaxed);
                        } else {
                            let _ = stack.pop();
                        }
                        if rng.random_ratio(1, 64) {
                            thread::yield_now();
                        }
                    }
                });
            }
        });
    }
    assert_eq!(drops.load(Ordering::Acquire), pushed.load(Ordering::Relaxed));
}

#[test]
#[cfg_attr(miri, ignore)]
fn randomized_schedule_quiescent() {
    randomized_schedule::<Quiescent>();
}

#[test]
#[cfg_attr(miri, ignore)]
fn randomized_schedule_counted() {
    randomized_schedule::<CountedRef>();
}

/// Pop-only storm against a pre-filled stack: maximum pressure on the
/// reclamation path with zero push interference.
fn pop_storm<B: Backend>() {
    const THREADS: usize = 8;
    const VALUES: usize = 40_000;

    let drops = Arc::new(AtomicUsize::new(0));
    let popped = AtomicUsize::new(0);
    {
        let stack: Stack<DropTally, B> = Stack::new();
        for i in 0..VALUES {
            stack.push(DropTally::new(i, drops.clone()));
        }
        thread::scope(|scope| {
            for _ in 0..THREADS {
                let stack = &stack;
                let popped = &popped;
                scope.spawn(move || {
                    while stack.pop().is_some() {
                        popped.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
    }
    assert_eq!(popped.load(Ordering::Relaxed), VALUES);
    assert_eq!(drops.load(Ordering::Acquire), VALUES);
}

/// Tiny stacks drained by a pair of racing poppers, round after round: the
/// window where one pop unlinks and retires a node while the other is still
/// between registering and reading the head is hit on nearly every round.
/// A node freed while its sibling pop still holds it shows up as a canary
/// failure or a drop-count mismatch.
fn unlink_retire_race<B: Backend>() {
    const ROUNDS: usize = 2_000;
    const POPPERS: usize = 2;
    const VALUES: usize = 4;

    let drops = Arc::new(AtomicUsize::new(0));
    for round in 0..ROUNDS {
        let stack: Stack<DropTally, B> = Stack::new();
        for i in 0..VALUES {
            stack.push(DropTally::new(round * VALUES + i, drops.clone()));
        }
        thread::scope(|scope| {
            for _ in 0..POPPERS {
                let stack = &stack;
                scope.spawn(move || while stack.pop().is_some() {});
            }
        });
    }
    assert_eq!(drops.load(Ordering::Acquire), ROUNDS * VALUES);
}

#[test]
#[cfg_attr(miri, ignore)]
fn unlink_retire_race_quiescent() {
    unlink_retire_race::<Quiescent>();
}

#[test]
#[cfg_attr(miri, ignore)]
fn unlink_retire_race_counted() {
    unlink_retire_race::<CountedRef>();
}

#[test]
#[cfg_attr(miri, ignore)]
fn pop_storm_quiescent() {
    pop_storm::<Quiescent>();
}

#[test]
#[cfg_attr(miri, ignore)]
fn pop_storm_counted() {
    pop_storm::<CountedRef>();
}
