//! Treiber stack demo: both reclamation backends under single- and
//! multi-threaded use.
//!
//! Run with: cargo run --example treiber

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use cairn::{Backend, CountedRef, Quiescent, Stack};

fn exercise<B: Backend + 'static>(label: &str) {
    println!("{label}:");

    // Single-threaded sanity.
    let stack: Stack<i32, B> = Stack::new();
    stack.push(1);
    stack.push(2);
    stack.push(3);
    assert_eq!(stack.pop(), Some(3));
    assert_eq!(stack.pop(), Some(2));
    assert_eq!(stack.pop(), Some(1));
    assert_eq!(stack.pop(), None);
    println!("  push/pop LIFO order holds");

    // Multi-threaded mixed workload.
    const THREADS: usize = 8;
    const OPS: usize = 50_000;

    let stack: Stack<usize, B> = Stack::new();
    let start = Instant::now();
    thread::scope(|scope| {
        for tid in 0..THREADS {
            let stack = &stack;
            scope.spawn(move || {
                for i in 0..OPS {
                    if i % 3 == 0 {
                        stack.push(tid * OPS + i);
                    } else {
                        stack.pop();
                    }
                }
            });
        }
    });
    let elapsed = start.elapsed();
    let throughput = (THREADS * OPS) as f64 / elapsed.as_secs_f64();
    println!(
        "  {} threaded ops in {:?} ({:.0} ops/sec)",
        THREADS * OPS,
        elapsed,
        throughput
    );
}

fn main() {
    exercise::<Quiescent>("quiescence-based reclamation");
    exercise::<CountedRef>("split reference counting");

    // Shared across threads via Arc, like any Sync collection.
    let stack: Arc<Stack<String>> = Arc::new(Stack::new());
    let mut handles = Vec::new();
    for tid in 0..4 {
        let stack = Arc::clone(&stack);
        handles.push(thread::spawn(move || {
            stack.push(format!("thread-{tid}"));
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    let mut drained = 0;
    while stack.pop().is_some() {
        drained += 1;
    }
    println!("arc-shared stack drained {drained} values");
}
