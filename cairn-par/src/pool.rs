//! Fixed-size task-queue thread pool.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct State {
    tasks: VecDeque<Task>,
    done: bool,
}

struct Shared {
    state: Mutex<State>,
    available: Condvar,
}

/// Fixed-size pool of worker threads draining a shared FIFO of tasks.
///
/// Workers sleep on a condvar while the queue is empty. Dropping the pool
/// signals shutdown, lets the workers finish every task already submitted,
/// and joins them; tasks submitted after the drop began are never picked up.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let pool = cairn_par::ThreadPool::new(4);
/// let hits = Arc::new(AtomicUsize::new(0));
/// for _ in 0..16 {
///     let hits = hits.clone();
///     pool.submit(move || {
///         hits.fetch_add(1, Ordering::Relaxed);
///     });
/// }
/// drop(pool); // waits for all 16 tasks
/// assert_eq!(hits.load(Ordering::Relaxed), 16);
/// ```
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawns a pool with `workers` threads.
    ///
    /// # Panics
    ///
    /// Panics if `workers` is zero.
    pub fn new(workers: usize) -> Self {
        assert!(workers > 0, "thread pool needs at least one worker");
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                tasks: VecDeque::new(),
                done: false,
            }),
            available: Condvar::new(),
        });
        let workers = (0..workers)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || worker(shared))
            })
            .collect();
        Self { shared, workers }
    }

    /// Queues `task` for execution on some worker thread.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.tasks.push_back(Box::new(task));
        }
        self.shared.available.notify_one();
    }
}

fn worker(shared: Arc<Shared>) {
    let mut state = shared.state.lock().unwrap();
    loop {
        if let Some(task) = state.tasks.pop_front() {
            // Run the task unlocked so other workers keep draining.
            drop(state);
            task();
            state = shared.state.lock().unwrap();
        } else if state.done {
            break;
        } else {
            state = shared.available.wait(state).unwrap();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.done = true;
        }
        self.shared.available.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
