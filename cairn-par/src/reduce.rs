//! Parallel fold over slices.

use std::thread;

/// Minimum number of items worth handing to a worker thread; below this the
/// spawn overhead dominates and the fold runs sequentially.
const MIN_PER_THREAD: usize = 25;

/// Folds `op` over `items` with one thread per chunk.
///
/// The chunk count is derived from the available parallelism, capped so that
/// every chunk holds at least [`MIN_PER_THREAD`] items; the calling thread
/// folds the final chunk itself instead of idling. Each chunk is folded from
/// `T::default()`, and the per-chunk results are folded into `init` in slice
/// order, so `op` must be associative (with `T::default()` as identity) for
/// the result to match a sequential fold.
///
/// # Examples
///
/// ```
/// let items: Vec<u64> = (1..=1000).collect();
/// let sum = cairn_par::reduce(&items, 0u64, |acc, x| acc + x);
/// assert_eq!(sum, 500_500);
/// ```
pub fn reduce<T, F>(items: &[T], init: T, op: F) -> T
where
    T: Default + Clone + Send + Sync,
    F: Fn(T, &T) -> T + Sync,
{
    if items.is_empty() {
        return init;
    }

    let max_threads = (items.len() + MIN_PER_THREAD - 1) / MIN_PER_THREAD;
    let hardware = thread::available_parallelism().map(|n| n.get()).unwrap_or(2);
    let num_threads = hardware.min(max_threads);
    let block_size = items.len() / num_threads;

    // One slot per spawned worker; the calling thread's own chunk folds into
    // a plain local instead.
    let mut partials = vec![T::default(); num_threads - 1];

    let last = thread::scope(|scope| {
        for (i, partial) in partials.iter_mut().enumerate() {
            let block = &items[i * block_size..(i + 1) * block_size];
            let op = &op;
            scope.spawn(move || {
                *partial = block.iter().fold(T::default(), |acc, item| op(acc, item));
            });
        }
        // The calling thread takes the final chunk, remainder included.
        let tail = &items[(num_threads - 1) * block_size..];
        tail.iter().fold(T::default(), |acc, item| op(acc, item))
    });

    let acc = partials.into_iter().fold(init, |acc, partial| op(acc, &partial));
    op(acc, &last)
}

/// Folds `op` over `items` by recursive halving.
///
/// Slices of at most [`MIN_PER_THREAD`] items are folded sequentially;
/// larger ones split in the middle, with a scoped thread folding the first
/// half while the caller recurses into the second. `init` flows into the
/// first half only, so the same associativity requirement as [`reduce`]
/// applies. A panic in either half propagates to the caller.
///
/// # Examples
///
/// ```
/// let items: Vec<u64> = (1..=1000).collect();
/// let sum = cairn_par::reduce_split(&items, 0u64, &|acc, x| acc + x);
/// assert_eq!(sum, 500_500);
/// ```
pub fn reduce_split<T, F>(items: &[T], init: T, op: &F) -> T
where
    T: Default + Send + Sync,
    F: Fn(T, &T) -> T + Sync,
{
    if items.len() <= MIN_PER_THREAD {
        return items.iter().fold(init, |acc, item| op(acc, item));
    }

    let (first, second) = items.split_at(items.len() / 2);
    thread::scope(|scope| {
        let first_half = scope.spawn(move || reduce_split(first, init, op));
        let second_res = reduce_split(second, T::default(), op);
        let first_res = match first_half.join() {
            Ok(value) => value,
            Err(payload) => std::panic::resume_unwind(payload),
        };
        op(first_res, &second_res)
    })
}
