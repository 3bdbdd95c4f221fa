//! Self-contained parallelism utilities: a reusable spinning barrier, two
//! flavors of parallel slice reduction, and a fixed-size task-queue thread
//! pool.
//!
//! These are siblings of the `cairn` stack crate, not collaborators; nothing
//! here touches the stack or its reclamation machinery.

#![warn(missing_docs)]

pub mod barrier;
pub mod pool;
pub mod reduce;

pub use barrier::Barrier;
pub use pool::ThreadPool;
pub use reduce::{reduce, reduce_split};
