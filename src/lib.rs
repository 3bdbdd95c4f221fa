//! Cairn: a lock-free LIFO stack with interchangeable memory reclamation.
//!
//! [`Stack`] is a multi-producer/multi-consumer Treiber stack. Both `push`
//! and `pop` are compare-and-swap retry loops: no operation ever takes a
//! lock, and a failed CAS is a benign race that is retried, never an error.
//!
//! The hard part of such a stack is not the CAS loop but deciding *when* an
//! unlinked node may be freed while other threads may still be dereferencing
//! it. Cairn ships two interchangeable answers, selected by a type parameter
//! and invisible to callers except in memory-release timing:
//!
//! - [`Quiescent`] (the default): unlinked nodes are parked on a retirement
//!   list while any other pop is in flight and freed in bursts by whichever
//!   pop later finds itself alone.
//! - [`CountedRef`]: every read of the head claims a reference by bumping a
//!   count packed next to the pointer in a 128-bit head word; a node is freed
//!   the instant its outstanding references collapse to zero.
//!
//! # Example
//!
//! ```
//! use cairn::{CountedRef, Stack};
//!
//! // Quiescence-based reclamation (default backend).
//! let stack: Stack<i32> = Stack::new();
//! stack.push(1);
//! stack.push(2);
//! assert_eq!(stack.pop(), Some(2));
//! assert_eq!(stack.pop(), Some(1));
//! assert_eq!(stack.pop(), None);
//!
//! // Split reference counting.
//! let counted: Stack<&str, CountedRef> = Stack::new();
//! counted.push("top");
//! assert_eq!(counted.pop(), Some("top"));
//! ```

#![warn(missing_docs)]
#![warn(unsafe_op_in_unsafe_fn)]

mod counted;
mod head;
mod quiescent;
mod slot;
mod stack;

pub use stack::{Backend, CountedRef, Quiescent, Stack};

#[doc(hidden)]
pub use counted::CountedStack;
#[doc(hidden)]
pub use quiescent::QuiescentStack;
#[doc(hidden)]
pub use stack::RawStack;
