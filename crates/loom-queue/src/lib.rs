//! Three-level preemptible priority queue (spec §4.1).
//!
//! The queue itself only orders and signals; it never retries on the
//! caller's behalf beyond the mechanical retry-at-front bookkeeping, and it
//! never decides whether a preempted task should be requeued — that policy
//! belongs to the consumer (see `loom-processor`'s `DispatchPolicy`).

mod error;
mod events;
mod queue;

pub use error::QueueError;
pub use events::QueueEvent;
pub use queue::PriorityQueue;
