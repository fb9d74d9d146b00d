//! Shared data model for the agent shell core.
//!
//! These types cross the boundaries between the priority queue, the process
//! supervisor, and the output streamer. They carry no behavior beyond small
//! invariant-preserving constructors; the components that own them are
//! defined in their own crates.

mod ids;
mod input;
mod output;
mod priority;
mod process;
mod ring_buffer;
mod sink;
mod task;

pub use ids::{MonotonicCounter, SessionId, SessionIdMinter, TaskId, TaskIdMinter};
pub use input::{InputItem, InputKind};
pub use output::{OutputRecord, Stream};
pub use priority::Priority;
pub use process::{ProcessSession, SessionState};
pub use ring_buffer::RingBuffer;
pub use sink::OutputSink;
pub use task::QueuedTask;
