use std::time::SystemTime;

use tokio_util::sync::CancellationToken;

use crate::ids::TaskId;
use crate::input::InputItem;
use crate::priority::Priority;

/// One queue entry.
///
/// Invariant: `retry_count <= retry_limit` always holds; [`QueuedTask::retry`]
/// is the only way to increment `retry_count` and panics in debug builds if
/// the limit would be exceeded (callers must check
/// [`QueuedTask::can_retry`] first).
#[derive(Debug, Clone)]
pub struct QueuedTask {
	pub id: TaskId,
	pub priority: Priority,
	pub payload: InputItem,
	pub enqueued_at: SystemTime,
	pub retry_count: u32,
	pub retry_limit: u32,
	pub cancellation: CancellationToken,
}

impl QueuedTask {
	#[must_use]
	pub fn new(
		id: TaskId,
		priority: Priority,
		payload: InputItem,
		retry_limit: u32,
		cancellation: CancellationToken,
	) -> Self {
		Self {
			id,
			priority,
			payload,
			enqueued_at: SystemTime::now(),
			retry_count: 0,
			retry_limit,
			cancellation,
		}
	}

	#[must_use]
	pub fn can_retry(&self) -> bool {
		self.retry_count < self.retry_limit
	}

	/// Produce a retried copy with `retry_count` incremented and a fresh
	/// cancellation token (the previous attempt's token may already be
	/// triggered).
	#[must_use]
	pub fn retried(&self) -> Self {
		debug_assert!(self.can_retry(), "retry called past retry_limit");
		Self {
			retry_count: self.retry_count + 1,
			cancellation: CancellationToken::new(),
			..self.clone()
		}
	}
}
