use loom_queue::PriorityQueue;
use loom_types::{Priority, QueuedTask, TaskId, TaskIdMinter};
use tokio_util::sync::CancellationToken;

use crate::classify::{classify, priority_for, retry_limit_for};
use crate::error::ClassifierError;
use crate::stats::{Stats, StatsTracker};

/// Bridges raw input to the priority queue: classifies, mints a [`TaskId`],
/// assigns priority and retry policy, and submits the resulting
/// [`QueuedTask`]. Also owns the process's aggregate statistics.
pub struct QueueManager {
	ids: TaskIdMinter,
	stats: StatsTracker,
}

impl Default for QueueManager {
	fn default() -> Self {
		Self::new()
	}
}

impl QueueManager {
	#[must_use]
	pub fn new() -> Self {
		Self { ids: TaskIdMinter::new(), stats: StatsTracker::new() }
	}

	/// Classify `raw` and submit it to `queue`. Returns the id assigned so
	/// the caller can later correlate completion/failure and record
	/// processing duration via [`QueueManager::record_completion`].
	pub fn submit(
		&self,
		queue: &PriorityQueue,
		raw: &str,
		external_cancellation: Option<CancellationToken>,
	) -> Result<TaskId, ClassifierError> {
		let item = classify(raw)?;
		let priority = priority_for(&item);
		let retry_limit = retry_limit_for(&item);
		let id = self.ids.next();
		let cancellation = external_cancellation.unwrap_or_default();

		let task = QueuedTask::new(id, priority, item, retry_limit, cancellation);
		queue.enqueue(task);

		match priority {
			Priority::Urgent => self.stats.record_urgent(),
			Priority::Normal | Priority::Low => self.stats.record_normal(),
		}

		Ok(id)
	}

	/// Record that a dispatched task finished, folding its wall-clock
	/// duration into the moving average.
	pub fn record_completion(&self, duration_ms: f64) {
		self.stats.record_duration_ms(duration_ms);
	}

	/// Record that a dispatched task failed terminally.
	pub fn record_failure(&self) {
		self.stats.record_error();
	}

	#[must_use]
	pub fn stats(&self) -> Stats {
		self.stats.snapshot()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn submit_classifies_and_enqueues() {
		let queue = PriorityQueue::new();
		let manager = QueueManager::new();

		manager.submit(&queue, "/status", None).unwrap();
		let task = queue.dequeue().await;
		assert_eq!(task.priority, Priority::Urgent);
		assert_eq!(manager.stats().urgent_count, 1);
	}

	#[test]
	fn submit_propagates_classifier_errors() {
		let queue = PriorityQueue::new();
		let manager = QueueManager::new();
		assert!(manager.submit(&queue, "/", None).is_err());
	}
}
