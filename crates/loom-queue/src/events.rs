use loom_types::TaskId;

/// Lifecycle events emitted by the [`crate::PriorityQueue`].
///
/// For any given task the sequence observed is:
/// `Enqueued -> (Interrupted)? -> Started -> (Retrying -> Started)* ->
/// (Completed | Failed | Cancelled)`. `Interrupted` is emitted against the
/// *currently running* task when a higher-priority arrival preempts it, not
/// against the arriving task itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
	Enqueued { id: TaskId },
	Interrupted { id: TaskId },
	Started { id: TaskId },
	Retrying { id: TaskId, attempt: u32 },
	Completed { id: TaskId },
	Failed { id: TaskId, error: String },
	Cancelled { id: TaskId },
	QueueCleared,
	/// Queue-internal error (not a task failure): e.g. a broadcast receiver
	/// lagged and dropped events.
	Error { message: String },
}
