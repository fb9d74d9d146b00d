use std::time::Duration;

/// What the Command Processor returns to the originating caller for one
/// dispatched task (spec §7: `{success, error, duration}`).
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
	pub success: bool,
	pub output: String,
	pub error: Option<String>,
	pub duration: Duration,
}

impl ExecutionResult {
	#[must_use]
	pub fn ok(output: impl Into<String>, duration: Duration) -> Self {
		Self { success: true, output: output.into(), error: None, duration }
	}

	#[must_use]
	pub fn err(error: impl Into<String>, duration: Duration) -> Self {
		Self { success: false, output: String::new(), error: Some(error.into()), duration }
	}
}

/// Internal disposition of one dispatched task, decided by
/// [`crate::processor::CommandProcessor::process_task`] and used by the
/// dispatch loop to tell the queue whether to retry, fail terminally, or
/// report cancellation.
pub(crate) enum Disposition {
	/// The task ran to completion; report it to the queue as `completed`.
	Completed(ExecutionResult),
	/// A non-retryable error (invalid input, capacity, lifecycle, timeout);
	/// report it to the queue forced to a terminal `failed`, never retried.
	Terminal(ExecutionResult),
	/// A transient error; let the queue's own retry-at-front bookkeeping
	/// decide whether to retry or fail based on `retry_count`/`retry_limit`.
	Retryable(String),
	/// The task's token fired (preemption or explicit cancel) and the
	/// configured [`crate::policy::DispatchPolicy`] says to drop it.
	Cancelled,
	/// The task's token fired but policy says to resubmit it fresh.
	Requeue,
}
