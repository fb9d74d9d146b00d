/// Resolves spec.md §9's open question: what happens to a task preempted by
/// an Urgent arrival.
///
/// `DiscardPreempted` is the default: the preempted task is reported
/// `cancelled` and not resubmitted. `RequeuePreempted` exists for a caller
/// that wants automatic resubmission (a fresh cancellation token, same
/// priority, `retry_count` untouched since preemption is not a failure), but
/// no code path in this workspace selects it by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
	#[default]
	DiscardPreempted,
	RequeuePreempted,
}
