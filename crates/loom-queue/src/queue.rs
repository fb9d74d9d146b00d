use std::collections::VecDeque;

use loom_types::{Priority, QueuedTask, TaskId};
use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;

use crate::events::QueueEvent;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
struct RunningTask {
	id: TaskId,
	priority: Priority,
	cancellation: CancellationToken,
}

#[derive(Default)]
struct State {
	queues: [VecDeque<QueuedTask>; 3],
	running: Option<RunningTask>,
}

impl State {
	fn queue_for(&mut self, priority: Priority) -> &mut VecDeque<QueuedTask> {
		&mut self.queues[priority as usize]
	}
}

/// A preemptible, three-level priority queue with a single-in-flight
/// dispatch guarantee (spec §4.1).
///
/// Within one level, dequeue order equals enqueue order. Across levels,
/// `Urgent` strictly precedes `Normal`, which strictly precedes `Low`. Only
/// one task is ever in the `running` state at a time; the dispatch loop is
/// the `dequeue`/`complete`/`fail` call sequence itself rather than a
/// separate background task, so it is non-reentrant by construction — there
/// is no shared "is dispatching" flag to guard.
pub struct PriorityQueue {
	state: Mutex<State>,
	notify: Notify,
	events: broadcast::Sender<QueueEvent>,
}

impl Default for PriorityQueue {
	fn default() -> Self {
		Self::new()
	}
}

impl PriorityQueue {
	#[must_use]
	pub fn new() -> Self {
		let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
		Self { state: Mutex::new(State::default()), notify: Notify::new(), events }
	}

	/// Subscribe to lifecycle events. Lagging subscribers (who fall more
	/// than [`EVENT_CHANNEL_CAPACITY`] events behind) will observe a
	/// `RecvError::Lagged` on their next receive, per `tokio::broadcast`
	/// semantics; the queue itself never blocks on slow subscribers.
	#[must_use]
	pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
		self.events.subscribe()
	}

	/// Enqueue a task built by the caller (the classifier mints the
	/// [`TaskId`] and constructs the [`QueuedTask`]; the queue only orders
	/// and dispatches it).
	///
	/// If `task.priority` is [`Priority::Urgent`] and a non-urgent task is
	/// currently running, that task's cancellation token is triggered
	/// (preemption) and an `Interrupted` event is emitted for it *before*
	/// this call returns, satisfying P3.
	pub fn enqueue(&self, task: QueuedTask) {
		let id = task.id;
		let priority = task.priority;

		let preempted = {
			let mut state = self.state.lock();
			let preempted = match &state.running {
				Some(running) if priority == Priority::Urgent && running.priority != Priority::Urgent => {
					Some(running.id)
				}
				_ => None,
			};
			if let Some(running) = &state.running
				&& preempted == Some(running.id)
			{
				running.cancellation.cancel();
			}
			state.queue_for(priority).push_back(task);
			preempted
		};

		tracing::debug!(task = %id, ?priority, "task enqueued");
		let _ = self.events.send(QueueEvent::Enqueued { id });
		if let Some(preempted_id) = preempted {
			tracing::info!(task = %preempted_id, preempted_by = %id, "preempting running task");
			let _ = self.events.send(QueueEvent::Interrupted { id: preempted_id });
		}
		self.notify.notify_waiters();
	}

	/// Wait for and take ownership of the next task to run, honoring
	/// priority order and the single-in-flight invariant. Emits `Started`.
	pub async fn dequeue(&self) -> QueuedTask {
		loop {
			let notified = self.notify.notified();
			{
				let mut state = self.state.lock();
				if state.running.is_none() {
					let ready = Priority::ALL
						.into_iter()
						.find(|p| !state.queues[*p as usize].is_empty());
					if let Some(priority) = ready {
						let task = state.queue_for(priority).pop_front().expect("checked non-empty");
						state.running = Some(RunningTask {
							id: task.id,
							priority,
							cancellation: task.cancellation.clone(),
						});
						drop(state);
						tracing::debug!(task = %task.id, ?priority, "task started");
						let _ = self.events.send(QueueEvent::Started { id: task.id });
						return task;
					}
				}
			}
			notified.await;
		}
	}

	/// Report successful completion of a dequeued task.
	pub fn complete(&self, task: &QueuedTask) {
		self.clear_running(task.id);
		let _ = self.events.send(QueueEvent::Completed { id: task.id });
		self.notify.notify_waiters();
	}

	/// Report that a dequeued task was cancelled rather than completed or
	/// failed. Cancellation is never retried.
	pub fn cancelled(&self, task: &QueuedTask) {
		self.clear_running(task.id);
		let _ = self.events.send(QueueEvent::Cancelled { id: task.id });
		self.notify.notify_waiters();
	}

	/// Report a failed dequeued task. If `task.can_retry()`, it is
	/// re-enqueued at the front of its priority level with `retry_count`
	/// incremented (P4); otherwise a terminal `Failed` event is emitted and
	/// the task is discarded.
	pub fn fail(&self, task: QueuedTask, error: impl Into<String>) {
		if task.can_retry() {
			let retried = task.retried();
			let attempt = retried.retry_count;
			{
				let mut state = self.state.lock();
				state.running = None;
				state.queue_for(retried.priority).push_front(retried);
			}
			tracing::warn!(task = %task.id, attempt, "retrying failed task");
			let _ = self.events.send(QueueEvent::Retrying { id: task.id, attempt });
		} else {
			self.clear_running(task.id);
			let message = error.into();
			tracing::error!(task = %task.id, error = %message, "task failed, retries exhausted");
			let _ = self.events.send(QueueEvent::Failed { id: task.id, error: message });
		}
		self.notify.notify_waiters();
	}

	/// Cancel a task by id: if it is currently running, trigger its
	/// cancellation token; if it is still pending, remove it from its
	/// sub-queue. Returns `false` if no task with that id was found.
	pub fn cancel(&self, task_id: TaskId) -> bool {
		let mut state = self.state.lock();
		if let Some(running) = &state.running
			&& running.id == task_id
		{
			running.cancellation.cancel();
			return true;
		}
		for queue in &mut state.queues {
			if let Some(pos) = queue.iter().position(|t| t.id == task_id) {
				queue.remove(pos);
				drop(state);
				let _ = self.events.send(QueueEvent::Cancelled { id: task_id });
				return true;
			}
		}
		false
	}

	/// The id of the currently running task, if any.
	#[must_use]
	pub fn currently_running(&self) -> Option<TaskId> {
		self.state.lock().running.as_ref().map(|r| r.id)
	}

	/// Drop every pending (not-yet-running) task. The running task, if any,
	/// is left untouched.
	pub fn clear(&self) {
		{
			let mut state = self.state.lock();
			for queue in &mut state.queues {
				queue.clear();
			}
		}
		let _ = self.events.send(QueueEvent::QueueCleared);
	}

	fn clear_running(&self, id: TaskId) {
		let mut state = self.state.lock();
		if state.running.as_ref().map(|r| r.id) == Some(id) {
			state.running = None;
		}
	}
}
