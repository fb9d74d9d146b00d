use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use loom_classifier::QueueManager;
use loom_queue::PriorityQueue;
use loom_streamer::Streamer;
use loom_supervisor::Supervisor;
use loom_types::{InputKind, OutputRecord, QueuedTask, TaskId};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collaborators::{AgentState, TaskRunner, TokenAccounting};
use crate::config::ShellConfig;
use crate::error::ShellError;
use crate::handlers::{HandlerTable, build_handler_table};
use crate::policy::DispatchPolicy;
use crate::result::{Disposition, ExecutionResult};

/// Tally reported by [`CommandProcessor::emergency_stop`] once the umbrella
/// operation returns, whether or not every kill actually landed before the
/// deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmergencyStopSummary {
	pub tokens_triggered: usize,
	pub sessions_signalled: usize,
	/// `false` if [`ShellConfig::emergency_deadline`] elapsed before every
	/// signalled session reached a terminal state. The operation still
	/// returns on time regardless (spec §4.3).
	pub quiesced: bool,
}

/// Consumes dequeued tasks, dispatches to command handlers, the task
/// runner, or system directives, and reports the outcome back to the
/// [`PriorityQueue`] (spec §4.3).
pub struct CommandProcessor {
	pub(crate) config: ShellConfig,
	pub(crate) queue: Arc<PriorityQueue>,
	pub(crate) manager: Arc<QueueManager>,
	pub(crate) supervisor: Arc<Supervisor>,
	pub(crate) streamer: Arc<Streamer>,
	pub(crate) task_runner: Arc<dyn TaskRunner>,
	pub(crate) agent_state: Arc<dyn AgentState>,
	pub(crate) token_accounting: Arc<dyn TokenAccounting>,
	pub(crate) live_output: mpsc::UnboundedSender<OutputRecord>,
	handlers: HandlerTable,
	shutting_down: AtomicBool,
	/// Registered so [`CommandProcessor::emergency_stop`] can walk every
	/// in-flight task's token without depending on the queue's own
	/// single-running-task bookkeeping (spec §4.3, §5).
	tokens: Mutex<HashMap<TaskId, CancellationToken>>,
}

impl CommandProcessor {
	#[must_use]
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		config: ShellConfig,
		queue: Arc<PriorityQueue>,
		manager: Arc<QueueManager>,
		supervisor: Arc<Supervisor>,
		streamer: Arc<Streamer>,
		task_runner: Arc<dyn TaskRunner>,
		agent_state: Arc<dyn AgentState>,
		token_accounting: Arc<dyn TokenAccounting>,
		live_output: mpsc::UnboundedSender<OutputRecord>,
	) -> Self {
		Self {
			config,
			queue,
			manager,
			supervisor,
			streamer,
			task_runner,
			agent_state,
			token_accounting,
			live_output,
			handlers: build_handler_table(),
			shutting_down: AtomicBool::new(false),
			tokens: Mutex::new(HashMap::new()),
		}
	}

	#[must_use]
	pub fn is_shutting_down(&self) -> bool {
		self.shutting_down.load(Ordering::Acquire)
	}

	pub(crate) fn trigger_shutdown(&self) {
		self.shutting_down.store(true, Ordering::Release);
	}

	/// Render the same status text both the `/status` handler and a
	/// `system: status` directive produce.
	pub(crate) async fn status_text(&self) -> String {
		let stats = self.manager.stats();
		let supervisor_stats = self.supervisor.get_stats();
		let token_stats = self.token_accounting.format_stats();
		format!(
			"queue: total={} urgent={} normal={} errors={} avg_ms={:.1}\n\
			 sessions: total={} running={} completed={} failed={} killed={} timeout={}\n\
			 tokens: {token_stats}",
			stats.total_processed,
			stats.urgent_count,
			stats.normal_count,
			stats.error_count,
			stats.moving_avg_processing_ms,
			supervisor_stats.total,
			supervisor_stats.running,
			supervisor_stats.completed,
			supervisor_stats.failed,
			supervisor_stats.killed,
			supervisor_stats.timeout,
		)
	}

	/// Run the dispatch loop forever: dequeue, execute, report the outcome.
	/// Never returns; callers spawn this as a background task.
	pub async fn run(&self) {
		loop {
			let task = self.queue.dequeue().await;
			debug!(task = %task.id, "processor picked up task");
			let disposition = self.process_task(&task).await;
			self.apply_disposition(task, disposition);
		}
	}

	/// Process one dequeued task to completion and produce an
	/// [`ExecutionResult`] directly, without touching the queue. Exposed for
	/// callers (and tests) that want to drive a single task end-to-end
	/// without running the full dispatch loop; [`CommandProcessor::run`]
	/// uses [`CommandProcessor::process_task`] internally and reports the
	/// result to the queue itself.
	pub async fn execute(&self, task: &QueuedTask) -> ExecutionResult {
		match self.process_task(task).await {
			Disposition::Completed(result) | Disposition::Terminal(result) => result,
			Disposition::Retryable(message) => ExecutionResult::err(message, Duration::ZERO),
			Disposition::Cancelled | Disposition::Requeue => ExecutionResult::err(ShellError::Cancelled.to_string(), Duration::ZERO),
		}
	}

	fn apply_disposition(&self, task: QueuedTask, disposition: Disposition) {
		match disposition {
			Disposition::Completed(result) => {
				self.manager.record_completion(duration_to_ms(result.duration));
				self.queue.complete(&task);
			}
			Disposition::Terminal(result) => {
				self.manager.record_failure();
				let error = result.error.unwrap_or_default();
				self.queue.fail(force_terminal(task), error);
			}
			Disposition::Retryable(message) => {
				if !task.can_retry() {
					self.manager.record_failure();
				}
				self.queue.fail(task, message);
			}
			Disposition::Cancelled => {
				self.queue.cancelled(&task);
			}
			Disposition::Requeue => {
				let requeued = QueuedTask {
					cancellation: CancellationToken::new(),
					..task
				};
				self.queue.enqueue(requeued);
			}
		}
	}

	async fn process_task(&self, task: &QueuedTask) -> Disposition {
		self.tokens.lock().insert(task.id, task.cancellation.clone());
		let _guard = TokenGuard { processor: self, id: task.id };

		if self.is_shutting_down() {
			return Disposition::Terminal(ExecutionResult::err(ShellError::ShuttingDown.to_string(), Duration::ZERO));
		}

		match task.payload.kind {
			InputKind::Command => self.dispatch_command(task).await,
			InputKind::Message => self.dispatch_message(task).await,
			InputKind::System => self.dispatch_system(task).await,
		}
	}

	async fn dispatch_command(&self, task: &QueuedTask) -> Disposition {
		let start = Instant::now();
		let Some(verb) = task.payload.verb.as_deref() else {
			return Disposition::Terminal(ExecutionResult::err("command item missing a verb", start.elapsed()));
		};
		let Some(handler) = self.handlers.get(verb).copied() else {
			warn!(verb, "unknown command verb");
			let err = ShellError::UnknownCommand(verb.to_string());
			return Disposition::Terminal(ExecutionResult::err(err.to_string(), start.elapsed()));
		};

		let args = task.payload.args.clone();
		match handler(self, args, task.cancellation.clone()).await {
			Ok(output) => Disposition::Completed(ExecutionResult::ok(output, start.elapsed())),
			Err(err) if err.is_retryable() => Disposition::Retryable(err.to_string()),
			Err(err) => Disposition::Terminal(ExecutionResult::err(err.to_string(), start.elapsed())),
		}
	}

	/// Forward a `Message` item to the task runner, racing it against the
	/// task's cancellation token so preemption is observed within the
	/// bound spec §3 calls for, rather than only after the call returns.
	async fn dispatch_message(&self, task: &QueuedTask) -> Disposition {
		let start = Instant::now();
		let cancellation = task.cancellation.clone();

		tokio::select! {
			biased;
			() = cancellation.cancelled() => {
				info!(task = %task.id, "message task preempted or cancelled before completion");
				match self.config.dispatch_policy {
					DispatchPolicy::DiscardPreempted => Disposition::Cancelled,
					DispatchPolicy::RequeuePreempted => Disposition::Requeue,
				}
			}
			result = self.task_runner.run(&task.payload.content, cancellation.clone()) => {
				match result {
					Ok(outcome) => {
						self.token_accounting.add_input(outcome.tokens_in);
						self.token_accounting.add_output(outcome.tokens_out);
						self.token_accounting.increment_turn();
						self.token_accounting.add_api_duration(outcome.duration_ms);
						Disposition::Completed(ExecutionResult::ok(outcome.text, start.elapsed()))
					}
					Err(err) => {
						let shell_err = ShellError::from(err);
						if shell_err.is_retryable() {
							Disposition::Retryable(shell_err.to_string())
						} else {
							Disposition::Terminal(ExecutionResult::err(shell_err.to_string(), start.elapsed()))
						}
					}
				}
			}
		}
	}

	async fn dispatch_system(&self, task: &QueuedTask) -> Disposition {
		let start = Instant::now();
		let directive = task.payload.args.as_deref().unwrap_or("").trim().to_lowercase();
		match directive.as_str() {
			"shutdown" => {
				self.trigger_shutdown();
				info!("shutdown directive received; refusing further work");
				Disposition::Completed(ExecutionResult::ok("shutting down; refusing further work", start.elapsed()))
			}
			"status" => Disposition::Completed(ExecutionResult::ok(self.status_text().await, start.elapsed())),
			other => {
				let err = ShellError::UnknownCommand(format!("system:{other}"));
				Disposition::Terminal(ExecutionResult::err(err.to_string(), start.elapsed()))
			}
		}
	}

	/// Walk every registered cancellation token and every tracked OS
	/// process, triggering and killing them, within
	/// [`ShellConfig::emergency_deadline`] regardless of whether everything
	/// actually finished dying by then (spec §4.3, §8 scenario 6).
	pub async fn emergency_stop(&self) -> EmergencyStopSummary {
		let tokens_triggered = {
			let tokens = self.tokens.lock();
			for token in tokens.values() {
				token.cancel();
			}
			tokens.len()
		};
		let sessions_signalled = self.supervisor.kill_all_sessions();

		let quiesced = tokio::time::timeout(self.config.emergency_deadline, self.await_supervisor_quiescence())
			.await
			.is_ok();

		self.queue.clear();
		warn!(tokens_triggered, sessions_signalled, quiesced, "emergency stop executed");
		EmergencyStopSummary { tokens_triggered, sessions_signalled, quiesced }
	}

	async fn await_supervisor_quiescence(&self) {
		while !self.supervisor.get_running_sessions().is_empty() {
			tokio::time::sleep(Duration::from_millis(20)).await;
		}
	}
}

struct TokenGuard<'a> {
	processor: &'a CommandProcessor,
	id: TaskId,
}

impl Drop for TokenGuard<'_> {
	fn drop(&mut self) {
		self.processor.tokens.lock().remove(&self.id);
	}
}

fn force_terminal(mut task: QueuedTask) -> QueuedTask {
	task.retry_count = task.retry_limit;
	task
}

fn duration_to_ms(duration: Duration) -> f64 {
	duration.as_secs_f64() * 1000.0
}
