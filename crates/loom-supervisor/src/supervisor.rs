use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use loom_types::{MonotonicCounter, OutputRecord, OutputSink, ProcessSession, SessionId, SessionIdMinter, SessionState, Stream};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SupervisorConfig;
use crate::entry::{KillReason, SessionEntry};
use crate::error::SupervisorError;
use crate::events::SupervisorEvent;
use crate::stats::SupervisorStats;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A bounded pool of supervised OS subprocesses.
///
/// Every session started through [`Supervisor::start_session`] is tracked
/// from spawn to exit. At most `config.max_concurrent` sessions may be in
/// the `Starting` or `Running` state at once; callers past that bound get
/// [`SupervisorError::CapacityExceeded`] and must retry later.
pub struct Supervisor {
	ids: SessionIdMinter,
	sessions: Mutex<HashMap<SessionId, Arc<SessionEntry>>>,
	config: SupervisorConfig,
	sink: Arc<dyn OutputSink>,
	monotonic: Arc<MonotonicCounter>,
	events: broadcast::Sender<SupervisorEvent>,
}

impl Supervisor {
	#[must_use]
	pub fn new(config: SupervisorConfig, sink: Arc<dyn OutputSink>, monotonic: Arc<MonotonicCounter>) -> Self {
		let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
		Self {
			ids: SessionIdMinter::new(),
			sessions: Mutex::new(HashMap::new()),
			config,
			sink,
			monotonic,
			events,
		}
	}

	#[must_use]
	pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
		self.events.subscribe()
	}

	fn active_count(&self) -> usize {
		self
			.sessions
			.lock()
			.values()
			.filter(|entry| !entry.state.lock().state.is_terminal())
			.count()
	}

	/// Launch a subprocess and begin tracking its lifecycle.
	///
	/// Returns the assigned [`SessionId`] immediately; the spawn itself is
	/// synchronous, so by the time this returns the session is already
	/// `Running` (or `Failed`, if the OS refused to spawn it).
	pub fn start_session(
		&self,
		command: String,
		args: Vec<String>,
		cwd: Option<PathBuf>,
		env: HashMap<String, String>,
		max_duration: Option<Duration>,
	) -> Result<SessionId, SupervisorError> {
		if self.active_count() >= self.config.max_concurrent {
			return Err(SupervisorError::CapacityExceeded {
				max_concurrent: self.config.max_concurrent,
			});
		}

		let id = self.ids.next();
		let cancellation = CancellationToken::new();
		let max_duration = max_duration.or(self.config.default_timeout);
		let session = ProcessSession::new(
			id,
			command.clone(),
			args.clone(),
			cwd.clone(),
			env.clone(),
			max_duration,
			cancellation.clone(),
		);
		let entry = Arc::new(SessionEntry::new(session));
		self.sessions.lock().insert(id, entry.clone());

		let mut cmd = Command::new(&command);
		cmd.args(&args);
		if let Some(dir) = &cwd {
			cmd.current_dir(dir);
		}
		cmd.envs(&env);
		cmd.stdin(Stdio::null());
		cmd.stdout(Stdio::piped());
		cmd.stderr(Stdio::piped());
		cmd.kill_on_drop(true);

		let mut child = match cmd.spawn() {
			Ok(child) => child,
			Err(err) => {
				warn!(%id, %command, error = %err, "failed to spawn session");
				let mut guard = entry.state.lock();
				guard.state = SessionState::Failed;
				guard.ended_at = Some(SystemTime::now());
				drop(guard);
				let _ = self.events.send(SupervisorEvent::Failed { id });
				let record = OutputRecord {
					session_id: id,
					stream: Stream::Stderr,
					payload: err.to_string().into_bytes(),
					timestamp: SystemTime::now(),
					monotonic_index: self.monotonic.next(),
				};
				let sink = self.sink.clone();
				tokio::spawn(async move {
					sink.forward(record).await;
					sink.finalize(id).await;
				});
				return Ok(id);
			}
		};

		let pid = child.id();
		{
			let mut guard = entry.state.lock();
			guard.state = SessionState::Running;
			guard.os_pid = pid;
		}
		debug!(%id, %command, ?pid, "session running");
		let _ = self.events.send(SupervisorEvent::Started { id });

		let stdout_handle = child
			.stdout
			.take()
			.map(|stdout| tokio::spawn(forward_stream(id, Stream::Stdout, stdout, self.sink.clone(), self.monotonic.clone())));
		let stderr_handle = child
			.stderr
			.take()
			.map(|stderr| tokio::spawn(forward_stream(id, Stream::Stderr, stderr, self.sink.clone(), self.monotonic.clone())));

		let term_grace = self.config.term_grace;
		let events = self.events.clone();
		let supervised_entry = entry.clone();
		let sink = self.sink.clone();
		tokio::spawn(async move {
			supervise(
				id,
				child,
				supervised_entry,
				cancellation,
				max_duration,
				term_grace,
				events,
				sink,
				stdout_handle,
				stderr_handle,
			)
			.await;
		});

		Ok(id)
	}

	#[must_use]
	pub fn get_session(&self, id: SessionId) -> Option<ProcessSession> {
		self.sessions.lock().get(&id).map(|entry| entry.state.lock().clone())
	}

	#[must_use]
	pub fn get_all_sessions(&self) -> Vec<ProcessSession> {
		self.sessions.lock().values().map(|entry| entry.state.lock().clone()).collect()
	}

	#[must_use]
	pub fn get_running_sessions(&self) -> Vec<ProcessSession> {
		self
			.get_all_sessions()
			.into_iter()
			.filter(ProcessSession::is_running)
			.collect()
	}

	#[must_use]
	pub fn get_stats(&self) -> SupervisorStats {
		let mut stats = SupervisorStats::default();
		for session in self.get_all_sessions() {
			stats.total += 1;
			match session.state {
				SessionState::Starting | SessionState::Running => stats.running += 1,
				SessionState::Completed => stats.completed += 1,
				SessionState::Failed => stats.failed += 1,
				SessionState::Killed => stats.killed += 1,
				SessionState::Timeout => stats.timeout += 1,
			}
		}
		stats
	}

	/// Signal a running session to stop. A no-op if the session is already
	/// terminal or unknown.
	pub fn kill_session(&self, id: SessionId) -> Result<(), SupervisorError> {
		let entry = self.sessions.lock().get(&id).cloned().ok_or(SupervisorError::SessionNotFound)?;
		let cancellation = {
			let guard = entry.state.lock();
			if guard.state.is_terminal() {
				return Ok(());
			}
			guard.cancellation.clone()
		};
		entry.kill_reason.lock().get_or_insert(KillReason::Requested);
		cancellation.cancel();
		Ok(())
	}

	/// Signal every non-terminal session to stop. Returns the number signalled.
	pub fn kill_all_sessions(&self) -> usize {
		let ids: Vec<SessionId> = self
			.sessions
			.lock()
			.iter()
			.filter(|(_, entry)| !entry.state.lock().state.is_terminal())
			.map(|(id, _)| *id)
			.collect();
		for id in &ids {
			let _ = self.kill_session(*id);
		}
		ids.len()
	}

	/// Drop every terminal session from the registry. Running sessions are
	/// left untouched.
	pub fn clear_history(&self) {
		self.sessions.lock().retain(|_, entry| !entry.state.lock().state.is_terminal());
	}

	/// Alias of [`Supervisor::clear_history`], kept as a distinct entry point
	/// for periodic maintenance callers that don't want to imply "the user
	/// asked for this".
	pub fn cleanup(&self) {
		self.clear_history();
	}
}

async fn forward_stream<R>(
	session_id: SessionId,
	stream: Stream,
	reader: R,
	sink: Arc<dyn OutputSink>,
	monotonic: Arc<MonotonicCounter>,
) where
	R: tokio::io::AsyncRead + Unpin,
{
	let mut lines = BufReader::new(reader).lines();
	loop {
		match lines.next_line().await {
			Ok(Some(line)) => {
				let record = OutputRecord {
					session_id,
					stream,
					payload: line.into_bytes(),
					timestamp: SystemTime::now(),
					monotonic_index: monotonic.next(),
				};
				sink.forward(record).await;
			}
			Ok(None) => break,
			Err(err) => {
				warn!(%session_id, stream = stream.label(), error = %err, "output stream read failed");
				break;
			}
		}
	}
}

#[allow(clippy::too_many_arguments)]
async fn supervise(
	id: SessionId,
	mut child: Child,
	entry: Arc<SessionEntry>,
	cancellation: CancellationToken,
	max_duration: Option<Duration>,
	term_grace: Duration,
	events: broadcast::Sender<SupervisorEvent>,
	sink: Arc<dyn OutputSink>,
	stdout_handle: Option<JoinHandle<()>>,
	stderr_handle: Option<JoinHandle<()>>,
) {
	let timeout_sleep = async {
		match max_duration {
			Some(duration) => tokio::time::sleep(duration).await,
			None => std::future::pending::<()>().await,
		}
	};
	tokio::pin!(timeout_sleep);

	let event = tokio::select! {
		status = child.wait() => finish_from_exit(&entry, status),
		() = cancellation.cancelled() => {
			entry.kill_reason.lock().get_or_insert(KillReason::Requested);
			let status = terminate_child(&mut child, term_grace).await;
			finish_from_signal(&entry, status)
		}
		() = &mut timeout_sleep => {
			*entry.kill_reason.lock() = Some(KillReason::Timeout);
			cancellation.cancel();
			let status = terminate_child(&mut child, term_grace).await;
			finish_from_signal(&entry, status)
		}
	};

	// The readers only observe EOF once the child's stdout/stderr pipes
	// close; join them before finalizing so every record they forward lands
	// in the durable log ahead of its end marker (P8, §5 ordering).
	if let Some(handle) = stdout_handle {
		let _ = handle.await;
	}
	if let Some(handle) = stderr_handle {
		let _ = handle.await;
	}

	sink.finalize(id).await;
	let event = wrap_id(id, event);
	let _ = events.send(event);
}

/// `status.code()` where available, otherwise the terminating signal number
/// (negated, following the common unix convention) so a signalled exit is
/// still recorded rather than left as `None`.
fn exit_code_or_signal(status: &std::process::ExitStatus) -> Option<i32> {
	if let Some(code) = status.code() {
		return Some(code);
	}
	#[cfg(unix)]
	{
		use std::os::unix::process::ExitStatusExt;
		if let Some(signal) = status.signal() {
			return Some(-signal);
		}
	}
	None
}

fn finish_from_exit(entry: &SessionEntry, status: std::io::Result<std::process::ExitStatus>) -> EventKind {
	let mut guard = entry.state.lock();
	guard.ended_at = Some(SystemTime::now());
	match status {
		Ok(status) => {
			guard.exit_code = exit_code_or_signal(&status);
			if status.success() {
				guard.state = SessionState::Completed;
				EventKind::Completed { exit_code: status.code().unwrap_or(0) }
			} else {
				guard.state = SessionState::Failed;
				EventKind::Failed
			}
		}
		Err(_) => {
			guard.state = SessionState::Failed;
			EventKind::Failed
		}
	}
}

fn finish_from_signal(entry: &SessionEntry, status: Option<std::process::ExitStatus>) -> EventKind {
	let reason = entry.kill_reason.lock().unwrap_or(KillReason::Requested);
	let mut guard = entry.state.lock();
	guard.ended_at = Some(SystemTime::now());
	guard.exit_code = status.as_ref().and_then(exit_code_or_signal);
	match reason {
		KillReason::Requested => {
			guard.state = SessionState::Killed;
			EventKind::Killed
		}
		KillReason::Timeout => {
			guard.state = SessionState::Timeout;
			EventKind::TimedOut
		}
	}
}

enum EventKind {
	Completed { exit_code: i32 },
	Failed,
	Killed,
	TimedOut,
}

fn wrap_id(id: SessionId, kind: EventKind) -> SupervisorEvent {
	match kind {
		EventKind::Completed { exit_code } => SupervisorEvent::Completed { id, exit_code },
		EventKind::Failed => SupervisorEvent::Failed { id },
		EventKind::Killed => SupervisorEvent::Killed { id },
		EventKind::TimedOut => SupervisorEvent::TimedOut { id },
	}
}

/// SIGTERM, then wait up to `term_grace` before SIGKILL. Returns the
/// reaped `ExitStatus` so the caller can record the exit code (or
/// terminating signal) rather than discard it (§4.4 step 4).
async fn terminate_child(child: &mut Child, term_grace: Duration) -> Option<std::process::ExitStatus> {
	#[cfg(unix)]
	{
		if let Some(pid) = child.id() {
			use nix::sys::signal::{Signal, kill};
			use nix::unistd::Pid;
			if let Err(err) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
				warn!(%pid, error = %err, "SIGTERM delivery failed");
			}
		}
	}
	#[cfg(not(unix))]
	{
		let _ = child.start_kill();
	}

	match tokio::time::timeout(term_grace, child.wait()).await {
		Ok(status) => status.ok(),
		Err(_) => {
			let _ = child.start_kill();
			child.wait().await.ok()
		}
	}
}
