use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::ids::SessionId;

/// Lifecycle state of a supervised subprocess.
///
/// ```text
///  Starting --(spawn ok)--> Running --(exit 0)--> Completed
///     |                        |   --(exit != 0)--> Failed
///     |                        |   --(signal)------> Killed
///     |                        `--(deadline)--------> Timeout
///     `--(spawn err)--> Failed
/// ```
///
/// [`SessionState::Starting`] and [`SessionState::Running`] are the only
/// non-terminal states; every other variant is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
	Starting,
	Running,
	Completed,
	Failed,
	Killed,
	Timeout,
}

impl SessionState {
	#[must_use]
	pub const fn is_terminal(self) -> bool {
		!matches!(self, SessionState::Starting | SessionState::Running)
	}
}

/// A supervised subprocess and its full lifecycle record.
#[derive(Debug, Clone)]
pub struct ProcessSession {
	pub id: SessionId,
	pub command: String,
	pub args: Vec<String>,
	pub cwd: Option<PathBuf>,
	pub env: HashMap<String, String>,
	pub max_duration: Option<Duration>,
	pub state: SessionState,
	pub started_at: SystemTime,
	pub ended_at: Option<SystemTime>,
	pub exit_code: Option<i32>,
	pub os_pid: Option<u32>,
	pub cancellation: CancellationToken,
}

impl ProcessSession {
	#[must_use]
	pub fn new(
		id: SessionId,
		command: String,
		args: Vec<String>,
		cwd: Option<PathBuf>,
		env: HashMap<String, String>,
		max_duration: Option<Duration>,
		cancellation: CancellationToken,
	) -> Self {
		Self {
			id,
			command,
			args,
			cwd,
			env,
			max_duration,
			state: SessionState::Starting,
			started_at: SystemTime::now(),
			ended_at: None,
			exit_code: None,
			os_pid: None,
			cancellation,
		}
	}

	/// Duration between start and end, if the session has terminated.
	#[must_use]
	pub fn duration(&self) -> Option<Duration> {
		self
			.ended_at
			.and_then(|end| end.duration_since(self.started_at).ok())
	}

	#[must_use]
	pub fn is_running(&self) -> bool {
		self.state == SessionState::Running
	}
}
