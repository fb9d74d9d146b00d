use std::time::Duration;

/// Tunables for a [`crate::Supervisor`].
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
	/// Upper bound on sessions in `Starting` or `Running` state at once.
	pub max_concurrent: usize,
	/// Applied to sessions started without an explicit `max_duration`.
	pub default_timeout: Option<Duration>,
	/// Grace period between SIGTERM and SIGKILL during staged shutdown.
	pub term_grace: Duration,
}

impl Default for SupervisorConfig {
	fn default() -> Self {
		Self {
			max_concurrent: 10,
			default_timeout: Some(Duration::from_secs(30 * 60)),
			term_grace: Duration::from_secs(5),
		}
	}
}
