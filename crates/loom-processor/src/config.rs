use std::time::Duration;

use loom_streamer::StreamerConfig;
use loom_supervisor::SupervisorConfig;

use crate::policy::DispatchPolicy;

/// Every tunable named across spec.md (§5 timeouts, §4.4 `max_concurrent`,
/// §4.5 ring buffer capacity and log directory) collected into one plain
/// struct. The core never reads files or environment variables itself
/// (spec.md §6); the startup layer builds this and passes it in.
#[derive(Debug, Clone)]
pub struct ShellConfig {
	pub supervisor: SupervisorConfig,
	pub streamer: StreamerConfig,
	pub dispatch_policy: DispatchPolicy,
	/// Wall-clock deadline for the emergency-stop umbrella operation,
	/// regardless of whether every kill actually lands (spec §4.3, §5).
	pub emergency_deadline: Duration,
}

impl Default for ShellConfig {
	fn default() -> Self {
		Self {
			supervisor: SupervisorConfig::default(),
			streamer: StreamerConfig::default(),
			dispatch_policy: DispatchPolicy::default(),
			emergency_deadline: Duration::from_secs(5),
		}
	}
}
