use std::path::PathBuf;

/// Tunables for a [`crate::Streamer`].
#[derive(Debug, Clone)]
pub struct StreamerConfig {
	/// Per-session ring buffer capacity.
	pub ring_capacity: usize,
	/// Whether to maintain append-only log files in `log_dir`.
	pub durable_logs: bool,
	pub log_dir: PathBuf,
}

impl Default for StreamerConfig {
	fn default() -> Self {
		Self {
			ring_capacity: 1000,
			durable_logs: true,
			log_dir: PathBuf::from("."),
		}
	}
}
