use std::time::SystemTime;

use loom_types::{SessionId, Stream};

/// Filter for [`crate::Streamer::session_output`].
#[derive(Debug, Clone, Default)]
pub struct OutputFilter {
	pub lines: Option<usize>,
	pub stream: Option<Stream>,
	pub since: Option<SystemTime>,
}

/// Filter for [`crate::Streamer::multi_session_output`].
#[derive(Debug, Clone)]
pub struct MultiSessionFilter {
	pub session_ids: Option<Vec<SessionId>>,
	pub stream: Option<Stream>,
	pub since: Option<SystemTime>,
	pub keyword: Option<String>,
	pub max_lines: usize,
}

impl Default for MultiSessionFilter {
	fn default() -> Self {
		Self {
			session_ids: None,
			stream: None,
			since: None,
			keyword: None,
			max_lines: 500,
		}
	}
}

/// Options for [`crate::Streamer::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
	pub max_results: Option<usize>,
	pub context: usize,
}
