use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// Which OS stream an [`OutputRecord`] was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stream {
	Stdout,
	Stderr,
}

impl Stream {
	#[must_use]
	pub const fn label(self) -> &'static str {
		match self {
			Stream::Stdout => "STDOUT",
			Stream::Stderr => "STDERR",
		}
	}
}

/// A single chunk of subprocess output, stamped with the process-global
/// monotonic index at the moment it was forwarded to the streamer.
///
/// The monotonic index must come from a single counter shared by every
/// session; per-session counters would break [`OutputRecord`] ordering
/// guarantees across `multiSessionOutput` queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
	pub session_id: SessionId,
	pub stream: Stream,
	pub payload: Vec<u8>,
	pub timestamp: SystemTime,
	pub monotonic_index: u64,
}

impl OutputRecord {
	#[must_use]
	pub fn payload_lossy(&self) -> String {
		String::from_utf8_lossy(&self.payload).into_owned()
	}
}
