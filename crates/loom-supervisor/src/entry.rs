use loom_types::ProcessSession;
use parking_lot::Mutex;

/// Distinguishes why a session's cancellation token was fired, so the
/// `supervise` task can map a signalled exit to the right terminal
/// [`loom_types::SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillReason {
	Requested,
	Timeout,
}

/// Shared, mutable record for one session. Held behind an `Arc` so the
/// registry, the `supervise` task, and any caller holding a stale lookup
/// all observe the same state.
pub struct SessionEntry {
	pub state: Mutex<ProcessSession>,
	pub kill_reason: Mutex<Option<KillReason>>,
}

impl SessionEntry {
	pub fn new(session: ProcessSession) -> Self {
		Self {
			state: Mutex::new(session),
			kill_reason: Mutex::new(None),
		}
	}
}
