use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Opaque, process-lifetime-unique identifier for a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "task-{}", self.0)
	}
}

/// Identifier for a supervised subprocess session, rendered as `bg-NNN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "bg-{:03}", self.0)
	}
}

/// Mints [`TaskId`]s from a single process-wide, strictly increasing counter.
#[derive(Debug, Default)]
pub struct TaskIdMinter(AtomicU64);

impl TaskIdMinter {
	#[must_use]
	pub const fn new() -> Self {
		Self(AtomicU64::new(0))
	}

	pub fn next(&self) -> TaskId {
		TaskId(self.0.fetch_add(1, Ordering::Relaxed))
	}
}

/// Mints [`SessionId`]s starting at `bg-001`.
#[derive(Debug, Default)]
pub struct SessionIdMinter(AtomicU64);

impl SessionIdMinter {
	#[must_use]
	pub const fn new() -> Self {
		Self(AtomicU64::new(0))
	}

	pub fn next(&self) -> SessionId {
		SessionId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
	}
}

/// The single process-wide, strictly increasing sequence stamped on every
/// [`crate::OutputRecord`]. Must never be reset or scoped per-session: the
/// multi-session query contract relies on global ordering across sessions.
#[derive(Debug, Default)]
pub struct MonotonicCounter(AtomicU64);

impl MonotonicCounter {
	#[must_use]
	pub const fn new() -> Self {
		Self(AtomicU64::new(0))
	}

	pub fn next(&self) -> u64 {
		self.0.fetch_add(1, Ordering::Relaxed)
	}
}
