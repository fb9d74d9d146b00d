/// Point-in-time tally over every session the supervisor has ever tracked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStats {
	pub total: usize,
	pub running: usize,
	pub completed: usize,
	pub failed: usize,
	pub killed: usize,
	pub timeout: usize,
}
