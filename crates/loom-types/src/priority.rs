use serde::{Deserialize, Serialize};

/// One of three totally ordered dispatch levels.
///
/// Ordering between queues is strict: no [`Priority::Normal`] item starts
/// while an [`Priority::Urgent`] item exists; no [`Priority::Low`] item
/// starts while `Urgent` or `Normal` exists. `Ord` is derived in declaration
/// order, so `Priority::Urgent < Priority::Normal < Priority::Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
	Urgent,
	Normal,
	Low,
}

impl Priority {
	/// All levels in dispatch order (highest first).
	pub const ALL: [Priority; 3] = [Priority::Urgent, Priority::Normal, Priority::Low];
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn urgent_outranks_normal_and_low() {
		assert!(Priority::Urgent < Priority::Normal);
		assert!(Priority::Normal < Priority::Low);
		assert!(Priority::Urgent < Priority::Low);
	}
}
