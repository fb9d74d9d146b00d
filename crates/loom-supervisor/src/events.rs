use loom_types::SessionId;

/// Lifecycle events broadcast by a [`crate::Supervisor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
	Started { id: SessionId },
	Completed { id: SessionId, exit_code: i32 },
	Failed { id: SessionId },
	Killed { id: SessionId },
	TimedOut { id: SessionId },
}
