/// Errors the supervisor can report synchronously.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SupervisorError {
	#[error("supervisor at capacity ({max_concurrent} concurrent sessions)")]
	CapacityExceeded { max_concurrent: usize },
	#[error("no such session")]
	SessionNotFound,
}
