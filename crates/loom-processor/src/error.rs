use std::io::ErrorKind;

use crate::collaborators::{AgentStateError, DownstreamError};

/// Errors the Command Processor can produce, composed at the boundary from
/// every collaborator's own error enum (spec §7's taxonomy: invalid input,
/// capacity, lifecycle, spawn, timeout, cancelled, downstream, I/O).
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
	#[error("unknown command: /{0}")]
	UnknownCommand(String),
	#[error("missing required argument: {0}")]
	MissingArgument(&'static str),
	#[error("invalid argument: {0}")]
	InvalidArgument(String),
	#[error(transparent)]
	Supervisor(#[from] loom_supervisor::SupervisorError),
	#[error(transparent)]
	AgentState(#[from] AgentStateError),
	#[error(transparent)]
	Downstream(#[from] DownstreamError),
	#[error("operation timed out")]
	Timeout,
	#[error("operation was cancelled")]
	Cancelled,
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error("the shell is shutting down and refuses further work")]
	ShuttingDown,
}

impl ShellError {
	/// Whether this error category is ever retried by the queue. Invalid
	/// input, capacity, lifecycle, timeout, and cancelled errors are always
	/// terminal (spec §7); spawn and downstream errors are retried only if
	/// [`is_transient`] says so.
	#[must_use]
	pub fn is_retryable(&self) -> bool {
		match self {
			ShellError::UnknownCommand(_)
			| ShellError::MissingArgument(_)
			| ShellError::InvalidArgument(_)
			| ShellError::Timeout
			| ShellError::Cancelled
			| ShellError::ShuttingDown
			| ShellError::AgentState(_) => false,
			ShellError::Supervisor(err) => is_transient_supervisor(err),
			ShellError::Downstream(err) => is_transient_downstream(err),
			ShellError::Io(err) => is_transient_io(err),
		}
	}
}

fn is_transient_io(err: &std::io::Error) -> bool {
	matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted)
}

fn is_transient_downstream(err: &DownstreamError) -> bool {
	matches!(err, DownstreamError::RateLimited)
}

/// `CapacityExceeded` is a caller-facing backpressure signal, not a
/// transient fault of the supervisor itself: retrying immediately would
/// just observe the same capacity wall, so it is terminal. `SessionNotFound`
/// is a lifecycle error and likewise never retried.
fn is_transient_supervisor(_err: &loom_supervisor::SupervisorError) -> bool {
	false
}

/// The explicit transient-error predicate resolving spec.md §9's open
/// question: timeouts, connection resets, and rate-limit responses are
/// transient; everything else is terminal. Exposed standalone (in addition
/// to [`ShellError::is_retryable`]) so a caller holding a boxed
/// `dyn std::error::Error` from a collaborator can still classify it.
#[must_use]
pub fn is_transient(error: &ShellError) -> bool {
	error.is_retryable()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rate_limited_downstream_is_transient() {
		let err = ShellError::Downstream(DownstreamError::RateLimited);
		assert!(is_transient(&err));
	}

	#[test]
	fn unknown_command_is_never_transient() {
		let err = ShellError::UnknownCommand("bogus".into());
		assert!(!is_transient(&err));
	}

	#[test]
	fn timeout_and_cancelled_are_terminal() {
		assert!(!is_transient(&ShellError::Timeout));
		assert!(!is_transient(&ShellError::Cancelled));
	}

	#[test]
	fn connection_reset_io_error_is_transient() {
		let err = ShellError::Io(std::io::Error::from(ErrorKind::ConnectionReset));
		assert!(is_transient(&err));
	}

	#[test]
	fn plain_not_found_io_error_is_terminal() {
		let err = ShellError::Io(std::io::Error::from(ErrorKind::NotFound));
		assert!(!is_transient(&err));
	}
}
