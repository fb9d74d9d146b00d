//! Command Processor: dispatches dequeued tasks to command handlers, the
//! background task runner, and system directives, and owns the
//! emergency-stop umbrella operation (spec §4.3).

mod collaborators;
mod config;
mod error;
mod handlers;
mod policy;
mod processor;
mod result;

pub use collaborators::{
	AgentState, AgentStateError, DownstreamError, EchoTaskRunner, InMemoryTokenAccounting, NullAgentState, TaskRunOutcome, TaskRunner,
	TokenAccounting, TokenStats,
};
pub use config::ShellConfig;
pub use error::{ShellError, is_transient};
pub use policy::DispatchPolicy;
pub use processor::{CommandProcessor, EmergencyStopSummary};
pub use result::ExecutionResult;
