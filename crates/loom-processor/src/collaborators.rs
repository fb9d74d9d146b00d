use std::path::Path;

use tokio_util::sync::CancellationToken;

/// Result of one LLM turn (spec §4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRunOutcome {
	pub text: String,
	pub tokens_in: u64,
	pub tokens_out: u64,
	pub duration_ms: u64,
}

/// Errors a [`TaskRunner`] may raise. Kept small and closed so
/// [`crate::transient::is_transient`] can classify it without matching on
/// message substrings.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DownstreamError {
	#[error("rate limited by the provider")]
	RateLimited,
	#[error("downstream collaborator error: {0}")]
	Other(String),
}

/// The external LLM task runner the Command Processor forwards `Message`
/// input to. Implementations must honor `cancellation`: once triggered,
/// `run` should return (with a `Cancelled`-shaped error or by unwinding
/// early) rather than continue to completion.
#[async_trait::async_trait]
pub trait TaskRunner: Send + Sync {
	async fn run(&self, message: &str, cancellation: CancellationToken) -> Result<TaskRunOutcome, DownstreamError>;
}

/// Errors an [`AgentState`] collaborator may raise for session persistence.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AgentStateError {
	#[error("session file not found: {0}")]
	FileNotFound(String),
	#[error("failed to parse session file: {0}")]
	ParseError(String),
	#[error("failed to save session: {0}")]
	SaveError(String),
	#[error("unknown model: {0}")]
	UnknownModel(String),
}

/// Agent history/session/model state the core mutates on behalf of a
/// handful of CLI verbs (`clear`, `history`, `save`, `load`, `model`,
/// `parallel`, `verbose`) but never inspects directly (spec §4.6).
#[async_trait::async_trait]
pub trait AgentState: Send + Sync {
	async fn clear_history(&self);
	async fn get_history(&self) -> Vec<String>;
	async fn save_session(&self, file: &Path) -> Result<(), AgentStateError>;
	async fn load_session(&self, file: &Path) -> Result<(), AgentStateError>;
	async fn set_model(&self, name: &str) -> Result<(), AgentStateError>;
	/// Returns the new state of the toggle.
	async fn toggle_parallel(&self) -> bool;
	/// Returns the new state of the toggle.
	async fn toggle_verbose(&self) -> bool;
	async fn get_current_model(&self) -> String;
	async fn list_available_models(&self) -> Vec<String>;
}

/// Point-in-time token/turn accounting snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TokenStats {
	pub input_tokens: u64,
	pub output_tokens: u64,
	pub turns: u64,
	pub total_api_duration_ms: u64,
}

/// Token/turn accounting the Command Processor feeds on every completed
/// `Message` dispatch (spec §4.6). Synchronous: accounting never needs to
/// suspend.
pub trait TokenAccounting: Send + Sync {
	fn add_input(&self, tokens: u64);
	fn add_output(&self, tokens: u64);
	fn increment_turn(&self);
	fn add_api_duration(&self, ms: u64);
	fn get_stats(&self) -> TokenStats;
	fn format_stats(&self) -> String;
}

/// In-memory [`AgentState`] used by the demo binary and tests. Never the
/// implementation an embedding application would ship with a real model
/// provider.
#[derive(Debug, Default)]
pub struct NullAgentState {
	history: parking_lot::Mutex<Vec<String>>,
	model: parking_lot::Mutex<String>,
	parallel: std::sync::atomic::AtomicBool,
	verbose: std::sync::atomic::AtomicBool,
}

impl NullAgentState {
	#[must_use]
	pub fn new(default_model: impl Into<String>) -> Self {
		Self {
			history: parking_lot::Mutex::new(Vec::new()),
			model: parking_lot::Mutex::new(default_model.into()),
			parallel: std::sync::atomic::AtomicBool::new(false),
			verbose: std::sync::atomic::AtomicBool::new(false),
		}
	}

	pub fn record_turn(&self, line: impl Into<String>) {
		self.history.lock().push(line.into());
	}
}

#[async_trait::async_trait]
impl AgentState for NullAgentState {
	async fn clear_history(&self) {
		self.history.lock().clear();
	}

	async fn get_history(&self) -> Vec<String> {
		self.history.lock().clone()
	}

	async fn save_session(&self, _file: &Path) -> Result<(), AgentStateError> {
		Ok(())
	}

	async fn load_session(&self, file: &Path) -> Result<(), AgentStateError> {
		if !file.exists() {
			return Err(AgentStateError::FileNotFound(file.display().to_string()));
		}
		Ok(())
	}

	async fn set_model(&self, name: &str) -> Result<(), AgentStateError> {
		*self.model.lock() = name.to_string();
		Ok(())
	}

	async fn toggle_parallel(&self) -> bool {
		!self.parallel.fetch_xor(true, std::sync::atomic::Ordering::AcqRel)
	}

	async fn toggle_verbose(&self) -> bool {
		!self.verbose.fetch_xor(true, std::sync::atomic::Ordering::AcqRel)
	}

	async fn get_current_model(&self) -> String {
		self.model.lock().clone()
	}

	async fn list_available_models(&self) -> Vec<String> {
		Vec::new()
	}
}

/// In-memory [`TokenAccounting`] used by the demo binary and tests.
#[derive(Debug, Default)]
pub struct InMemoryTokenAccounting(parking_lot::Mutex<TokenStats>);

impl InMemoryTokenAccounting {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}
}

impl TokenAccounting for InMemoryTokenAccounting {
	fn add_input(&self, tokens: u64) {
		self.0.lock().input_tokens += tokens;
	}

	fn add_output(&self, tokens: u64) {
		self.0.lock().output_tokens += tokens;
	}

	fn increment_turn(&self) {
		self.0.lock().turns += 1;
	}

	fn add_api_duration(&self, ms: u64) {
		self.0.lock().total_api_duration_ms += ms;
	}

	fn get_stats(&self) -> TokenStats {
		*self.0.lock()
	}

	fn format_stats(&self) -> String {
		let stats = self.get_stats();
		format!(
			"turns={} in={} out={} api_time_ms={}",
			stats.turns, stats.input_tokens, stats.output_tokens, stats.total_api_duration_ms
		)
	}
}

/// A [`TaskRunner`] that echoes its input back immediately. Used by the demo
/// binary and tests in place of a real LLM provider client.
#[derive(Debug, Default)]
pub struct EchoTaskRunner;

#[async_trait::async_trait]
impl TaskRunner for EchoTaskRunner {
	async fn run(&self, message: &str, cancellation: CancellationToken) -> Result<TaskRunOutcome, DownstreamError> {
		if cancellation.is_cancelled() {
			return Ok(TaskRunOutcome { text: String::new(), tokens_in: 0, tokens_out: 0, duration_ms: 0 });
		}
		Ok(TaskRunOutcome {
			text: format!("echo: {message}"),
			tokens_in: message.split_whitespace().count() as u64,
			tokens_out: message.split_whitespace().count() as u64,
			duration_ms: 0,
		})
	}
}
