use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// The three shapes raw input can take once classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
	Command,
	Message,
	System,
}

/// An immutable record produced by the classifier.
///
/// `verb`/`args` are populated only for [`InputKind::Command`] (the first
/// whitespace-delimited token after the leading `/`, and the remainder of
/// the line respectively) and for [`InputKind::System`] (`verb` is always
/// `None`, `args` holds the directive body after `system:`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputItem {
	pub kind: InputKind,
	pub content: String,
	pub verb: Option<String>,
	pub args: Option<String>,
	pub raw: String,
	pub timestamp: SystemTime,
	pub session_id: Option<SessionId>,
}

impl InputItem {
	#[must_use]
	pub fn command(raw: impl Into<String>, verb: impl Into<String>, args: Option<String>) -> Self {
		let raw = raw.into();
		let verb = verb.into();
		Self {
			content: raw.clone(),
			kind: InputKind::Command,
			verb: Some(verb),
			args,
			raw,
			timestamp: SystemTime::now(),
			session_id: None,
		}
	}

	#[must_use]
	pub fn message(raw: impl Into<String>) -> Self {
		let raw = raw.into();
		Self {
			content: raw.clone(),
			kind: InputKind::Message,
			verb: None,
			args: None,
			raw,
			timestamp: SystemTime::now(),
			session_id: None,
		}
	}

	#[must_use]
	pub fn system(raw: impl Into<String>, directive: impl Into<String>) -> Self {
		let raw = raw.into();
		let directive = directive.into();
		Self {
			content: directive.clone(),
			kind: InputKind::System,
			verb: None,
			args: Some(directive),
			raw,
			timestamp: SystemTime::now(),
			session_id: None,
		}
	}

	#[must_use]
	pub fn with_session(mut self, session_id: SessionId) -> Self {
		self.session_id = Some(session_id);
		self
	}
}
