use loom_types::{InputItem, InputKind, Priority};

use crate::error::ClassifierError;

/// Command verbs that preempt any running non-urgent task (spec §4.2).
const URGENT_VERBS: &[&str] = &["stop", "kill", "status", "jobs", "interrupt", "abort", "emergency"];

/// Turn one line of raw input into an [`InputItem`].
///
/// - A leading `/` marks a command; the verb is the first whitespace
///   token after the slash, the rest of the line is the argument tail.
/// - A leading `system:` marks a system directive; the tail is the body
///   after the prefix.
/// - Anything else is a free-form message.
pub fn classify(raw: &str) -> Result<InputItem, ClassifierError> {
	let trimmed = raw.trim_end_matches(['\r', '\n']);

	if let Some(rest) = trimmed.strip_prefix('/') {
		let mut parts = rest.splitn(2, char::is_whitespace);
		let verb = parts.next().unwrap_or("").trim();
		if verb.is_empty() {
			return Err(ClassifierError::EmptyVerb);
		}
		let args = parts.next().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
		return Ok(InputItem::command(trimmed, verb.to_lowercase(), args));
	}

	if let Some(body) = trimmed.strip_prefix("system:") {
		return Ok(InputItem::system(trimmed, body.trim()));
	}

	Ok(InputItem::message(trimmed))
}

/// Assign a dispatch priority to a classified item (spec §4.2).
#[must_use]
pub fn priority_for(item: &InputItem) -> Priority {
	match item.kind {
		InputKind::System => Priority::Urgent,
		InputKind::Command => {
			let is_urgent = item
				.verb
				.as_deref()
				.is_some_and(|verb| URGENT_VERBS.contains(&verb));
			if is_urgent { Priority::Urgent } else { Priority::Normal }
		}
		InputKind::Message => Priority::Normal,
	}
}

/// Retry limit for a classified item: commands are intentional acts, so
/// silent retries are undesired (limit 1); messages tolerate transient
/// downstream failures (limit 3).
#[must_use]
pub fn retry_limit_for(item: &InputItem) -> u32 {
	match item.kind {
		InputKind::Command | InputKind::System => 1,
		InputKind::Message => 3,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn slash_prefix_is_a_command_with_verb_and_tail() {
		let item = classify("/shell echo hello").unwrap();
		assert_eq!(item.kind, InputKind::Command);
		assert_eq!(item.verb.as_deref(), Some("shell"));
		assert_eq!(item.args.as_deref(), Some("echo hello"));
	}

	#[test]
	fn command_without_args_has_no_tail() {
		let item = classify("/status").unwrap();
		assert_eq!(item.verb.as_deref(), Some("status"));
		assert_eq!(item.args, None);
	}

	#[test]
	fn empty_verb_is_an_error() {
		assert_eq!(classify("/").unwrap_err(), ClassifierError::EmptyVerb);
		assert_eq!(classify("/   ").unwrap_err(), ClassifierError::EmptyVerb);
	}

	#[test]
	fn system_prefix_is_a_system_directive() {
		let item = classify("system: shutdown").unwrap();
		assert_eq!(item.kind, InputKind::System);
		assert_eq!(item.args.as_deref(), Some("shutdown"));
	}

	#[test]
	fn plain_text_is_a_message() {
		let item = classify("what does this function do?").unwrap();
		assert_eq!(item.kind, InputKind::Message);
	}

	#[test]
	fn urgent_verbs_outrank_ordinary_commands() {
		for verb in URGENT_VERBS {
			let item = classify(&format!("/{verb}")).unwrap();
			assert_eq!(priority_for(&item), Priority::Urgent, "/{verb} should be urgent");
		}
		let ordinary = classify("/save").unwrap();
		assert_eq!(priority_for(&ordinary), Priority::Normal);
	}

	#[test]
	fn system_directives_are_always_urgent() {
		let item = classify("system: status").unwrap();
		assert_eq!(priority_for(&item), Priority::Urgent);
	}

	#[test]
	fn retry_limits_match_kind() {
		let cmd = classify("/save").unwrap();
		let msg = classify("hello").unwrap();
		assert_eq!(retry_limit_for(&cmd), 1);
		assert_eq!(retry_limit_for(&msg), 3);
	}
}
