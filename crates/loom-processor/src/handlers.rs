//! Command verb -> handler table (spec §4.3, §6).
//!
//! Verbs are a fixed, known set rather than plugin-registered, so this is a
//! plain `HashMap<&'static str, Handler>` built once, not a proc-macro
//! registration like the teacher's editor command table.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use loom_streamer::OutputFilter;
use loom_types::{OutputRecord, SessionId, TaskId};
use tokio_util::sync::CancellationToken;

use crate::error::ShellError;
use crate::processor::CommandProcessor;

type BoxedFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ShellError>> + Send + 'a>>;

/// A command handler: takes the processor, the command's argument tail (if
/// any), and its task's cancellation token, and produces the text surfaced
/// to the originating caller.
pub(crate) type HandlerFn = for<'a> fn(&'a CommandProcessor, Option<String>, CancellationToken) -> BoxedFuture<'a>;

pub(crate) type HandlerTable = HashMap<&'static str, HandlerFn>;

const HELP_TEXT: &str = "\
Commands:
  /help                 show this text
  /exit                 shut down
  /clear                clear history and screen
  /refresh              clear screen only
  /clearhistory         clear history only
  /history              show conversation log
  /save [file]          persist the session
  /load file            restore a session
  /tools                list available tool handlers
  /model [name]         read or set the active model
  /parallel             toggle parallel execution
  /verbose              toggle verbose mode
  /status               show system status
  /stop [taskId]        cancel one task, or all pending/running work
  /jobs                 list supervised sessions
  /kill id              terminate a supervised session
  /abort /interrupt /emergency   trigger the emergency-stop umbrella
  /shell cmd args...    start a supervised session
  /output id            show a session's recent output
  /attach id            subscribe live to a session's output
  /clear-logs [id]      clear one session's buffer, or all";

pub(crate) fn build_handler_table() -> HandlerTable {
	let mut table: HandlerTable = HashMap::new();
	table.insert("help", handle_help);
	table.insert("exit", handle_exit);
	table.insert("clear", handle_clear);
	table.insert("refresh", handle_refresh);
	table.insert("clearhistory", handle_clearhistory);
	table.insert("history", handle_history);
	table.insert("save", handle_save);
	table.insert("load", handle_load);
	table.insert("tools", handle_tools);
	table.insert("model", handle_model);
	table.insert("parallel", handle_parallel);
	table.insert("verbose", handle_verbose);
	table.insert("status", handle_status);
	table.insert("stop", handle_stop);
	table.insert("jobs", handle_jobs);
	table.insert("kill", handle_kill);
	table.insert("abort", handle_emergency);
	table.insert("interrupt", handle_emergency);
	table.insert("emergency", handle_emergency);
	table.insert("shell", handle_shell);
	table.insert("output", handle_output);
	table.insert("attach", handle_attach);
	table.insert("clear-logs", handle_clear_logs);
	table
}

fn handle_help<'a>(_proc: &'a CommandProcessor, _args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move { Ok(HELP_TEXT.to_string()) })
}

fn handle_exit<'a>(proc: &'a CommandProcessor, _args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move {
		proc.trigger_shutdown();
		Ok("Stopping all processing. Goodbye.".to_string())
	})
}

fn handle_clear<'a>(proc: &'a CommandProcessor, _args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move {
		proc.agent_state.clear_history().await;
		Ok("History and screen cleared.".to_string())
	})
}

fn handle_refresh<'a>(_proc: &'a CommandProcessor, _args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move { Ok("Screen cleared.".to_string()) })
}

fn handle_clearhistory<'a>(proc: &'a CommandProcessor, _args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move {
		proc.agent_state.clear_history().await;
		Ok("History cleared.".to_string())
	})
}

fn handle_history<'a>(proc: &'a CommandProcessor, _args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move {
		let history = proc.agent_state.get_history().await;
		if history.is_empty() {
			Ok("No history yet.".to_string())
		} else {
			Ok(history.join("\n"))
		}
	})
}

fn default_session_filename() -> String {
	format!("session_{}.json", Utc::now().format("%Y%m%dT%H%M%SZ"))
}

fn handle_save<'a>(proc: &'a CommandProcessor, args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move {
		let filename = args.unwrap_or_else(default_session_filename);
		proc.agent_state.save_session(Path::new(&filename)).await?;
		Ok(format!("Session saved to {filename}"))
	})
}

fn handle_load<'a>(proc: &'a CommandProcessor, args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move {
		let filename = args.ok_or(ShellError::MissingArgument("file"))?;
		proc.agent_state.load_session(Path::new(&filename)).await?;
		Ok(format!("Session loaded from {filename}"))
	})
}

fn handle_tools<'a>(_proc: &'a CommandProcessor, _args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move { Ok("No tools registered (the tool invocation framework is owned by the embedding application).".to_string()) })
}

fn handle_model<'a>(proc: &'a CommandProcessor, args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move {
		if let Some(name) = args {
			proc.agent_state.set_model(&name).await?;
			return Ok(format!("Model set to {name}"));
		}
		let current = proc.agent_state.get_current_model().await;
		let available = proc.agent_state.list_available_models().await;
		if available.is_empty() {
			Ok(format!("Current model: {current}"))
		} else {
			Ok(format!("Current model: {current}\nAvailable models:\n{}", available.join("\n")))
		}
	})
}

fn handle_parallel<'a>(proc: &'a CommandProcessor, _args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move {
		let enabled = proc.agent_state.toggle_parallel().await;
		Ok(format!("Parallel execution: {}", if enabled { "on" } else { "off" }))
	})
}

fn handle_verbose<'a>(proc: &'a CommandProcessor, _args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move {
		let enabled = proc.agent_state.toggle_verbose().await;
		Ok(format!("Verbose mode: {}", if enabled { "on" } else { "off" }))
	})
}

fn handle_status<'a>(proc: &'a CommandProcessor, _args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move { Ok(proc.status_text().await) })
}

fn parse_task_id(raw: &str) -> Option<TaskId> {
	let raw = raw.trim();
	let digits = raw.strip_prefix("task-").unwrap_or(raw);
	digits.parse::<u64>().ok().map(TaskId)
}

fn parse_session_id(raw: &str) -> Option<SessionId> {
	let raw = raw.trim();
	let digits = raw.strip_prefix("bg-").unwrap_or(raw);
	digits.parse::<u64>().ok().map(SessionId)
}

fn handle_stop<'a>(proc: &'a CommandProcessor, args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move {
		match args {
			Some(raw) => {
				let id = parse_task_id(&raw).ok_or_else(|| ShellError::InvalidArgument(raw.clone()))?;
				if proc.queue.cancel(id) {
					Ok(format!("Stopping task {id}"))
				} else {
					Ok(format!("No such task: {id}"))
				}
			}
			None => {
				proc.queue.clear();
				if let Some(running) = proc.queue.currently_running() {
					proc.queue.cancel(running);
				}
				Ok("Stopping all processing".to_string())
			}
		}
	})
}

fn handle_jobs<'a>(proc: &'a CommandProcessor, _args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move {
		let sessions = proc.supervisor.get_all_sessions();
		if sessions.is_empty() {
			return Ok("No supervised sessions.".to_string());
		}
		let lines: Vec<String> = sessions
			.into_iter()
			.map(|session| {
				format!(
					"{} {:?} {} {}",
					session.id,
					session.state,
					session.command,
					session.args.join(" ")
				)
			})
			.collect();
		Ok(lines.join("\n"))
	})
}

fn handle_kill<'a>(proc: &'a CommandProcessor, args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move {
		let raw = args.ok_or(ShellError::MissingArgument("id"))?;
		let id = parse_session_id(&raw).ok_or_else(|| ShellError::InvalidArgument(raw.clone()))?;
		proc.supervisor.kill_session(id)?;
		Ok(format!("Killing session {id}"))
	})
}

fn handle_emergency<'a>(proc: &'a CommandProcessor, _args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move {
		let summary = proc.emergency_stop().await;
		Ok(format!(
			"Emergency stop: {} token(s) triggered, {} session(s) signalled{}",
			summary.tokens_triggered,
			summary.sessions_signalled,
			if summary.quiesced { "" } else { " (deadline exceeded before full quiescence)" }
		))
	})
}

fn handle_shell<'a>(proc: &'a CommandProcessor, args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move {
		let raw = args.ok_or(ShellError::MissingArgument("cmd"))?;
		let mut parts = raw.split_whitespace();
		let command = parts.next().ok_or(ShellError::MissingArgument("cmd"))?.to_string();
		let command_args: Vec<String> = parts.map(str::to_string).collect();
		let id = proc.supervisor.start_session(command, command_args, None, HashMap::new(), None)?;
		Ok(format!("Started session {id}"))
	})
}

fn handle_output<'a>(proc: &'a CommandProcessor, args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move {
		let raw = args.ok_or(ShellError::MissingArgument("id"))?;
		let id = parse_session_id(&raw).ok_or_else(|| ShellError::InvalidArgument(raw.clone()))?;
		let records = proc.streamer.session_output(id, OutputFilter { lines: Some(100), ..Default::default() }).await;
		if records.is_empty() {
			return Ok(format!("No output recorded for {id}"));
		}
		let lines: Vec<String> = records.iter().map(|record| format!("[{}] {}", record.stream.label(), record.payload_lossy())).collect();
		Ok(lines.join("\n"))
	})
}

fn handle_attach<'a>(proc: &'a CommandProcessor, args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move {
		let raw = args.ok_or(ShellError::MissingArgument("id"))?;
		let id = parse_session_id(&raw).ok_or_else(|| ShellError::InvalidArgument(raw.clone()))?;
		let sender = proc.live_output.clone();
		proc
			.streamer
			.start_streaming_session(id, Arc::new(move |record: &OutputRecord| {
				let _ = sender.send(record.clone());
			}))
			.await;
		Ok(format!("Attached to {id}"))
	})
}

fn handle_clear_logs<'a>(proc: &'a CommandProcessor, args: Option<String>, _cancel: CancellationToken) -> BoxedFuture<'a> {
	Box::pin(async move {
		match args {
			Some(raw) => {
				let id = parse_session_id(&raw).ok_or_else(|| ShellError::InvalidArgument(raw.clone()))?;
				proc.streamer.clear_session(id).await;
				Ok(format!("Cleared logs for {id}"))
			}
			None => {
				let sessions = proc.supervisor.get_all_sessions();
				let count = sessions.len();
				for session in sessions {
					proc.streamer.clear_session(session.id).await;
				}
				Ok(format!("Cleared logs for {count} session(s)"))
			}
		}
	})
}
