use std::path::PathBuf;

use chrono::{DateTime, Utc};
use loom_types::{OutputRecord, SessionId};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Append-only per-session log handle. Opened lazily on the first record,
/// closed on [`DurableLog::close`]. Every line is flushed immediately;
/// nothing is batched.
pub struct DurableLog {
	path: PathBuf,
	file: Option<File>,
}

fn format_line(record: &OutputRecord) -> String {
	let timestamp: DateTime<Utc> = record.timestamp.into();
	format!("[{}] [{}] {}\n", timestamp.to_rfc3339(), record.stream.label(), record.payload_lossy())
}

fn format_marker(session_id: SessionId, text: &str) -> String {
	let timestamp: DateTime<Utc> = std::time::SystemTime::now().into();
	format!("[{}] [STDOUT] --- session {session_id} {text} ---\n", timestamp.to_rfc3339())
}

impl DurableLog {
	pub fn path_for(log_dir: &std::path::Path, session_id: SessionId) -> PathBuf {
		let date = chrono::Local::now().format("%Y-%m-%d");
		log_dir.join(format!("{session_id}-{date}.log"))
	}

	pub fn new(log_dir: &std::path::Path, session_id: SessionId) -> Self {
		Self {
			path: Self::path_for(log_dir, session_id),
			file: None,
		}
	}

	async fn ensure_open(&mut self, session_id: SessionId) -> std::io::Result<&mut File> {
		if self.file.is_none() {
			if let Some(parent) = self.path.parent() {
				tokio::fs::create_dir_all(parent).await?;
			}
			let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
			file.write_all(format_marker(session_id, "started").as_bytes()).await?;
			file.flush().await?;
			self.file = Some(file);
		}
		Ok(self.file.as_mut().expect("just opened"))
	}

	/// Append one record's line, opening the file first if needed. I/O
	/// failures are logged and swallowed: durable logging must never affect
	/// the publication path.
	pub async fn append(&mut self, session_id: SessionId, record: &OutputRecord) {
		let line = format_line(record);
		match self.ensure_open(session_id).await {
			Ok(file) => {
				if let Err(err) = file.write_all(line.as_bytes()).await {
					warn!(%session_id, error = %err, "durable log write failed");
				} else if let Err(err) = file.flush().await {
					warn!(%session_id, error = %err, "durable log flush failed");
				}
			}
			Err(err) => warn!(%session_id, error = %err, "durable log open failed"),
		}
	}

	/// Write the closing marker and drop the handle.
	pub async fn close(&mut self, session_id: SessionId) {
		if let Ok(file) = self.ensure_open(session_id).await {
			let marker = format_marker(session_id, "ended");
			if let Err(err) = file.write_all(marker.as_bytes()).await {
				warn!(%session_id, error = %err, "durable log close marker failed");
			}
			let _ = file.flush().await;
		}
		self.file = None;
	}
}
