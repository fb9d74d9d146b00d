use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use loom_streamer::{MultiSessionFilter, OutputFilter, SearchOptions, Streamer, StreamerConfig};
use loom_types::{OutputRecord, OutputSink, SessionId, Stream};
use parking_lot::Mutex;

// Timestamps are derived from `index` rather than `SystemTime::now()` so
// ordering across sessions is deterministic regardless of scheduling or
// clock resolution.
fn record(session_id: SessionId, stream: Stream, payload: &str, index: u64) -> OutputRecord {
	OutputRecord {
		session_id,
		stream,
		payload: payload.as_bytes().to_vec(),
		timestamp: UNIX_EPOCH + Duration::from_millis(index * 10),
		monotonic_index: index,
	}
}

fn no_durable_config() -> StreamerConfig {
	StreamerConfig { durable_logs: false, ..StreamerConfig::default() }
}

#[tokio::test]
async fn session_output_trims_to_requested_lines() {
	let streamer = Streamer::new(no_durable_config());
	let session = SessionId(1);
	for i in 0..5 {
		streamer.forward(record(session, Stream::Stdout, &format!("line {i}"), i)).await;
	}

	let tail = streamer.session_output(session, OutputFilter { lines: Some(2), ..Default::default() }).await;
	assert_eq!(tail.len(), 2);
	assert_eq!(tail[0].payload_lossy(), "line 3");
	assert_eq!(tail[1].payload_lossy(), "line 4");
}

#[tokio::test]
async fn session_output_filters_by_stream() {
	let streamer = Streamer::new(no_durable_config());
	let session = SessionId(1);
	streamer.forward(record(session, Stream::Stdout, "out", 0)).await;
	streamer.forward(record(session, Stream::Stderr, "err", 1)).await;

	let stdout_only = streamer.session_output(session, OutputFilter { stream: Some(Stream::Stdout), ..Default::default() }).await;
	assert_eq!(stdout_only.len(), 1);
	assert_eq!(stdout_only[0].payload_lossy(), "out");
}

#[tokio::test]
async fn multi_session_output_merges_sessions_in_timestamp_order() {
	let streamer = Streamer::new(no_durable_config());
	let a = SessionId(1);
	let b = SessionId(2);
	streamer.forward(record(a, Stream::Stdout, "a-0", 0)).await;
	streamer.forward(record(b, Stream::Stdout, "b-0", 1)).await;
	streamer.forward(record(a, Stream::Stdout, "a-1", 2)).await;

	let merged = streamer.multi_session_output(MultiSessionFilter::default()).await;
	assert_eq!(merged.len(), 3);
	let payloads: Vec<String> = merged.iter().map(OutputRecord::payload_lossy).collect();
	assert_eq!(payloads, vec!["a-0", "b-0", "a-1"]);
}

#[tokio::test]
async fn multi_session_output_filters_by_keyword() {
	let streamer = Streamer::new(no_durable_config());
	let session = SessionId(1);
	streamer.forward(record(session, Stream::Stdout, "connection established", 0)).await;
	streamer.forward(record(session, Stream::Stdout, "heartbeat", 1)).await;

	let filtered = streamer
		.multi_session_output(MultiSessionFilter { keyword: Some("CONNECTION".into()), ..MultiSessionFilter::default() })
		.await;
	assert_eq!(filtered.len(), 1);
	assert_eq!(filtered[0].payload_lossy(), "connection established");
}

#[tokio::test]
async fn search_returns_context_window_deduplicated() {
	let streamer = Streamer::new(no_durable_config());
	let session = SessionId(1);
	for (i, line) in ["a", "b", "needle", "c", "needle", "d"].iter().enumerate() {
		streamer.forward(record(session, Stream::Stdout, line, i as u64)).await;
	}

	let hits = streamer.search(session, "needle", SearchOptions { max_results: None, context: 1 }).await;
	// hits at index 2 and 4 each pull in one record of context on either side;
	// index 3 ("c") is shared context between both and must appear once.
	let payloads: Vec<String> = hits.iter().map(OutputRecord::payload_lossy).collect();
	assert_eq!(payloads, vec!["b", "needle", "c", "needle", "d"]);
}

#[tokio::test]
async fn subscriber_sees_strictly_increasing_contiguous_indices() {
	let streamer = Streamer::new(no_durable_config());
	let session = SessionId(1);
	let seen: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
	let sink = seen.clone();
	streamer
		.start_streaming_session(session, Arc::new(move |record: &OutputRecord| sink.lock().push(record.monotonic_index)))
		.await;

	for i in 0..4 {
		streamer.forward(record(session, Stream::Stdout, "x", i)).await;
	}

	let indices = seen.lock().clone();
	assert_eq!(indices, vec![0, 1, 2, 3]);
	for window in indices.windows(2) {
		assert_eq!(window[1], window[0] + 1, "subscriber stream must be contiguous");
	}
}

#[tokio::test]
async fn unsubscribe_stops_further_delivery() {
	let streamer = Streamer::new(no_durable_config());
	let session = SessionId(1);
	let seen: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
	let sink = seen.clone();
	let subscription = streamer
		.start_streaming_session(session, Arc::new(move |record: &OutputRecord| sink.lock().push(record.monotonic_index)))
		.await;

	streamer.forward(record(session, Stream::Stdout, "x", 0)).await;
	streamer.unsubscribe(session, subscription).await;
	streamer.forward(record(session, Stream::Stdout, "y", 1)).await;

	assert_eq!(*seen.lock(), vec![0]);
}

#[tokio::test]
async fn durable_log_lines_match_expected_format_with_start_and_end_markers() {
	let dir = tempfile::tempdir().unwrap();
	let config = StreamerConfig { log_dir: dir.path().to_path_buf(), ..StreamerConfig::default() };
	let streamer = Streamer::new(config);
	let session = SessionId(7);

	streamer.forward(record(session, Stream::Stdout, "booting", 0)).await;
	streamer.forward(record(session, Stream::Stderr, "warning: low memory", 1)).await;
	streamer.finalize(session).await;

	let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
	assert_eq!(entries.len(), 1, "expected exactly one log file");
	let path = entries.into_iter().next().unwrap().unwrap().path();
	let contents = std::fs::read_to_string(path).unwrap();
	let lines: Vec<&str> = contents.lines().collect();

	assert_eq!(lines.len(), 4, "start marker, two records, end marker");
	for line in &lines {
		assert!(matches_expected_line_format(line), "line did not match expected format: {line}");
	}
	assert!(lines[0].contains(&session.to_string()));
	assert!(lines.last().unwrap().contains(&session.to_string()));
	assert!(lines[1].contains("[STDOUT]"));
	assert!(lines[1].contains("booting"));
	assert!(lines[2].contains("[STDERR]"));
	assert!(lines[2].contains("warning: low memory"));
}

/// Checks a line against `^\[<ISO-8601>\] \[(STDOUT|STDERR)\] .*$` without
/// pulling in a regex dependency for one assertion.
fn matches_expected_line_format(line: &str) -> bool {
	let Some(rest) = line.strip_prefix('[') else { return false };
	let Some((timestamp, rest)) = rest.split_once("] [") else { return false };
	let Some((tag, _)) = rest.split_once("] ") else { return false };
	!timestamp.is_empty() && matches!(tag, "STDOUT" | "STDERR")
}

#[tokio::test]
async fn clear_session_drops_buffered_history() {
	let streamer = Streamer::new(no_durable_config());
	let session = SessionId(1);
	streamer.forward(record(session, Stream::Stdout, "x", 0)).await;
	streamer.clear_session(session).await;

	let after = streamer.session_output(session, OutputFilter::default()).await;
	assert!(after.is_empty());
}
