use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use loom_types::{OutputRecord, OutputSink, RingBuffer, SessionId};
use tokio::sync::Mutex;

use crate::config::StreamerConfig;
use crate::durable::DurableLog;
use crate::filter::{MultiSessionFilter, OutputFilter, SearchOptions};
use crate::subscription::{Subscription, SubscriberFn};

struct SessionData {
	buffer: RingBuffer<OutputRecord>,
	durable: Option<DurableLog>,
	subscribers: Vec<(u64, SubscriberFn)>,
}

impl SessionData {
	fn new(config: &StreamerConfig, session_id: SessionId) -> Self {
		Self {
			buffer: RingBuffer::new(config.ring_capacity),
			durable: config.durable_logs.then(|| DurableLog::new(&config.log_dir, session_id)),
			subscribers: Vec::new(),
		}
	}
}

/// Delivers subprocess output to live subscribers and preserves bounded
/// history plus, optionally, full durable logs. One instance tracks every
/// session; sessions are created lazily on first contact and reclaimed only
/// via [`Streamer::clear_session`].
pub struct Streamer {
	config: StreamerConfig,
	sessions: Mutex<HashMap<SessionId, SessionData>>,
	next_subscriber_id: AtomicU64,
}

impl Streamer {
	#[must_use]
	pub fn new(config: StreamerConfig) -> Self {
		Self {
			config,
			sessions: Mutex::new(HashMap::new()),
			next_subscriber_id: AtomicU64::new(0),
		}
	}

	/// Register a callback invoked synchronously, in publication order, for
	/// every subsequent record on `session_id`. The callback must not block.
	pub async fn start_streaming_session(&self, session_id: SessionId, callback: SubscriberFn) -> Subscription {
		let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
		let mut sessions = self.sessions.lock().await;
		let data = sessions.entry(session_id).or_insert_with(|| SessionData::new(&self.config, session_id));
		data.subscribers.push((id, callback));
		Subscription(id)
	}

	/// Detach a callback previously registered via
	/// [`Streamer::start_streaming_session`]. A no-op if already detached.
	pub async fn unsubscribe(&self, session_id: SessionId, subscription: Subscription) {
		let mut sessions = self.sessions.lock().await;
		if let Some(data) = sessions.get_mut(&session_id) {
			data.subscribers.retain(|(id, _)| *id != subscription.0);
		}
	}

	/// Bounded historical view of one session's output.
	pub async fn session_output(&self, session_id: SessionId, filter: OutputFilter) -> Vec<OutputRecord> {
		let sessions = self.sessions.lock().await;
		let Some(data) = sessions.get(&session_id) else {
			return Vec::new();
		};
		let mut records = data.buffer.snapshot();
		apply_stream_and_time(&mut records, filter.stream, filter.since);
		if let Some(lines) = filter.lines {
			let len = records.len();
			if len > lines {
				records.drain(0..len - lines);
			}
		}
		records
	}

	/// Merge per-session snapshots across sessions, filtered and bounded.
	pub async fn multi_session_output(&self, filter: MultiSessionFilter) -> Vec<OutputRecord> {
		let sessions = self.sessions.lock().await;
		let ids: Vec<SessionId> = match &filter.session_ids {
			Some(ids) => ids.clone(),
			None => sessions.keys().copied().collect(),
		};

		let mut merged: Vec<OutputRecord> = Vec::new();
		for id in ids {
			if let Some(data) = sessions.get(&id) {
				merged.extend(data.buffer.snapshot());
			}
		}
		apply_stream_and_time(&mut merged, filter.stream, filter.since);
		if let Some(keyword) = &filter.keyword {
			let keyword = keyword.to_lowercase();
			merged.retain(|record| record.payload_lossy().to_lowercase().contains(&keyword));
		}
		merged.sort_by_key(|record| record.timestamp);
		merged.truncate(filter.max_lines);
		merged
	}

	/// Case-insensitive keyword search within one session, with `context`
	/// records of padding before and after each hit, deduplicated by
	/// monotonic index and returned in publication order.
	pub async fn search(&self, session_id: SessionId, keyword: &str, options: SearchOptions) -> Vec<OutputRecord> {
		let sessions = self.sessions.lock().await;
		let Some(data) = sessions.get(&session_id) else {
			return Vec::new();
		};
		let records = data.buffer.snapshot();
		let keyword = keyword.to_lowercase();

		let hits: Vec<usize> = records
			.iter()
			.enumerate()
			.filter(|(_, record)| record.payload_lossy().to_lowercase().contains(&keyword))
			.map(|(index, _)| index)
			.collect();

		let mut seen = BTreeSet::new();
		let mut results = Vec::new();
		for hit in hits {
			let lo = hit.saturating_sub(options.context);
			let hi = (hit + options.context).min(records.len().saturating_sub(1));
			for record in &records[lo..=hi] {
				if seen.insert(record.monotonic_index) {
					results.push(record.clone());
				}
			}
		}

		results.sort_by_key(|record| record.monotonic_index);
		if let Some(max) = options.max_results {
			results.truncate(max);
		}
		results
	}

	/// Drop a session's ring buffer and subscriber list. Does not touch an
	/// already-closed durable log file on disk.
	pub async fn clear_session(&self, session_id: SessionId) {
		self.sessions.lock().await.remove(&session_id);
	}
}

fn apply_stream_and_time(records: &mut Vec<OutputRecord>, stream: Option<loom_types::Stream>, since: Option<std::time::SystemTime>) {
	if let Some(stream) = stream {
		records.retain(|record| record.stream == stream);
	}
	if let Some(since) = since {
		records.retain(|record| record.timestamp >= since);
	}
}

#[async_trait::async_trait]
impl OutputSink for Streamer {
	async fn forward(&self, record: OutputRecord) {
		let mut sessions = self.sessions.lock().await;
		let data = sessions.entry(record.session_id).or_insert_with(|| SessionData::new(&self.config, record.session_id));
		data.buffer.push(record.clone());
		for (_, callback) in &data.subscribers {
			callback(&record);
		}
		if let Some(durable) = data.durable.as_mut() {
			durable.append(record.session_id, &record).await;
		}
	}

	async fn finalize(&self, session_id: SessionId) {
		let mut sessions = self.sessions.lock().await;
		if let Some(data) = sessions.get_mut(&session_id) {
			if let Some(durable) = data.durable.as_mut() {
				durable.close(session_id).await;
			}
		}
	}
}
