use parking_lot::Mutex;

const SMOOTHING_FACTOR: f64 = 0.1;

/// Aggregate statistics over classified and processed input.
///
/// Fields are each independently monotonically consistent (spec §5); a
/// reader may observe `total_processed` updated slightly ahead of
/// `moving_avg_processing_ms` for the same submission, which is permitted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
	pub total_processed: u64,
	pub urgent_count: u64,
	pub normal_count: u64,
	pub error_count: u64,
	pub moving_avg_processing_ms: f64,
}

/// Thread-safe accumulator for [`Stats`], updated by the classifier (on
/// submission) and the command processor (on completion/failure).
#[derive(Debug, Default)]
pub struct StatsTracker(Mutex<Stats>);

impl StatsTracker {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn snapshot(&self) -> Stats {
		*self.0.lock()
	}

	pub fn record_urgent(&self) {
		let mut stats = self.0.lock();
		stats.total_processed += 1;
		stats.urgent_count += 1;
	}

	pub fn record_normal(&self) {
		let mut stats = self.0.lock();
		stats.total_processed += 1;
		stats.normal_count += 1;
	}

	pub fn record_error(&self) {
		self.0.lock().error_count += 1;
	}

	/// Fold a new processing duration into the exponential moving average
	/// with smoothing factor `α = 0.1`. The first sample seeds the average
	/// directly rather than blending against zero.
	pub fn record_duration_ms(&self, duration_ms: f64) {
		let mut stats = self.0.lock();
		stats.moving_avg_processing_ms = if stats.total_processed <= 1 {
			duration_ms
		} else {
			stats.moving_avg_processing_ms * (1.0 - SMOOTHING_FACTOR) + duration_ms * SMOOTHING_FACTOR
		};
	}
}
