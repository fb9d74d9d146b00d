use crate::ids::SessionId;
use crate::output::OutputRecord;

/// Destination for subprocess output records.
///
/// Implemented by the output streamer; depended on by the process
/// supervisor. Kept as a trait (rather than a concrete dependency) so the
/// supervisor crate never needs to know about ring buffers, durable logs,
/// or subscribers. `async` because a durable implementation needs to await
/// file I/O on the publication path.
#[async_trait::async_trait]
pub trait OutputSink: Send + Sync {
	/// Publish one record. Called on every stdout/stderr chunk.
	async fn forward(&self, record: OutputRecord);

	/// Called once, after a session reaches a terminal state. Closes any
	/// durable log handle and writes the closing marker.
	async fn finalize(&self, session_id: SessionId);
}
