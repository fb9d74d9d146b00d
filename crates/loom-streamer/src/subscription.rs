use std::sync::Arc;

use loom_types::OutputRecord;

pub type SubscriberFn = Arc<dyn Fn(&OutputRecord) + Send + Sync>;

/// Handle returned by [`crate::Streamer::start_streaming_session`]. Pass it
/// back to [`crate::Streamer::unsubscribe`] to detach the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(pub(crate) u64);
