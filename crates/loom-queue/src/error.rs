/// Errors the queue can report synchronously from `enqueue`.
///
/// `Priority` is a closed Rust enum, so every caller using
/// [`loom_types::Priority`] directly is statically prevented from
/// constructing an invalid level; this variant exists for parity with the
/// source interface and for callers (e.g. a future wire-protocol front end)
/// that classify priority from an untyped string before reaching the queue.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
	#[error("unknown priority level: {0}")]
	InvalidPriority(String),
}
