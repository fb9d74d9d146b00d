//! Delivers subprocess output to live subscribers and preserves bounded
//! history plus, optionally, full durable append-only logs. Implements
//! [`loom_types::OutputSink`], the seam the process supervisor forwards
//! output through.

mod config;
mod durable;
mod filter;
mod streamer;
mod subscription;

pub use config::StreamerConfig;
pub use filter::{MultiSessionFilter, OutputFilter, SearchOptions};
pub use streamer::Streamer;
pub use subscription::{Subscription, SubscriberFn};
