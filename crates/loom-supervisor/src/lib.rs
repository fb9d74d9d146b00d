//! Supervises a bounded pool of OS subprocesses: spawn, track exit status,
//! enforce per-session timeouts, and perform staged SIGTERM-then-SIGKILL
//! shutdown. Output is forwarded to an [`loom_types::OutputSink`] rather than
//! owned here, so this crate never depends on the streamer.

mod config;
mod entry;
mod error;
mod events;
mod stats;
mod supervisor;

pub use config::SupervisorConfig;
pub use error::SupervisorError;
pub use events::SupervisorEvent;
pub use stats::SupervisorStats;
pub use supervisor::Supervisor;
