//! Thin demo binary wiring the priority queue, classifier, subprocess
//! supervisor, output streamer, and command processor into an interactive
//! REPL. Not the embedding application itself (spec.md §6): a real caller
//! supplies its own `TaskRunner`/`AgentState`/`TokenAccounting` and its own
//! input source; this binary exists to exercise the stack end to end with
//! the library's demo collaborators.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use loom_classifier::QueueManager;
use loom_processor::{CommandProcessor, DispatchPolicy, EchoTaskRunner, InMemoryTokenAccounting, NullAgentState, ShellConfig};
use loom_queue::PriorityQueue;
use loom_streamer::{Streamer, StreamerConfig};
use loom_supervisor::{Supervisor, SupervisorConfig};
use loom_types::MonotonicCounter;
use tokio::sync::mpsc;
use tracing::info;

/// Command-line arguments for the `loom` demo shell.
#[derive(Parser, Debug)]
#[command(name = "loom")]
#[command(about = "Interactive agent shell: priority queue, subprocess supervisor, output streamer")]
struct Args {
	/// Directory durable session logs are written to.
	#[arg(short, long, value_name = "DIR", default_value = ".")]
	log_dir: PathBuf,

	/// Upper bound on concurrently supervised subprocesses.
	#[arg(long, default_value_t = 10)]
	max_concurrent: usize,

	/// Verbose logging.
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	tracing_subscriber::fmt()
		.with_max_level(if args.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
		.init();

	info!("starting loom shell");

	let queue = Arc::new(PriorityQueue::new());
	let manager = Arc::new(QueueManager::new());
	let streamer = Arc::new(Streamer::new(StreamerConfig {
		log_dir: args.log_dir,
		..StreamerConfig::default()
	}));
	let supervisor_config = SupervisorConfig {
		max_concurrent: args.max_concurrent,
		..SupervisorConfig::default()
	};
	let supervisor = Arc::new(Supervisor::new(supervisor_config.clone(), streamer.clone(), Arc::new(MonotonicCounter::new())));
	let (live_output, mut live_output_rx) = mpsc::unbounded_channel();

	let config = ShellConfig {
		supervisor: supervisor_config,
		streamer: StreamerConfig::default(),
		dispatch_policy: DispatchPolicy::default(),
		emergency_deadline: Duration::from_secs(5),
	};

	let processor = Arc::new(CommandProcessor::new(
		config,
		queue.clone(),
		manager.clone(),
		supervisor,
		streamer,
		Arc::new(EchoTaskRunner),
		Arc::new(NullAgentState::new("demo-model")),
		Arc::new(InMemoryTokenAccounting::new()),
		live_output,
	));

	tokio::spawn(async move {
		while let Some(record) = live_output_rx.recv().await {
			println!("[{} {}] {}", record.session_id, record.stream.label(), record.payload_lossy());
		}
	});

	println!("loom shell ready. Type /help for commands, /exit to quit.");
	let stdin = io::stdin();
	let mut line = String::new();
	loop {
		print!("> ");
		io::stdout().flush()?;
		line.clear();
		if stdin.lock().read_line(&mut line)? == 0 {
			break;
		}
		let trimmed = line.trim_end_matches(['\r', '\n']);
		if trimmed.is_empty() {
			continue;
		}

		// A real embedding application would call `manager.submit` from many
		// concurrent producers and let `CommandProcessor::run` drain the
		// queue in the background; this REPL has exactly one producer and
		// drains inline so it can print each result before prompting again.
		// A task retried for a transient failure is pushed back onto the
		// queue and may be dequeued ahead of the next line the user types.
		match manager.submit(&queue, trimmed, None) {
			Ok(_) => {
				let task = queue.dequeue().await;
				let result = processor.execute(&task).await;
				if result.success {
					queue.complete(&task);
					println!("{}", result.output);
				} else {
					let message = result.error.clone().unwrap_or_default();
					queue.fail(task, message.clone());
					eprintln!("error: {message}");
				}
			}
			Err(err) => eprintln!("error: {err}"),
		}

		if processor.is_shutting_down() {
			break;
		}
	}

	Ok(())
}
