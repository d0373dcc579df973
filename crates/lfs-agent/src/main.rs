//! `git-lfs-agent` — serve the Git LFS SSH transfer protocol for one
//! repository over stdin/stdout.

#![deny(unsafe_code)]

use std::io::{stdin, stdout};
use std::path::PathBuf;
use std::process::exit;
use std::sync::mpsc;
use std::thread;

use clap::{Parser, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use lfs_core::{Error, Operation};

#[derive(Parser, Debug)]
#[command(
    name = "git-lfs-agent",
    version,
    about = "Git LFS SSH transfer agent",
    long_about = "Speaks the Git LFS SSH transfer protocol over stdin/stdout for a \
                  single repository, as spawned by a remote shell."
)]
struct Cli {
    /// Repository path (PATH or PATH/.git)
    path: PathBuf,
    /// Transfer direction requested by the client
    #[arg(value_enum)]
    operation: Op,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Op {
    Upload,
    Download,
}

impl From<Op> for Operation {
    fn from(op: Op) -> Operation {
        match op {
            Op::Upload => Operation::Upload,
            Op::Download => Operation::Download,
        }
    }
}

enum Event {
    Finished(Result<(), Error>),
    Interrupted,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let (tx, rx) = mpsc::channel();
    let signal_tx = tx.clone();
    let handler = ctrlc::set_handler(move || {
        let _ = signal_tx.send(Event::Interrupted);
    });
    if let Err(err) = handler {
        debug!(error = %err, "signal handler not installed");
    }

    thread::spawn(move || {
        let result = lfs_agent::run(stdin().lock(), stdout().lock(), &cli.path, cli.operation.into());
        let _ = tx.send(Event::Finished(result));
    });

    // whichever comes first wins: completion or an interrupt-class signal
    match rx.recv() {
        Ok(Event::Finished(Ok(()))) => {
            debug!("session complete");
        }
        Ok(Event::Finished(Err(err))) => {
            eprintln!("git-lfs-agent: {err}");
            exit(match err {
                Error::Conflict => 1,
                _ => 2,
            });
        }
        Ok(Event::Interrupted) | Err(_) => {
            debug!("interrupted");
            exit(2);
        }
    }
}

/// `RUST_LOG` wins; otherwise `GIT_TRACE`/`GIT_TRACE_PACKET` select
/// debug-level output. Diagnostics go to stderr, the protocol owns
/// stdout.
fn init_tracing() {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if git_trace_enabled() => EnvFilter::new("debug"),
        Err(_) => EnvFilter::new("warn"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn git_trace_enabled() -> bool {
    ["GIT_TRACE", "GIT_TRACE_PACKET"].iter().any(|key| {
        matches!(
            std::env::var(key).ok().as_deref(),
            Some("1") | Some("2") | Some("true")
        )
    })
}
