//! Session wiring for the transfer agent binary.
//!
//! [`run`] connects a reader/writer pair to a repository on disk:
//! resolve the git dir, derive the permission mask, bootstrap the
//! `lfs/` layout, advertise capabilities and hand the streams to the
//! command processor. The binary calls this with stdio; tests call it
//! with in-memory streams and a pinned clock.

#![deny(unsafe_code)]

pub mod config;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use lfs_core::{Clock, Error, Operation, SystemClock};
use lfs_local::FsBackend;
use lfs_pktline::Pktline;
use lfs_transfer::Processor;

/// Serve one session over `reader`/`writer` with the system clock.
pub fn run<R: Read, W: Write>(
    reader: R,
    writer: W,
    path: &Path,
    op: Operation,
) -> Result<(), Error> {
    run_with_clock(reader, writer, path, op, &SystemClock)
}

/// Serve one session with an explicit clock (locks created in the
/// session are stamped with one snapshot of it).
pub fn run_with_clock<R: Read, W: Write>(
    reader: R,
    writer: W,
    path: &Path,
    op: Operation,
    clock: &dyn Clock,
) -> Result<(), Error> {
    std::fs::metadata(path)?;
    let gitdir = resolve_gitdir(path);
    let umask = config::repository_umask(&gitdir);
    debug!(gitdir = %gitdir.display(), umask, %op, "starting session");

    let backend = FsBackend::new(gitdir.join("lfs"), umask, clock)?;
    let pkt = Pktline::new(reader, writer);
    let mut processor = Processor::new(pkt, backend, op);
    processor.greet()?;
    processor.run()
}

/// `PATH` itself when it already names a git dir, `PATH/.git` otherwise.
fn resolve_gitdir(path: &Path) -> PathBuf {
    let is_gitdir = path
        .file_name()
        .map(|name| name.to_string_lossy().ends_with(".git"))
        .unwrap_or(false);
    if is_gitdir {
        path.to_path_buf()
    } else {
        path.join(".git")
    }
}
