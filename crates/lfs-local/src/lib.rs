//! Filesystem backend for the transfer agent.
//!
//! Objects live in a two-level sharded tree under `<root>/objects`;
//! ingest goes through `<root>/incomplete` and is promoted with an
//! atomic hard link, so a partially written object is never reachable
//! at its final path. Locks are files under `<root>/locks` created
//! through an `O_EXCL` sentinel. Multiple agent processes may share
//! one root: identical uploads race benignly to the same final name,
//! and lock creation is serialized by the sentinel.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

use lfs_core::clock::unix_seconds;
use lfs_core::{Args, Backend, BatchItem, Clock, Error, LockBackend, Oid, Operation, Status};

mod locks;
mod sys;

pub use locks::{lock_id, FsLockBackend};
pub use sys::current_username;

/// Directory for content-addressed blobs.
const OBJECTS_DIR: &str = "objects";
/// Directory for in-flight upload buffers.
const INCOMPLETE_DIR: &str = "incomplete";
/// Scratch directory.
const TMP_DIR: &str = "tmp";
/// Directory for lock files.
const LOCKS_DIR: &str = "locks";

/// Filesystem-backed store rooted at a `.git/lfs` directory.
pub struct FsBackend {
    root: PathBuf,
    umask: u32,
    locks: FsLockBackend,
}

impl FsBackend {
    /// Open (and bootstrap) a store at `root`. `umask` masks the mode
    /// of ingested files; the timestamp for locks created by this
    /// process is read from `clock` once.
    pub fn new(root: impl Into<PathBuf>, umask: u32, clock: &dyn Clock) -> Result<Self, Error> {
        let root = root.into();
        for dir in [OBJECTS_DIR, INCOMPLETE_DIR, TMP_DIR, LOCKS_DIR] {
            fs::create_dir_all(root.join(dir))?;
        }
        let locks = FsLockBackend::new(root.join(LOCKS_DIR), unix_seconds(clock.now()));
        Ok(FsBackend { root, umask, locks })
    }

    /// Expected path of a stored object.
    pub fn object_path(&self, oid: &Oid) -> PathBuf {
        let (a, b) = oid.buckets();
        self.root.join(OBJECTS_DIR).join(a).join(b).join(oid.as_str())
    }

    fn file_mode(&self) -> u32 {
        0o777 & !self.umask
    }

    /// Remove orphaned upload buffers left behind by interrupted
    /// sessions; returns the number removed. Not called by the
    /// protocol path — buffers of concurrent live uploads must not be
    /// touched, so this is for out-of-band maintenance only.
    pub fn cleanup_incomplete(&self) -> Result<usize, Error> {
        let mut removed = 0;
        for entry in fs::read_dir(self.root.join(INCOMPLETE_DIR))? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        debug!(removed, "incomplete buffers removed");
        Ok(removed)
    }
}

impl Backend for FsBackend {
    fn batch(
        &self,
        _op: Operation,
        items: Vec<BatchItem>,
        _args: &Args,
    ) -> Result<Vec<BatchItem>, Error> {
        let mut out = Vec::with_capacity(items.len());
        for mut item in items {
            match fs::metadata(self.object_path(&item.oid)) {
                Ok(meta) => {
                    item.size = meta.len();
                    item.present = true;
                }
                Err(_) => item.present = false,
            }
            out.push(item);
        }
        Ok(out)
    }

    fn upload(&self, oid: &Oid, reader: &mut dyn Read, _args: &Args) -> Result<(), Error> {
        let staging = StagedUpload::create(&self.root.join(INCOMPLETE_DIR), oid)?;
        debug!(oid = %oid, temp = %staging.path.display(), "ingesting object");

        let mut file = &staging.file;
        io::copy(reader, &mut file).map_err(Error::from_io)?;
        file.sync_all()?;

        let dest = self.object_path(oid);
        if let Some(parent) = dest.parent() {
            sys::create_dir_all_with_mode(parent, self.file_mode())?;
        }
        match fs::hard_link(&staging.path, &dest) {
            Ok(()) => {}
            // another process won the race with identical bytes
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(Error::Io(e)),
        }
        sys::set_file_mode(&dest, self.file_mode())?;
        Ok(())
    }

    fn verify(&self, oid: &Oid, size: u64, _args: &Args) -> Result<Status, Error> {
        match fs::metadata(self.object_path(oid)) {
            Ok(meta) if meta.len() == size => Ok(Status::ok()),
            Ok(meta) => {
                debug!(oid = %oid, expected = size, actual = meta.len(), "size mismatch");
                Ok(Status::failure(lfs_core::status::CONFLICT, "size mismatch"))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Ok(Status::failure(lfs_core::status::NOT_FOUND, "not found"))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn download(&self, oid: &Oid, _args: &Args) -> Result<(Box<dyn Read>, u64), Error> {
        let path = self.object_path(oid);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::NotFound),
            Err(e) => return Err(Error::Io(e)),
        };
        let size = file.metadata()?.len();
        Ok((Box::new(file), size))
    }

    fn lock_backend(&self) -> &dyn LockBackend {
        &self.locks
    }
}

/// Open upload buffer in `incomplete/`, removed on drop.
struct StagedUpload {
    path: PathBuf,
    file: File,
}

impl StagedUpload {
    fn create(dir: &Path, oid: &Oid) -> Result<Self, Error> {
        let suffix: [u8; 12] = rand::random();
        let path = dir.join(format!("{}{}", oid, hex::encode(suffix)));
        let file = fs::OpenOptions::new().write(true).create_new(true).open(&path)?;
        Ok(StagedUpload { path, file })
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        // the hard link keeps the inode alive on success
        let _ = fs::remove_file(&self.path);
    }
}
