//! Per-path advisory locks with stable IDs.
//!
//! The lock for `path` is a file named `hex(SHA-256("v1:" || path))`
//! whose body is the ASCII text `v1:<unix_seconds>:<path>`. Creation
//! is two-phase: an `O_EXCL` sentinel at `<id>.lock` serializes
//! writers, and a hard link promotes the fully written body to the
//! final name. At most one lock file can exist per path.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use lfs_core::{Error, Lock, LockBackend, LockPage};

const LOCK_VERSION: &str = "v1";
const SENTINEL_SUFFIX: &str = ".lock";

/// Stable lock ID for `path`.
pub fn lock_id(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(LOCK_VERSION.as_bytes());
    hasher.update(b":");
    hasher.update(path.as_bytes());
    hex::encode(hasher.finalize())
}

/// Lock manager over a `locks/` directory.
pub struct FsLockBackend {
    dir: PathBuf,
    timestamp: u64,
    current_user: String,
}

impl FsLockBackend {
    /// Open the manager. `timestamp` stamps every lock this process
    /// creates (one snapshot per session).
    pub fn new(dir: PathBuf, timestamp: u64) -> Self {
        let current_user = super::sys::current_username();
        FsLockBackend { dir, timestamp, current_user }
    }

    fn lock_path(&self, id: &str) -> PathBuf {
        self.dir.join(id)
    }

    fn load(&self, id: &str, path: &Path) -> Result<Lock, Error> {
        let body = match fs::read_to_string(path) {
            Ok(body) => body,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::NotFound),
            Err(e) => return Err(Error::Io(e)),
        };
        let (locked_at, lock_path) = parse_lock_body(&body)?;
        let owner = super::sys::file_owner(path);
        Ok(Lock::new(id.to_owned(), lock_path, locked_at, owner))
    }
}

impl LockBackend for FsLockBackend {
    fn create(&self, path: &str, _refname: Option<&str>) -> Result<Lock, Error> {
        let id = lock_id(path);
        let final_path = self.lock_path(&id);
        let sentinel = Sentinel::create(self.lock_path(&format!("{id}{SENTINEL_SUFFIX}")))?;
        sentinel.write_body(&format!("{LOCK_VERSION}:{}:{path}", self.timestamp))?;
        match fs::hard_link(&sentinel.path, &final_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(Error::Conflict),
            Err(e) => return Err(Error::Io(e)),
        }
        debug!(id = %id, path = %path, "lock created");
        let owner = super::sys::file_owner(&final_path);
        Ok(Lock::new(id, path.to_owned(), self.timestamp, owner))
    }

    fn from_id(&self, id: &str) -> Result<Lock, Error> {
        self.load(id, &self.lock_path(id))
    }

    fn from_path(&self, path: &str) -> Result<Lock, Error> {
        let lock = self.from_id(&lock_id(path))?;
        if lock.path() != path {
            return Err(Error::CorruptData(format!(
                "lock for path {:?} stores path {:?}",
                path,
                lock.path()
            )));
        }
        Ok(lock)
    }

    fn unlock(&self, lock: &Lock) -> Result<(), Error> {
        match fs::remove_file(self.lock_path(lock.id())) {
            Ok(()) => {
                debug!(id = %lock.id(), "lock removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Err(Error::Forbidden),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn range(&self, cursor: &str, limit: usize) -> Result<LockPage, Error> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.ends_with(SENTINEL_SUFFIX) {
                continue;
            }
            if name > cursor {
                ids.push(name.to_owned());
            }
        }
        ids.sort_unstable();

        let mut page = LockPage::default();
        for id in &ids {
            // entries that vanish or fail to parse are skipped
            let Ok(lock) = self.from_id(id) else { continue };
            if page.locks.len() == limit {
                page.next_cursor = page
                    .locks
                    .last()
                    .map(|l| l.id().to_owned())
                    .unwrap_or_default();
                break;
            }
            page.locks.push(lock);
        }
        Ok(page)
    }

    fn current_user(&self) -> &str {
        &self.current_user
    }
}

fn parse_lock_body(body: &str) -> Result<(u64, String), Error> {
    let mut parts = body.splitn(3, ':');
    let (version, seconds, path) = match (parts.next(), parts.next(), parts.next()) {
        (Some(v), Some(s), Some(p)) => (v, s, p),
        _ => return Err(Error::CorruptData(format!("invalid lock data: {body:?}"))),
    };
    if version != LOCK_VERSION {
        return Err(Error::CorruptData(format!("invalid lock version: {version:?}")));
    }
    let locked_at = seconds
        .parse::<u64>()
        .map_err(|_| Error::CorruptData(format!("invalid lock timestamp: {seconds:?}")))?;
    Ok((locked_at, path.to_owned()))
}

/// Creation sentinel, removed on drop whatever the outcome.
struct Sentinel {
    path: PathBuf,
    file: File,
}

impl Sentinel {
    fn create(path: PathBuf) -> Result<Self, Error> {
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => Ok(Sentinel { path, file }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(Error::Conflict),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn write_body(&self, body: &str) -> Result<(), Error> {
        (&self.file).write_all(body.as_bytes())?;
        (&self.file).sync_all()?;
        Ok(())
    }
}

impl Drop for Sentinel {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
