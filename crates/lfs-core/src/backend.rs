//! Backend capability traits consumed by the command processor.
//!
//! Concrete stores are selected once at startup and injected at
//! construction; nothing on the hot path needs dynamic dispatch
//! except the lock backend handle.

use std::fmt;
use std::io::Read;

use chrono::{DateTime, SecondsFormat};

use crate::args::Args;
use crate::error::Error;
use crate::oid::Oid;
use crate::status::Status;

/// Which workload this process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Client pushes objects.
    Upload,
    /// Client pulls objects.
    Download,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Upload => "upload",
            Operation::Download => "download",
        })
    }
}

/// One entry of a batch request or response.
///
/// On input `present` is false and `size` is the client's declared
/// size; the backend flips `present` and substitutes the stored size
/// for objects it already has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// Object ID.
    pub oid: Oid,
    /// Declared size on input, authoritative stored size when present.
    pub size: u64,
    /// True iff the object is currently stored.
    pub present: bool,
    /// Trailing `k=v` tokens of the pointer line, kept for the backend.
    pub args: Args,
}

/// Storage capabilities the processor drives.
pub trait Backend {
    /// Report presence and authoritative sizes for a set of pointers.
    /// Never mutates state.
    fn batch(&self, op: Operation, items: Vec<BatchItem>, args: &Args)
        -> Result<Vec<BatchItem>, Error>;

    /// Ingest one object from `reader`. The caller supplies a reader
    /// that fails before EOF if the stream does not match `oid`, so a
    /// successful return means the object is fully stored.
    fn upload(&self, oid: &Oid, reader: &mut dyn Read, args: &Args) -> Result<(), Error>;

    /// Check that `oid` is stored with exactly `size` bytes.
    fn verify(&self, oid: &Oid, size: u64, args: &Args) -> Result<Status, Error>;

    /// Open a stored object for reading, returning the reader and its size.
    fn download(&self, oid: &Oid, args: &Args) -> Result<(Box<dyn Read>, u64), Error>;

    /// The lock manager for this repository.
    fn lock_backend(&self) -> &dyn LockBackend;
}

/// An advisory exclusive lock on a repository-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    id: String,
    path: String,
    locked_at: u64,
    owner: String,
}

impl Lock {
    /// Assemble a lock value. `locked_at` is in UNIX seconds.
    pub fn new(id: String, path: String, locked_at: u64, owner: String) -> Self {
        Lock { id, path, locked_at, owner }
    }

    /// Stable lock ID (`hex(SHA-256("v1:" || path))`).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Locked path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Creation time in UNIX seconds.
    pub fn locked_at(&self) -> u64 {
        self.locked_at
    }

    /// OS username of the lock creator.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Creation time as RFC 3339 UTC.
    pub fn formatted_timestamp(&self) -> String {
        DateTime::from_timestamp(self.locked_at as i64, 0)
            .unwrap_or(DateTime::UNIX_EPOCH)
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Argument lines used in `lock`, conflict and `unlock` responses.
    pub fn as_arguments(&self) -> Vec<String> {
        vec![
            format!("id={}", self.id),
            format!("path={}", self.path),
            format!("locked-at={}", self.formatted_timestamp()),
            format!("ownername={}", self.owner),
        ]
    }

    /// Lock-spec message lines used in `list-lock` responses. When
    /// `current_user` is given, an ownership line (`ours`/`theirs`)
    /// is appended.
    pub fn as_lock_spec(&self, current_user: Option<&str>) -> Vec<String> {
        let id = &self.id;
        let mut spec = vec![
            format!("lock {id}"),
            format!("path {id} {}", self.path),
            format!("locked-at {id} {}", self.formatted_timestamp()),
            format!("ownername {id} {}", self.owner),
        ];
        if let Some(user) = current_user {
            let who = if user == self.owner { "ours" } else { "theirs" };
            spec.push(format!("owner {id} {who}"));
        }
        spec
    }
}

/// One page of a paginated lock enumeration.
#[derive(Debug, Clone, Default)]
pub struct LockPage {
    /// Locks in lexicographic ID order.
    pub locks: Vec<Lock>,
    /// Last returned ID when further locks remain; empty when exhausted.
    pub next_cursor: String,
}

/// Lock manager capabilities.
pub trait LockBackend {
    /// Create a lock for `path`. An existing lock is a `Conflict`.
    fn create(&self, path: &str, refname: Option<&str>) -> Result<Lock, Error>;

    /// Load a lock by ID. Absent lock files are `NotFound`.
    fn from_id(&self, id: &str) -> Result<Lock, Error>;

    /// Load the lock for `path`, checking the stored path matches.
    fn from_path(&self, path: &str) -> Result<Lock, Error>;

    /// Remove a lock. Absent is `NotFound`; lacking permission is `Forbidden`.
    fn unlock(&self, lock: &Lock) -> Result<(), Error>;

    /// Enumerate locks in lexicographic ID order, starting strictly
    /// after `cursor`, yielding at most `limit` locks.
    fn range(&self, cursor: &str, limit: usize) -> Result<LockPage, Error>;

    /// Username the calling process runs as, for ownership comparison.
    fn current_user(&self) -> &str;
}
