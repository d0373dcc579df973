//! Core primitives shared across the Git LFS SSH transfer agent.
//!
//! Wire-level value types (object IDs, argument maps, status frames),
//! the flat error taxonomy, the hashing/verifying readers used during
//! ingest, and the backend capability traits the command processor is
//! written against.

#![deny(unsafe_code)]

pub mod args;
pub mod backend;
pub mod clock;
pub mod error;
pub mod hash;
pub mod oid;
pub mod status;

pub use args::Args;
pub use backend::{Backend, BatchItem, Lock, LockBackend, LockPage, Operation};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::Error;
pub use hash::{HashingReader, VerifyingReader};
pub use oid::Oid;
pub use status::Status;

/// Version of the core library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
