//! Textual `key=value` argument sections.

use std::collections::BTreeMap;

use crate::error::Error;

/// Parsed argument map of a request preamble.
pub type Args = BTreeMap<String, String>;

/// Client hash algorithm; only empty or `sha256` is accepted.
pub const HASH_ALGO_KEY: &str = "hash-algo";
/// Transport hint (informational).
pub const TRANSFER_KEY: &str = "transfer";
/// Git ref context for locks.
pub const REFNAME_KEY: &str = "refname";
/// Informational expiry (relative seconds).
pub const EXPIRES_IN_KEY: &str = "expires-in";
/// Informational expiry (absolute).
pub const EXPIRES_AT_KEY: &str = "expires-at";
/// Declared object size in bytes (decimal).
pub const SIZE_KEY: &str = "size";
/// Lock path.
pub const PATH_KEY: &str = "path";
/// List paging limit.
pub const LIMIT_KEY: &str = "limit";
/// List paging cursor (a lock ID).
pub const CURSOR_KEY: &str = "cursor";

/// Parse `key=value` lines into a map. A line without `=` is rejected.
pub fn parse_args<I, S>(lines: I) -> Result<Args, Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut args = Args::new();
    for line in lines {
        let line = line.as_ref();
        match line.split_once('=') {
            Some((key, value)) => {
                args.insert(key.to_owned(), value.to_owned());
            }
            None => return Err(Error::ParseError(format!("invalid argument: {line:?}"))),
        }
    }
    Ok(args)
}
