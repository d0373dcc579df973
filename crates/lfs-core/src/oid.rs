//! Object identifiers: lowercase hex SHA-256 digests.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A Git LFS object ID: exactly 64 lowercase hexadecimal characters.
///
/// Every value read from the wire or from disk passes through this
/// check, so downstream code can join IDs into filesystem paths
/// without further validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(String);

/// Returns true for a 64-character lowercase hex string.
pub fn valid_hex64(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

impl Oid {
    /// The hex digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First two-level bucket components of the sharded on-disk layout.
    pub fn buckets(&self) -> (&str, &str) {
        (&self.0[0..2], &self.0[2..4])
    }
}

impl FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        if valid_hex64(s) {
            Ok(Oid(s.to_owned()))
        } else {
            Err(Error::ParseError(format!("invalid oid: {s:?}")))
        }
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "6ca13d52ca70c883e0f0bb101e425a89e8624de51db2d2392593af6a84118090";

    #[test]
    fn parses_valid_oid() {
        let oid: Oid = SAMPLE.parse().unwrap();
        assert_eq!(oid.as_str(), SAMPLE);
        assert_eq!(oid.buckets(), ("6c", "a1"));
    }

    #[test]
    fn rejects_bad_oids() {
        assert!("".parse::<Oid>().is_err());
        assert!("6ca13d52".parse::<Oid>().is_err());
        // uppercase is not canonical
        assert!(SAMPLE.to_uppercase().parse::<Oid>().is_err());
        // non-hex character
        let mut bad = SAMPLE.to_owned();
        bad.replace_range(0..1, "g");
        assert!(bad.parse::<Oid>().is_err());
    }
}
