//! Streaming SHA-256 over a reader, with an integrity-checking variant.

use std::io::{self, Read};

use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::oid::Oid;

/// Reader adapter that maintains a running SHA-256 and byte count.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
    size: u64,
}

impl<R: Read> HashingReader<R> {
    /// Wrap `inner`.
    pub fn new(inner: R) -> Self {
        HashingReader { inner, hasher: Sha256::new(), size: 0 }
    }

    /// Bytes read so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Hex digest of the bytes read so far.
    pub fn oid(&self) -> String {
        hex::encode(self.hasher.clone().finalize())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.size += n as u64;
        Ok(n)
    }
}

/// Reader adapter that checks the stream against an expected `(oid, size)`
/// pair at end of stream.
///
/// On clean EOF the byte count is compared first: a long stream fails
/// with `ExtraData`, a short one with `MissingData`. Only when the
/// sizes agree is the digest compared, failing with `CorruptData`.
/// The failure is reported through the `Read` contract so that
/// `io::copy` aborts before the consumer commits the bytes.
pub struct VerifyingReader<R> {
    inner: HashingReader<R>,
    expected_oid: Oid,
    expected_size: u64,
}

impl<R: Read> VerifyingReader<R> {
    /// Wrap `inner`, expecting exactly `size` bytes hashing to `oid`.
    pub fn new(inner: R, oid: Oid, size: u64) -> Self {
        VerifyingReader { inner: HashingReader::new(inner), expected_oid: oid, expected_size: size }
    }

    fn check(&self) -> Result<(), Error> {
        let actual_size = self.inner.size();
        if actual_size != self.expected_size {
            let detail = format!(
                "invalid size, expected {}, got {}",
                self.expected_size, actual_size
            );
            return Err(if actual_size > self.expected_size {
                Error::ExtraData(detail)
            } else {
                Error::MissingData(detail)
            });
        }
        let actual_oid = self.inner.oid();
        if actual_oid != self.expected_oid.as_str() {
            return Err(Error::CorruptData(format!(
                "invalid object ID, expected {}, got {}",
                self.expected_oid, actual_oid
            )));
        }
        Ok(())
    }
}

impl<R: Read> Read for VerifyingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.check().map_err(io::Error::from)?;
        }
        Ok(n)
    }
}
