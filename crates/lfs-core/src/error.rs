//! Error taxonomy for the transfer agent.
//!
//! Every fallible operation in the workspace returns one of these flat
//! kinds. The `Display` strings double as the wire reason phrases: the
//! processor formats non-fatal failures as `error: <kind>: <details>`,
//! so the phrasing here is part of the protocol surface.

use crate::status;

/// Flat error kinds with a human message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A lock (or upload) already exists for the requested resource.
    #[error("conflict")]
    Conflict,
    /// The requested object or lock does not exist.
    #[error("not found")]
    NotFound,
    /// The caller may not perform this operation on this resource.
    #[error("forbidden")]
    Forbidden,
    /// The request is understood but rejected (e.g. unsupported hash algorithm).
    #[error("not allowed: {0}")]
    NotAllowed(String),
    /// The request is malformed at the command level.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Streamed bytes do not match the declared object ID.
    #[error("corrupt data: {0}")]
    CorruptData(String),
    /// More bytes arrived than the declared size.
    #[error("extra data: {0}")]
    ExtraData(String),
    /// Fewer bytes arrived than the declared size, or a required field is absent.
    #[error("missing data: {0}")]
    MissingData(String),
    /// A frame violated the packet-line format.
    #[error("invalid packet")]
    InvalidPacket,
    /// A packet payload could not be parsed.
    #[error("parse error: {0}")]
    ParseError(String),
    /// Underlying I/O failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// Anything that should never reach the client in detail.
    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    /// Status code this error maps to when surfaced as a response frame.
    pub fn status_code(&self) -> u32 {
        match self {
            Error::Conflict => status::CONFLICT,
            Error::NotFound => status::NOT_FOUND,
            Error::Forbidden => status::FORBIDDEN,
            Error::NotAllowed(_) => status::METHOD_NOT_ALLOWED,
            Error::BadRequest(_)
            | Error::CorruptData(_)
            | Error::ExtraData(_)
            | Error::MissingData(_)
            | Error::InvalidPacket
            | Error::ParseError(_) => status::BAD_REQUEST,
            Error::Io(_) | Error::Internal(_) => status::INTERNAL_SERVER_ERROR,
        }
    }

    /// Recover a taxonomy error smuggled through an `std::io::Error`.
    ///
    /// The verifying reader reports size/digest mismatches through the
    /// `Read` contract; `io::copy` hands them back wrapped. Anything
    /// that is not ours stays `Io`.
    pub fn from_io(err: std::io::Error) -> Error {
        if err.get_ref().map_or(false, |inner| inner.is::<Error>()) {
            match err.into_inner().map(|inner| inner.downcast::<Error>()) {
                Some(Ok(e)) => *e,
                _ => Error::Internal("error context lost in io conversion".into()),
            }
        } else {
            Error::Io(err)
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_wire_grammar() {
        let err = Error::NotAllowed("unsupported hash algorithm: sha512".into());
        assert_eq!(
            format!("error: {err}"),
            "error: not allowed: unsupported hash algorithm: sha512"
        );
        assert_eq!(Error::Conflict.to_string(), "conflict");
        assert_eq!(Error::NotFound.to_string(), "not found");
    }

    #[test]
    fn status_codes() {
        assert_eq!(Error::Conflict.status_code(), 409);
        assert_eq!(Error::NotAllowed(String::new()).status_code(), 405);
        assert_eq!(Error::CorruptData(String::new()).status_code(), 400);
        assert_eq!(Error::Internal(String::new()).status_code(), 500);
    }

    #[test]
    fn io_round_trip_preserves_kind() {
        let original = Error::ExtraData("invalid size, expected 1, got 2".into());
        let io_err: std::io::Error = original.into();
        match Error::from_io(io_err) {
            Error::ExtraData(msg) => assert_eq!(msg, "invalid size, expected 1, got 2"),
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn plain_io_stays_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(Error::from_io(io_err), Error::Io(_)));
    }
}
