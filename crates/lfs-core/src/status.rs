//! Response status frames.
//!
//! A status is written on the wire as one `status <code>` text packet,
//! argument packets, a delim marker, then either message packets or a
//! streamed payload, terminated by a flush. This module only models
//! the value; the transfer crate owns the framing.

use std::io::Read;

/// 200 OK.
pub const OK: u32 = 200;
/// 201 Created.
pub const CREATED: u32 = 201;
/// 400 Bad Request.
pub const BAD_REQUEST: u32 = 400;
/// 403 Forbidden.
pub const FORBIDDEN: u32 = 403;
/// 404 Not Found.
pub const NOT_FOUND: u32 = 404;
/// 405 Method Not Allowed.
pub const METHOD_NOT_ALLOWED: u32 = 405;
/// 409 Conflict.
pub const CONFLICT: u32 = 409;
/// 500 Internal Server Error.
pub const INTERNAL_SERVER_ERROR: u32 = 500;

/// One response frame: code, argument lines, and either message lines
/// or a streamed payload.
pub struct Status {
    /// Numeric code in the HTTP namespace.
    pub code: u32,
    /// `key=value` argument lines written before the delim.
    pub args: Vec<String>,
    /// Message lines written after the delim.
    pub messages: Vec<String>,
    /// Streamed payload written after the delim (used by `get-object`).
    pub reader: Option<Box<dyn Read>>,
}

impl Status {
    /// Bare 200.
    pub fn ok() -> Self {
        Status { code: OK, args: Vec::new(), messages: Vec::new(), reader: None }
    }

    /// 200 with message lines.
    pub fn with_messages(messages: Vec<String>) -> Self {
        Status { code: OK, args: Vec::new(), messages, reader: None }
    }

    /// Success with an explicit code and argument lines.
    pub fn with_code_args(code: u32, args: Vec<String>) -> Self {
        Status { code, args, messages: Vec::new(), reader: None }
    }

    /// 200 streaming `size` payload bytes; the size is advertised as an argument.
    pub fn with_reader(reader: Box<dyn Read>, size: u64) -> Self {
        Status {
            code: OK,
            args: vec![format!("size={size}")],
            messages: Vec::new(),
            reader: Some(reader),
        }
    }

    /// Failure with a single reason-phrase message.
    pub fn failure(code: u32, message: impl Into<String>) -> Self {
        Status { code, args: Vec::new(), messages: vec![message.into()], reader: None }
    }

    /// Failure carrying argument lines (e.g. the holder of a conflicting lock).
    pub fn failure_with_args(code: u32, message: impl Into<String>, args: Vec<String>) -> Self {
        Status { code, args, messages: vec![message.into()], reader: None }
    }

    /// True for 2xx codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

impl std::fmt::Debug for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Status")
            .field("code", &self.code)
            .field("args", &self.args)
            .field("messages", &self.messages)
            .field("reader", &self.reader.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors() {
        assert!(Status::ok().is_success());
        assert!(!Status::failure(NOT_FOUND, "not found").is_success());

        let s = Status::with_reader(Box::new(std::io::empty()), 32);
        assert_eq!(s.code, OK);
        assert_eq!(s.args, vec!["size=32".to_owned()]);
        assert!(s.reader.is_some());

        let s = Status::failure_with_args(CONFLICT, "conflict", vec!["id=abc".into()]);
        assert_eq!(s.code, CONFLICT);
        assert_eq!(s.messages, vec!["conflict".to_owned()]);
        assert_eq!(s.args, vec!["id=abc".to_owned()]);
    }
}
