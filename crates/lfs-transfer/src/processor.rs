//! Command dispatch loop and per-command handlers.

use std::io::{Read, Write};

use tracing::{debug, warn};

use lfs_core::args::{self, parse_args};
use lfs_core::oid::valid_hex64;
use lfs_core::{status, Args, Backend, BatchItem, Error, Oid, Operation, Status, VerifyingReader};
use lfs_pktline::Pktline;

use crate::wire;

const DEFAULT_LOCK_LIMIT: usize = 20;
const MAX_LOCK_LIMIT: usize = 100;

/// Per-connection protocol driver.
///
/// One logical task reads a packet, dispatches, and writes the
/// response before reading the next packet; all wire access is
/// serialized through the owned channel.
pub struct Processor<B, R, W> {
    pkt: Pktline<R, W>,
    backend: B,
    op: Operation,
}

impl<B: Backend, R: Read, W: Write> Processor<B, R, W> {
    /// Create a processor serving `op` over `pkt` against `backend`.
    pub fn new(pkt: Pktline<R, W>, backend: B, op: Operation) -> Self {
        Processor { pkt, backend, op }
    }

    /// Write the capability advertisement. Runs before [`Self::run`]
    /// so a client that disconnects right away still sees a
    /// well-formed handshake.
    pub fn greet(&mut self) -> Result<(), Error> {
        wire::advertise(&mut self.pkt)
    }

    /// Dispatch commands until EOF or `quit`. Errors returned from
    /// here are wire failures; command failures are answered in-band.
    pub fn run(&mut self) -> Result<(), Error> {
        loop {
            let line = match self.pkt.read_packet_text()? {
                Some(line) => line,
                None => return Ok(()),
            };
            let (verb, rest) = match line.split_once(' ') {
                Some((verb, rest)) => (verb, rest),
                None => (line.as_str(), ""),
            };
            debug!(verb, rest, "command received");

            let outcome = match verb {
                "version" => self.version(rest),
                "batch" => self.batch(),
                "put-object" => match parse_operand(rest) {
                    Ok(oid) => self.put_object(&oid),
                    Err(status) => Ok(status),
                },
                "verify-object" => match parse_operand(rest) {
                    Ok(oid) => self.verify_object(&oid),
                    Err(status) => Ok(status),
                },
                "get-object" => match parse_operand(rest) {
                    Ok(oid) => self.get_object(&oid),
                    Err(status) => Ok(status),
                },
                "lock" => self.lock(),
                "list-lock" | "list-locks" => self.list_locks(),
                "unlock" => {
                    if rest.is_empty() {
                        Ok(Status::failure(status::BAD_REQUEST, "unknown command"))
                    } else {
                        self.unlock(rest)
                    }
                }
                "quit" => {
                    wire::send_status(&mut self.pkt, Status::ok())?;
                    return Ok(());
                }
                _ => Ok(Status::failure(status::BAD_REQUEST, "unknown command")),
            };

            let response = outcome.unwrap_or_else(|err| error_status(&err));
            wire::send_status(&mut self.pkt, response)?;
        }
    }

    fn version(&mut self, argument: &str) -> Result<Status, Error> {
        self.pkt.read_to_flush().map_err(parse_error)?;
        if argument == "1" {
            Ok(Status::ok())
        } else {
            Ok(Status::failure(status::BAD_REQUEST, "unknown version"))
        }
    }

    fn batch(&mut self) -> Result<Status, Error> {
        let arg_lines = self.pkt.read_to_delim().map_err(parse_error)?;
        let request_args = parse_args(&arg_lines)?;
        let pointer_lines = self.pkt.read_to_flush().map_err(parse_error)?;

        match request_args.get(args::HASH_ALGO_KEY).map(String::as_str) {
            None | Some("") | Some("sha256") => {}
            Some(other) => {
                return Err(Error::NotAllowed(format!("unsupported hash algorithm: {other}")))
            }
        }

        let mut items = Vec::with_capacity(pointer_lines.len());
        for line in &pointer_lines {
            items.push(parse_pointer_line(line)?);
        }
        let items = self.backend.batch(self.op, items, &request_args)?;

        let (present_action, missing_action) = match self.op {
            Operation::Upload => ("noop", "upload"),
            Operation::Download => ("download", "noop"),
        };
        let lines = items
            .iter()
            .map(|item| {
                let action = if item.present { present_action } else { missing_action };
                format!("{} {} {}", item.oid, item.size, action)
            })
            .collect();
        Ok(Status::with_messages(lines))
    }

    fn put_object(&mut self, oid: &Oid) -> Result<Status, Error> {
        let arg_lines = self.pkt.read_to_delim().map_err(parse_error)?;
        let request_args = parse_args(&arg_lines)?;
        let size = required_size(&request_args)?;
        debug!(oid = %oid, size, "put-object");

        let data = self.pkt.data_reader();
        let mut reader = VerifyingReader::new(data, oid.clone(), size);
        self.backend.upload(oid, &mut reader, &request_args)?;
        Ok(Status::ok())
    }

    fn verify_object(&mut self, oid: &Oid) -> Result<Status, Error> {
        let arg_lines = self.pkt.read_to_flush().map_err(parse_error)?;
        let request_args = parse_args(&arg_lines)?;
        let size = required_size(&request_args)?;
        self.backend.verify(oid, size, &request_args)
    }

    fn get_object(&mut self, oid: &Oid) -> Result<Status, Error> {
        let arg_lines = self.pkt.read_to_flush().map_err(parse_error)?;
        let request_args = parse_args(&arg_lines)?;
        match self.backend.download(oid, &request_args) {
            Ok((reader, size)) => Ok(Status::with_reader(reader, size)),
            Err(Error::NotFound) => Ok(Status::failure(status::NOT_FOUND, "not found")),
            Err(err) => Err(err),
        }
    }

    fn lock(&mut self) -> Result<Status, Error> {
        let arg_lines = self.pkt.read_to_flush().map_err(parse_error)?;
        let request_args = parse_args(&arg_lines)?;
        let path = match request_args.get(args::PATH_KEY) {
            Some(path) if !path.is_empty() => path.as_str(),
            _ => return Err(Error::MissingData("path is required".into())),
        };
        let refname = request_args.get(args::REFNAME_KEY).map(String::as_str);

        let locks = self.backend.lock_backend();
        for _ in 0..2 {
            match locks.create(path, refname) {
                Ok(lock) => {
                    return Ok(Status::with_code_args(status::CREATED, lock.as_arguments()))
                }
                Err(Error::Conflict) => match locks.from_path(path) {
                    Ok(existing) => {
                        return Ok(Status::failure_with_args(
                            status::CONFLICT,
                            "conflict",
                            existing.as_arguments(),
                        ))
                    }
                    // the winner vanished before we could read it
                    Err(Error::NotFound) => continue,
                    Err(err) => return Err(err),
                },
                Err(err) => return Err(err),
            }
        }
        Err(Error::Internal("lock state changed during creation".into()))
    }

    fn list_locks(&mut self) -> Result<Status, Error> {
        let arg_lines = self.pkt.read_to_flush().map_err(parse_error)?;
        let request_args = parse_args(&arg_lines)?;
        let limit = match request_args.get(args::LIMIT_KEY) {
            None => DEFAULT_LOCK_LIMIT,
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| Error::ParseError(format!("invalid limit: {raw:?}")))?
                .clamp(1, MAX_LOCK_LIMIT),
        };
        let cursor = request_args.get(args::CURSOR_KEY).map(String::as_str).unwrap_or("");

        let locks = self.backend.lock_backend();
        // ownership comparison is only meaningful for the writer side
        let current_user = match self.op {
            Operation::Upload => Some(locks.current_user().to_owned()),
            Operation::Download => None,
        };
        let current_user = current_user.as_deref();

        if let Some(path) = request_args.get(args::PATH_KEY).filter(|p| !p.is_empty()) {
            return match locks.from_path(path) {
                Ok(lock) => Ok(Status::with_messages(lock.as_lock_spec(current_user))),
                Err(Error::NotFound) => Ok(Status::failure(status::NOT_FOUND, "not found")),
                Err(err) => Err(err),
            };
        }

        let page = locks.range(cursor, limit)?;
        let messages = page
            .locks
            .iter()
            .flat_map(|lock| lock.as_lock_spec(current_user))
            .collect();
        let mut response = Status::with_messages(messages);
        if !page.next_cursor.is_empty() {
            response.args.push(format!("next-cursor={}", page.next_cursor));
        }
        Ok(response)
    }

    fn unlock(&mut self, id: &str) -> Result<Status, Error> {
        self.pkt.read_to_flush().map_err(parse_error)?;
        if !valid_hex64(id) {
            return Err(Error::ParseError(format!("invalid lock id: {id:?}")));
        }
        let locks = self.backend.lock_backend();
        let lock = match locks.from_id(id) {
            Ok(lock) => lock,
            Err(Error::NotFound) => return Ok(Status::failure(status::NOT_FOUND, "not found")),
            Err(err) => return Err(err),
        };
        match locks.unlock(&lock) {
            Ok(()) => Ok(Status::with_code_args(status::OK, lock.as_arguments())),
            Err(Error::NotFound) => Ok(Status::failure(status::NOT_FOUND, "not found")),
            Err(Error::Forbidden) => Ok(Status::failure(status::FORBIDDEN, "forbidden")),
            Err(err) => Err(err),
        }
    }
}

/// Map a command failure to its in-band status frame.
fn error_status(err: &Error) -> Status {
    let code = err.status_code();
    match code {
        status::INTERNAL_SERVER_ERROR => {
            warn!(error = %err, "command failed");
            Status::failure(code, "internal error")
        }
        status::NOT_FOUND => Status::failure(code, "not found"),
        status::FORBIDDEN => Status::failure(code, "forbidden"),
        status::CONFLICT => Status::failure(code, "conflict"),
        _ => Status::failure(code, format!("error: {err}")),
    }
}

/// A missing command operand is answered like the original server:
/// a 403 with the bare `not allowed` phrase.
fn parse_operand(rest: &str) -> Result<Oid, Status> {
    if rest.is_empty() {
        return Err(Status::failure(status::FORBIDDEN, "not allowed"));
    }
    rest.parse::<Oid>().map_err(|err| error_status(&err))
}

fn parse_error(err: Error) -> Error {
    Error::ParseError(err.to_string())
}

fn required_size(request_args: &Args) -> Result<u64, Error> {
    let raw = request_args
        .get(args::SIZE_KEY)
        .ok_or_else(|| Error::MissingData("missing required size argument".into()))?;
    raw.parse::<u64>()
        .map_err(|_| Error::ParseError(format!("invalid size: {raw:?}")))
}

/// Parse one batch pointer line: `oid SP size [SP k=v]*`.
fn parse_pointer_line(line: &str) -> Result<BatchItem, Error> {
    if line.is_empty() {
        return Err(Error::InvalidPacket);
    }
    let mut tokens = line.split(' ');
    let oid_token = tokens.next().unwrap_or("");
    let size_token = tokens.next().unwrap_or("");
    if size_token.is_empty() {
        return Err(Error::ParseError(format!("malformed pointer line: {line:?}")));
    }
    let oid: Oid = oid_token.parse()?;
    let size = size_token
        .parse::<u64>()
        .map_err(|_| Error::ParseError(format!("invalid integer, got: {size_token:?}")))?;
    let item_args = parse_args(tokens)?;
    Ok(BatchItem { oid, size, present: false, args: item_args })
}
