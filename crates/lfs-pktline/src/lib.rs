//! Git pkt-line framing.
//!
//! Frames are length-prefixed: four ASCII hex digits giving the total
//! packet length (header included) followed by the payload. The
//! lengths 0, 1 and 2 are reserved as the flush, delim and
//! response-end markers. Data packets carry 1..=65516 payload bytes;
//! an empty data packet is illegal (distinct from flush).
//!
//! [`Pktline`] couples one reader and one writer and exposes packet,
//! text-line and byte-stream views of the same channel. The framing
//! layer is not re-entrant; callers serialize all reads and writes.

#![deny(unsafe_code)]

use std::io::{self, Read, Write};

use lfs_core::Error;

/// Largest legal total packet length, header included.
pub const MAX_PACKET_LENGTH: usize = 65520;
/// Largest legal payload per data packet.
pub const MAX_PAYLOAD_LENGTH: usize = MAX_PACKET_LENGTH - 4;

const HEADER_LENGTH: usize = 4;

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Data packet with a non-empty payload.
    Data(Vec<u8>),
    /// `0000` section terminator.
    Flush,
    /// `0001` sub-section delimiter.
    Delim,
    /// `0002` response-end marker (accepted, never emitted here).
    ResponseEnd,
}

/// Packet-line channel over a reader/writer pair.
pub struct Pktline<R, W> {
    reader: R,
    writer: W,
}

impl<R: Read, W: Write> Pktline<R, W> {
    /// Create a channel over `reader`/`writer`.
    pub fn new(reader: R, writer: W) -> Self {
        Pktline { reader, writer }
    }

    /// Consume the channel, returning the underlying streams.
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// Read one packet. `None` is a clean EOF at a frame boundary;
    /// EOF anywhere inside a frame is an I/O error.
    pub fn read_packet(&mut self) -> Result<Option<Packet>, Error> {
        let mut header = [0u8; HEADER_LENGTH];
        let mut filled = 0;
        while filled < HEADER_LENGTH {
            match self.reader.read(&mut header[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "truncated packet header",
                    )))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
        let length = parse_header(&header)?;
        match length {
            0 => Ok(Some(Packet::Flush)),
            1 => Ok(Some(Packet::Delim)),
            2 => Ok(Some(Packet::ResponseEnd)),
            // 3 is not a marker; 4 would be an empty data packet
            3 | 4 => Err(Error::InvalidPacket),
            _ if length > MAX_PACKET_LENGTH => Err(Error::InvalidPacket),
            _ => {
                let mut payload = vec![0u8; length - HEADER_LENGTH];
                self.reader.read_exact(&mut payload).map_err(|e| {
                    Error::Io(io::Error::new(e.kind(), "truncated packet payload"))
                })?;
                Ok(Some(Packet::Data(payload)))
            }
        }
    }

    /// Read one packet as text, stripping a single trailing newline.
    /// Flush, delim and response-end all surface as an empty string;
    /// `None` is clean EOF.
    pub fn read_packet_text(&mut self) -> Result<Option<String>, Error> {
        match self.read_packet()? {
            None => Ok(None),
            Some(Packet::Data(payload)) => Ok(Some(text_payload(payload)?)),
            Some(_) => Ok(Some(String::new())),
        }
    }

    /// Read text packets until a delim marker.
    pub fn read_to_delim(&mut self) -> Result<Vec<String>, Error> {
        self.read_list(Terminator::Delim)
    }

    /// Read text packets until a flush marker.
    pub fn read_to_flush(&mut self) -> Result<Vec<String>, Error> {
        self.read_list(Terminator::Flush)
    }

    fn read_list(&mut self, until: Terminator) -> Result<Vec<String>, Error> {
        let mut lines = Vec::new();
        loop {
            match self.read_packet()? {
                None => {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "eof before section terminator",
                    )))
                }
                Some(Packet::Data(payload)) => lines.push(text_payload(payload)?),
                Some(Packet::Flush) | Some(Packet::ResponseEnd) => {
                    if until == Terminator::Flush {
                        return Ok(lines);
                    }
                    return Err(Error::InvalidPacket);
                }
                Some(Packet::Delim) => {
                    if until == Terminator::Delim {
                        return Ok(lines);
                    }
                    return Err(Error::InvalidPacket);
                }
            }
        }
    }

    /// Write one binary data packet. Payloads must be 1..=65516 bytes.
    pub fn write_packet(&mut self, payload: &[u8]) -> Result<(), Error> {
        if payload.is_empty() || payload.len() > MAX_PAYLOAD_LENGTH {
            return Err(Error::InvalidPacket);
        }
        let header = format!("{:04x}", payload.len() + HEADER_LENGTH);
        self.writer.write_all(header.as_bytes())?;
        self.writer.write_all(payload)?;
        Ok(())
    }

    /// Write one text packet with a trailing newline appended.
    pub fn write_packet_text(&mut self, text: &str) -> Result<(), Error> {
        let mut payload = Vec::with_capacity(text.len() + 1);
        payload.extend_from_slice(text.as_bytes());
        payload.push(b'\n');
        self.write_packet(&payload)
    }

    /// Write a flush marker and flush the underlying writer.
    pub fn write_flush(&mut self) -> Result<(), Error> {
        self.writer.write_all(b"0000")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write a delim marker.
    pub fn write_delim(&mut self) -> Result<(), Error> {
        self.writer.write_all(b"0001")?;
        Ok(())
    }

    /// Byte-stream view over the data packets up to the next flush.
    /// The terminating flush is consumed.
    pub fn data_reader(&mut self) -> DataReader<'_, R, W> {
        DataReader { pkt: self, buf: Vec::new(), pos: 0, done: false }
    }

    /// Byte-stream view that splits writes into data packets of at
    /// most `max_payload` bytes (clamped to the legal maximum; 0
    /// selects the maximum). The terminating flush is the caller's.
    pub fn data_writer(&mut self, max_payload: usize) -> DataWriter<'_, R, W> {
        let max = match max_payload {
            0 => MAX_PAYLOAD_LENGTH,
            n => n.min(MAX_PAYLOAD_LENGTH),
        };
        DataWriter { pkt: self, max }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Terminator {
    Flush,
    Delim,
}

fn parse_header(header: &[u8; HEADER_LENGTH]) -> Result<usize, Error> {
    let text = std::str::from_utf8(header).map_err(|_| Error::InvalidPacket)?;
    let length = usize::from_str_radix(text, 16).map_err(|_| Error::InvalidPacket)?;
    Ok(length)
}

fn text_payload(payload: Vec<u8>) -> Result<String, Error> {
    let mut text = String::from_utf8(payload)
        .map_err(|_| Error::ParseError("packet payload is not valid utf-8".into()))?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

/// Reader over the data packets of one section.
pub struct DataReader<'a, R: Read, W: Write> {
    pkt: &'a mut Pktline<R, W>,
    buf: Vec<u8>,
    pos: usize,
    done: bool,
}

impl<R: Read, W: Write> Read for DataReader<'_, R, W> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.buf.len() {
            if self.done {
                return Ok(0);
            }
            match self.pkt.read_packet().map_err(io::Error::from)? {
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "eof before flush in data stream",
                    ))
                }
                Some(Packet::Data(payload)) => {
                    self.buf = payload;
                    self.pos = 0;
                }
                Some(Packet::Flush) | Some(Packet::ResponseEnd) => {
                    self.done = true;
                    return Ok(0);
                }
                Some(Packet::Delim) => return Err(Error::InvalidPacket.into()),
            }
        }
        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Writer that frames a byte stream into data packets.
pub struct DataWriter<'a, R: Read, W: Write> {
    pkt: &'a mut Pktline<R, W>,
    max: usize,
}

impl<R: Read, W: Write> Write for DataWriter<'_, R, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for chunk in buf.chunks(self.max) {
            self.pkt.write_packet(chunk).map_err(io::Error::from)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.pkt.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn channel(input: &[u8]) -> Pktline<Cursor<Vec<u8>>, Vec<u8>> {
        Pktline::new(Cursor::new(input.to_vec()), Vec::new())
    }

    #[test]
    fn reads_data_and_markers() {
        let mut pkt = channel(b"0009hello0000000100abc");
        assert_eq!(pkt.read_packet().unwrap(), Some(Packet::Data(b"hello".to_vec())));
        assert_eq!(pkt.read_packet().unwrap(), Some(Packet::Flush));
        assert_eq!(pkt.read_packet().unwrap(), Some(Packet::Delim));
        assert!(pkt.read_packet().is_err());
    }

    #[test]
    fn clean_eof_is_none() {
        let mut pkt = channel(b"");
        assert_eq!(pkt.read_packet().unwrap(), None);
    }

    #[test]
    fn truncated_header_is_io_error() {
        let mut pkt = channel(b"00");
        assert!(matches!(pkt.read_packet().unwrap_err(), Error::Io(_)));
    }

    #[test]
    fn truncated_payload_is_io_error() {
        let mut pkt = channel(b"0009hel");
        assert!(matches!(pkt.read_packet().unwrap_err(), Error::Io(_)));
    }

    #[test]
    fn malformed_headers_are_invalid_packets() {
        for input in [&b"00zzabcd"[..], &b"0003"[..], &b"0004"[..], &b"fff1abcd"[..]] {
            let mut pkt = channel(input);
            assert!(
                matches!(pkt.read_packet().unwrap_err(), Error::InvalidPacket),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn text_packet_strips_one_newline() {
        let mut pkt = channel(b"000eversion 1\n");
        assert_eq!(pkt.read_packet_text().unwrap(), Some("version 1".to_owned()));

        let mut pkt = channel(b"0006a\n\n");
        assert_eq!(pkt.read_packet_text().unwrap(), Some("a\n".to_owned()));
    }

    #[test]
    fn flush_reads_as_empty_text() {
        let mut pkt = channel(b"0000");
        assert_eq!(pkt.read_packet_text().unwrap(), Some(String::new()));
    }

    #[test]
    fn read_lists_honor_terminators() {
        let mut pkt = channel(b"000bsize=6\n0001000aabc1230000");
        assert_eq!(pkt.read_to_delim().unwrap(), vec!["size=6".to_owned()]);

        let mut pkt = channel(b"000dpath=foo\n0000");
        assert_eq!(pkt.read_to_flush().unwrap(), vec!["path=foo".to_owned()]);

        // wrong terminator
        let mut pkt = channel(b"000bsize=6\n0000");
        assert!(matches!(pkt.read_to_delim().unwrap_err(), Error::InvalidPacket));

        // eof before terminator
        let mut pkt = channel(b"000bsize=6\n");
        assert!(matches!(pkt.read_to_flush().unwrap_err(), Error::Io(_)));
    }

    #[test]
    fn writes_text_with_newline_and_markers() {
        let mut pkt = channel(b"");
        pkt.write_packet_text("version=1").unwrap();
        pkt.write_packet_text("locking").unwrap();
        pkt.write_flush().unwrap();
        pkt.write_delim().unwrap();
        assert_eq!(pkt.writer, b"000eversion=1\n000clocking\n00000001");
    }

    #[test]
    fn write_rejects_empty_and_oversized_payloads() {
        let mut pkt = channel(b"");
        assert!(matches!(pkt.write_packet(b"").unwrap_err(), Error::InvalidPacket));
        let big = vec![0u8; MAX_PAYLOAD_LENGTH + 1];
        assert!(matches!(pkt.write_packet(&big).unwrap_err(), Error::InvalidPacket));
    }

    #[test]
    fn round_trips_arbitrary_payloads() {
        // write-then-read is exact for any payload up to the limit
        for payload in [b"x".to_vec(), vec![0u8; 1000], vec![0xa9; MAX_PAYLOAD_LENGTH]] {
            let mut pkt = channel(b"");
            pkt.write_packet(&payload).unwrap();
            let written = pkt.writer.clone();
            let mut back = channel(&written);
            assert_eq!(back.read_packet().unwrap(), Some(Packet::Data(payload)));
        }
    }

    #[test]
    fn data_reader_stops_at_flush_and_leaves_rest() {
        let mut pkt = channel(b"0009hello0009world0000000eversion 1\n");
        let mut out = Vec::new();
        pkt.data_reader().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"helloworld");
        // the next packet after the consumed flush is still readable
        assert_eq!(pkt.read_packet_text().unwrap(), Some("version 1".to_owned()));
    }

    #[test]
    fn data_reader_errors_on_eof_before_flush() {
        let mut pkt = channel(b"0009hello");
        let err = pkt.data_reader().read_to_end(&mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn data_writer_chunks_large_streams() {
        let mut pkt = channel(b"");
        let payload = vec![7u8; MAX_PAYLOAD_LENGTH + 10];
        {
            let mut w = pkt.data_writer(0);
            w.write_all(&payload).unwrap();
        }
        pkt.write_flush().unwrap();

        let written = pkt.writer.clone();
        let mut back = channel(&written);
        assert_eq!(
            back.read_packet().unwrap(),
            Some(Packet::Data(vec![7u8; MAX_PAYLOAD_LENGTH]))
        );
        assert_eq!(back.read_packet().unwrap(), Some(Packet::Data(vec![7u8; 10])));
        assert_eq!(back.read_packet().unwrap(), Some(Packet::Flush));
    }

    #[test]
    fn data_writer_respects_custom_max() {
        let mut pkt = channel(b"");
        {
            let mut w = pkt.data_writer(4);
            w.write_all(b"abcdefghij").unwrap();
        }
        assert_eq!(pkt.writer, b"0008abcd0008efgh0006ij");
    }
}
