//! Status frame serialization.

use std::io::{self, Read, Write};

use lfs_core::{Error, Status};
use lfs_pktline::Pktline;

/// Capability lines advertised before the dispatch loop.
pub const CAPABILITIES: &[&str] = &["version=1", "locking"];

/// Write the capability advertisement.
pub fn advertise<R: Read, W: Write>(pkt: &mut Pktline<R, W>) -> Result<(), Error> {
    for cap in CAPABILITIES {
        pkt.write_packet_text(cap)?;
    }
    pkt.write_flush()
}

/// Write one status frame: the `status <code>` line, argument lines,
/// a delim, then message lines or the streamed payload, then flush.
/// The delim is written even when both sides are empty.
pub fn send_status<R: Read, W: Write>(
    pkt: &mut Pktline<R, W>,
    mut status: Status,
) -> Result<(), Error> {
    pkt.write_packet_text(&format!("status {}", status.code))?;
    for arg in &status.args {
        pkt.write_packet_text(arg)?;
    }
    pkt.write_delim()?;
    if !status.messages.is_empty() {
        for message in &status.messages {
            pkt.write_packet_text(message)?;
        }
    } else if let Some(mut reader) = status.reader.take() {
        let mut writer = pkt.data_writer(0);
        io::copy(&mut reader, &mut writer).map_err(Error::from_io)?;
    }
    pkt.write_flush()
}
