use std::io::{Cursor, Read, Write};

use proptest::prelude::*;

use lfs_core::Error;
use lfs_pktline::{Packet, Pktline, MAX_PAYLOAD_LENGTH};

fn channel(input: Vec<u8>) -> Pktline<Cursor<Vec<u8>>, Vec<u8>> {
    Pktline::new(Cursor::new(input), Vec::new())
}

proptest! {
    #[test]
    fn any_payload_round_trips_exactly(payload in prop_oneof![
        proptest::collection::vec(any::<u8>(), 1..=2048),
        Just(vec![0u8; MAX_PAYLOAD_LENGTH]),
    ]) {
        let mut pkt = channel(Vec::new());
        pkt.write_packet(&payload).unwrap();
        let (_, written) = pkt.into_parts();

        let mut back = channel(written);
        prop_assert_eq!(back.read_packet().unwrap(), Some(Packet::Data(payload)));
        prop_assert_eq!(back.read_packet().unwrap(), None);
    }

    #[test]
    fn data_stream_round_trips_through_views(data in proptest::collection::vec(any::<u8>(), 0..=8192),
                                             max in 1usize..=512) {
        let mut pkt = channel(Vec::new());
        if !data.is_empty() {
            pkt.data_writer(max).write_all(&data).unwrap();
        }
        pkt.write_flush().unwrap();
        let (_, written) = pkt.into_parts();

        let mut back = channel(written);
        let mut out = Vec::new();
        back.data_reader().read_to_end(&mut out).unwrap();
        prop_assert_eq!(out, data);
        prop_assert_eq!(back.read_packet().unwrap(), None);
    }

    #[test]
    fn text_lines_survive_a_section(lines in proptest::collection::vec("[a-z=/.-]{1,40}", 0..8)) {
        let mut pkt = channel(Vec::new());
        for line in &lines {
            pkt.write_packet_text(line).unwrap();
        }
        pkt.write_flush().unwrap();
        let (_, written) = pkt.into_parts();

        let mut back = channel(written);
        prop_assert_eq!(back.read_to_flush().unwrap(), lines);
    }
}

#[test]
fn oversized_payload_never_frames() {
    let mut pkt = channel(Vec::new());
    let too_big = vec![0u8; MAX_PAYLOAD_LENGTH + 1];
    assert!(matches!(pkt.write_packet(&too_big).unwrap_err(), Error::InvalidPacket));
    let (_, written) = pkt.into_parts();
    assert!(written.is_empty());
}
