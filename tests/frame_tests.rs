use bytes::BytesMut;
use proptest::prelude::*;
use velbus_rs::decode_frame;
use velbus_rs::velbus::frame::{checksum, decode, encode, encode_rtr, Decoded};
use velbus_rs::velbus::listener::drain_frames;

const GOLDEN: [u8; 11] = [0x0F, 0xF8, 0x02, 0x05, 0x07, 0x01, 0x28, 0x00, 0x00, 0xC2, 0x04];

#[test]
fn test_golden_frame_encoding() {
    assert_eq!(encode(0x02, 0x07, &[0x01, 0x28, 0x00, 0x00]), GOLDEN.to_vec());
}

#[test]
fn test_checksum_sums_to_zero() {
    let sum = GOLDEN[..GOLDEN.len() - 1]
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_add(*b));
    assert_eq!(sum, 0);
    assert_eq!(checksum(&GOLDEN[..GOLDEN.len() - 2]), 0xC2);
}

#[test]
fn test_every_prefix_needs_more_bytes() {
    for end in 0..GOLDEN.len() {
        assert_eq!(decode(&GOLDEN[..end]), Decoded::NeedMoreBytes, "prefix {end}");
    }
}

#[test]
fn test_trailing_bytes_are_not_consumed() {
    let mut data = GOLDEN.to_vec();
    data.extend_from_slice(&GOLDEN[..4]);
    match decode(&data) {
        Decoded::Frame { consumed, .. } => assert_eq!(consumed, GOLDEN.len()),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_checksum_mismatch_is_invalid() {
    let mut data = GOLDEN.to_vec();
    data[9] = 0xC3;
    assert_eq!(
        decode(&data),
        Decoded::Invalid {
            discard: data.len(),
            reason: "checksum mismatch",
        }
    );
}

#[test]
fn test_bad_end_byte_is_invalid() {
    let mut data = GOLDEN.to_vec();
    data[10] = 0x05;
    assert!(matches!(decode(&data), Decoded::Invalid { .. }));
}

#[test]
fn test_bad_priority_discards_up_to_next_start() {
    let mut data = vec![0x0F, 0x11, 0x02];
    data.extend_from_slice(&GOLDEN);
    assert_eq!(
        decode(&data),
        Decoded::Invalid {
            discard: 3,
            reason: "bad framing byte",
        }
    );
}

#[test]
fn test_oversized_length_is_invalid() {
    // 0x09 data bytes does not fit a frame
    let data = [0x0F, 0xFB, 0x02, 0x09, 0x00, 0x00];
    assert!(matches!(decode(&data), Decoded::Invalid { .. }));
}

#[test]
fn test_corrupted_length_byte_never_yields_a_frame() {
    for len_byte in [0x00u8, 0x01, 0x04, 0x06, 0x08, 0x45, 0x80] {
        let mut data = GOLDEN.to_vec();
        data[3] = len_byte;
        assert!(
            !matches!(decode(&data), Decoded::Frame { .. }),
            "length byte 0x{len_byte:02X}"
        );
    }
}

#[test]
fn test_resync_over_garbage() {
    let relay = encode(0x04, 0xFB, &[0x01, 0x00, 0x01, 0x00]);
    let mut buf = BytesMut::new();
    buf.extend_from_slice(&[0x01, 0x02, 0x03]);
    buf.extend_from_slice(&GOLDEN);
    buf.extend_from_slice(&[0xAA, 0x0F, 0xFF]);
    buf.extend_from_slice(&relay);

    let drained = drain_frames(&mut buf);
    assert_eq!(drained.frames.len(), 2);
    assert_eq!(drained.frames[0].address, 0x02);
    assert_eq!(drained.frames[1].address, 0x04);
    assert!(buf.is_empty());
}

#[test]
fn test_resync_over_truncated_header() {
    let rtr = encode_rtr(0x04);
    let mut buf = BytesMut::new();
    buf.extend_from_slice(&[0x01, 0x02]);
    buf.extend_from_slice(&GOLDEN);
    // looks like the start of an 8-byte frame
    buf.extend_from_slice(&[0x0F, 0xF8, 0x01, 0x08]);
    buf.extend_from_slice(&rtr);

    let drained = drain_frames(&mut buf);
    assert_eq!(drained.frames.len(), 2);
    assert_eq!(drained.frames[0].address, 0x02);
    assert_eq!(drained.frames[1].address, 0x04);
    assert!(drained.frames[1].rtr);
    assert_eq!(drained.discarded.len(), 2);
    assert_eq!(drained.discarded[1].bytes, vec![0x0F, 0xF8, 0x01, 0x08]);
    assert!(buf.is_empty());
}

#[test]
fn test_decode_frame_helper() {
    assert_eq!(decode_frame(&GOLDEN).unwrap().address, 0x02);
    assert!(decode_frame(&GOLDEN[..5]).is_err());
    assert!(decode_frame(&[0x00]).is_err());
}

#[test]
fn test_rtr_frame() {
    let rtr = encode_rtr(0xFE);
    assert_eq!(rtr.len(), 6);
    assert_eq!(rtr[3], 0x40);
    match decode(&rtr) {
        Decoded::Frame { frame, .. } => assert!(frame.rtr && frame.command.is_none()),
        other => panic!("unexpected {other:?}"),
    }
}

proptest! {
    #[test]
    fn prop_encode_decode(
        address in 1u8..=0xFE,
        command: u8,
        payload in prop::collection::vec(any::<u8>(), 0..=7),
    ) {
        let bytes = encode(address, command, &payload);
        match decode(&bytes) {
            Decoded::Frame { frame, consumed } => {
                prop_assert_eq!(consumed, bytes.len());
                prop_assert_eq!(frame.address, address);
                prop_assert_eq!(frame.command, Some(command));
                prop_assert_eq!(frame.payload, payload);
            }
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }

    #[test]
    fn prop_single_byte_corruption_is_rejected(
        payload in prop::collection::vec(any::<u8>(), 0..=7),
        index: prop::sample::Index,
        flip in 1u8..=0xFF,
    ) {
        let mut bytes = encode(0x02, 0xEE, &payload);
        let len_byte = 3;
        let mut position = index.index(bytes.len() - 1);
        if position >= len_byte {
            position += 1;
        }
        bytes[position] ^= flip;
        prop_assert!(matches!(decode(&bytes), Decoded::Invalid { .. }), "expected Decoded::Invalid");
    }

    #[test]
    fn prop_decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut buf = BytesMut::from(&data[..]);
        let _ = drain_frames(&mut buf);
        prop_assert!(buf.len() <= data.len());
    }
}
