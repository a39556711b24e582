//! End-to-end scenario from `spec.md` §8: a large `map<i32, list<i64>>`
//! decoded and re-encoded must reproduce the original bytes exactly.

use vex_core::error::ErrorCode;
use vex_thrift::kernels::map::{decode_map_i32_array_i64, encode_map_i32_array_i64, MapI32ArrayI64};

fn reference_map(size: i32) -> MapI32ArrayI64 {
    let keys: Vec<i32> = (0..size).collect();
    let lengths: Vec<u32> = vec![1; size as usize];
    let values: Vec<i64> = keys.iter().map(|&k| k as i64).collect();
    MapI32ArrayI64 { keys, lengths, values }
}

/// Hand-derived compact-protocol bytes for
/// `{1: [300, -2], -1: [5]}`, built directly from the wire-layout rules
/// (varint map size, key/value type nibble, zigzag-varint i32 keys,
/// short-form list header, zigzag-varint i64 elements) rather than from
/// this crate's own encoder, so this test can actually catch a
/// systematic divergence from the compact protocol.
///
/// map header:   0x02 (size=2), 0x59 (key=I32 hi nibble, value=LIST lo nibble)
/// entry 1: key=1            -> zigzag 2            -> varint 0x02
///          list header: size=2, elem=I64 -> nibble 0x2 -> byte 0x26
///          300  -> zigzag 600  -> varint 0xD8 0x04
///          -2   -> zigzag 3    -> varint 0x03
/// entry 2: key=-1           -> zigzag 1            -> varint 0x01
///          list header: size=1, elem=I64 -> nibble 0x1 -> byte 0x16
///          5    -> zigzag 10   -> varint 0x0A
#[rustfmt::skip]
const HAND_DERIVED_BYTES: &[u8] = &[
    0x02, 0x59,
    0x02, 0x26, 0xD8, 0x04, 0x03,
    0x01, 0x16, 0x0A,
];

#[test]
fn small_map_matches_hand_derived_compact_protocol_bytes() {
    let map = MapI32ArrayI64 {
        keys: vec![1, -1],
        lengths: vec![2, 1],
        values: vec![300, -2, 5],
    };
    let encoded = encode_map_i32_array_i64(&map);
    assert_eq!(encoded, HAND_DERIVED_BYTES);

    let (decoded, consumed) = decode_map_i32_array_i64(HAND_DERIVED_BYTES).unwrap();
    assert_eq!(consumed, HAND_DERIVED_BYTES.len());
    assert_eq!(decoded, map);
}

#[test]
fn large_map_i32_array_i64_round_trips_byte_exact() {
    let map = reference_map(20_000);
    let reference_bytes = encode_map_i32_array_i64(&map);

    let (decoded, consumed) = decode_map_i32_array_i64(&reference_bytes).unwrap();
    assert_eq!(consumed, reference_bytes.len());
    assert_eq!(decoded, map);

    let re_encoded = encode_map_i32_array_i64(&decoded);
    assert_eq!(re_encoded, reference_bytes);
}

#[test]
fn empty_map_round_trips() {
    let map = MapI32ArrayI64::default();
    let bytes = encode_map_i32_array_i64(&map);
    assert_eq!(bytes, vec![0]);
    let (decoded, consumed) = decode_map_i32_array_i64(&bytes).unwrap();
    assert_eq!(decoded, map);
    assert_eq!(consumed, 1);
}

#[test]
fn map_with_ragged_and_empty_inner_lists_round_trips() {
    let map = MapI32ArrayI64 {
        keys: vec![0, 1, 2, 3],
        lengths: vec![0, 3, 1, 0],
        values: vec![10, 20, 30, 99],
    };
    let bytes = encode_map_i32_array_i64(&map);
    let (decoded, consumed) = decode_map_i32_array_i64(&bytes).unwrap();
    assert_eq!(decoded, map);
    assert_eq!(consumed, bytes.len());
}

#[test]
fn truncated_input_is_rejected_not_panicked() {
    let map = reference_map(50);
    let bytes = encode_map_i32_array_i64(&map);
    for cut in [1, bytes.len() / 2, bytes.len() - 1] {
        let err = decode_map_i32_array_i64(&bytes[..cut]).unwrap_err();
        assert!(matches!(err.code(), ErrorCode::SrcSizeTooSmall | ErrorCode::NodeInvalidInput | ErrorCode::Corruption));
    }
}
