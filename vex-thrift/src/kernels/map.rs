//! `map<i32,float>`, `map<i32,list<float>>`, `map<i32,list<i64>>`,
//! `map<i32,list<list<i64>>>`, and `map<i32,map<i64,float>>` kernels.
//!
//! Each decode function extracts parallel keys/lengths/values streams;
//! the matching encode function reconstructs byte-identical output from
//! those same streams (`spec.md` §4.J, §8 scenario 6).

use vex_core::error::{Error, ErrorCode, Result};

use crate::bounds::check_container_bound;
use crate::dynamic_output::{DynamicOutput, VecDynamicOutput};
use crate::header::{self, TYPE_FLOAT32, TYPE_I32, TYPE_I64, TYPE_LIST, TYPE_MAP};

fn read_be_f32(src: &[u8], pos: usize) -> Result<(f32, usize)> {
    if src.len() - pos < 4 {
        return Err(Error::new(ErrorCode::SrcSizeTooSmall, "truncated float value"));
    }
    let bytes: [u8; 4] = src[pos..pos + 4].try_into().unwrap();
    Ok((f32::from_bits(u32::from_be_bytes(bytes)), pos + 4))
}

fn write_be_f32(value: f32, out: &mut Vec<u8>) {
    out.extend_from_slice(&value.to_bits().to_be_bytes());
}

/// `map<i32, float>`: parallel keys and values, one entry each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapI32Float {
    /// Map keys, in encounter order.
    pub keys: Vec<i32>,
    /// Map values, aligned with `keys`.
    pub values: Vec<f32>,
}

/// Decode a `map<i32, float>`. Returns `(map, bytes_consumed)`.
pub fn decode_map_i32_float(src: &[u8]) -> Result<(MapI32Float, usize)> {
    let (header, mut pos) = header::read_map_header(src, Some(TYPE_I32), Some(TYPE_FLOAT32))?;
    check_container_bound(header.size, 1, src.len() - pos)?;
    let mut keys = Vec::with_capacity(header.size);
    let mut values = Vec::with_capacity(header.size);
    for _ in 0..header.size {
        let (k, n) = crate::header::read_i32(&src[pos..])?;
        pos += n;
        keys.push(k);
        let (v, next_pos) = read_be_f32(src, pos)?;
        pos = next_pos;
        values.push(v);
    }
    Ok((MapI32Float { keys, values }, pos))
}

/// Encode a `map<i32, float>`.
pub fn encode_map_i32_float(map: &MapI32Float) -> Vec<u8> {
    let mut out = Vec::new();
    header::write_map_header(TYPE_I32, TYPE_FLOAT32, map.keys.len(), &mut out);
    for (&k, &v) in map.keys.iter().zip(&map.values) {
        header::write_i32(k, &mut out);
        write_be_f32(v, &mut out);
    }
    out
}

/// `map<i32, list<float>>`: one key plus one variable-length float list
/// per entry, with the lists' elements flattened into a single stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapI32ArrayFloat {
    /// Map keys, in encounter order.
    pub keys: Vec<i32>,
    /// Per-key inner-list length.
    pub lengths: Vec<u32>,
    /// All inner-list elements concatenated in key order.
    pub values: Vec<f32>,
}

/// Decode a `map<i32, list<float>>`. Returns `(map, bytes_consumed)`.
pub fn decode_map_i32_array_float(src: &[u8]) -> Result<(MapI32ArrayFloat, usize)> {
    let (header, mut pos) = header::read_map_header(src, Some(TYPE_I32), Some(TYPE_LIST))?;
    check_container_bound(header.size, 1, src.len() - pos)?;
    let mut keys = Vec::with_capacity(header.size);
    let mut lengths = Vec::with_capacity(header.size);
    let mut values: VecDynamicOutput<f32> = VecDynamicOutput::default();
    for i in 0..header.size {
        let (k, n) = crate::header::read_i32(&src[pos..])?;
        pos += n;
        keys.push(k);

        let (list, n) = header::read_list_header(&src[pos..], Some(TYPE_FLOAT32))?;
        pos += n;
        lengths.push(list.size as u32);
        check_container_bound(list.size, 4, src.len() - pos)?;

        let mut written = 0;
        let mut slot = values.next(i, header.size);
        for _ in 0..list.size {
            if written == slot.len() {
                slot = values.next(i, header.size);
                written = 0;
            }
            let (v, next_pos) = read_be_f32(src, pos)?;
            pos = next_pos;
            slot[written] = v;
            written += 1;
        }
        values.finish(written);
    }
    Ok((MapI32ArrayFloat { keys, lengths, values: values.into_inner() }, pos))
}

/// Encode a `map<i32, list<float>>`.
pub fn encode_map_i32_array_float(map: &MapI32ArrayFloat) -> Vec<u8> {
    let mut out = Vec::new();
    header::write_map_header(TYPE_I32, TYPE_LIST, map.keys.len(), &mut out);
    let mut cursor = 0usize;
    for (&k, &len) in map.keys.iter().zip(&map.lengths) {
        header::write_i32(k, &mut out);
        let len = len as usize;
        header::write_list_header(TYPE_FLOAT32, len, &mut out);
        for &v in &map.values[cursor..cursor + len] {
            write_be_f32(v, &mut out);
        }
        cursor += len;
    }
    out
}

/// `map<i32, list<i64>>`: one key plus one variable-length i64 list per
/// entry, elements flattened (`spec.md` §8 scenario 6).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapI32ArrayI64 {
    /// Map keys, in encounter order.
    pub keys: Vec<i32>,
    /// Per-key inner-list length.
    pub lengths: Vec<u32>,
    /// All inner-list elements concatenated in key order.
    pub values: Vec<i64>,
}

/// Decode a `map<i32, list<i64>>`. Returns `(map, bytes_consumed)`.
pub fn decode_map_i32_array_i64(src: &[u8]) -> Result<(MapI32ArrayI64, usize)> {
    let (header, mut pos) = header::read_map_header(src, Some(TYPE_I32), Some(TYPE_LIST))?;
    check_container_bound(header.size, 1, src.len() - pos)?;
    let mut keys = Vec::with_capacity(header.size);
    let mut lengths = Vec::with_capacity(header.size);
    let mut values: VecDynamicOutput<i64> = VecDynamicOutput::default();
    for i in 0..header.size {
        let (k, n) = crate::header::read_i32(&src[pos..])?;
        pos += n;
        keys.push(k);

        let (list, n) = header::read_list_header(&src[pos..], Some(TYPE_I64))?;
        pos += n;
        lengths.push(list.size as u32);
        check_container_bound(list.size, 1, src.len() - pos)?;

        let mut written = 0;
        let mut slot = values.next(i, header.size);
        for _ in 0..list.size {
            if written == slot.len() {
                slot = values.next(i, header.size);
                written = 0;
            }
            let (v, n) = crate::header::read_i64(&src[pos..])?;
            pos += n;
            slot[written] = v;
            written += 1;
        }
        values.finish(written);
    }
    Ok((MapI32ArrayI64 { keys, lengths, values: values.into_inner() }, pos))
}

/// Encode a `map<i32, list<i64>>`.
pub fn encode_map_i32_array_i64(map: &MapI32ArrayI64) -> Vec<u8> {
    let mut out = Vec::new();
    header::write_map_header(TYPE_I32, TYPE_LIST, map.keys.len(), &mut out);
    let mut cursor = 0usize;
    for (&k, &len) in map.keys.iter().zip(&map.lengths) {
        header::write_i32(k, &mut out);
        let len = len as usize;
        header::write_list_header(TYPE_I64, len, &mut out);
        for &v in &map.values[cursor..cursor + len] {
            header::write_i64(v, &mut out);
        }
        cursor += len;
    }
    out
}

/// `map<i32, list<list<i64>>>`: one key plus one variable-length list of
/// variable-length i64 lists, both levels flattened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapI32ArrayArrayI64 {
    /// Map keys, in encounter order.
    pub keys: Vec<i32>,
    /// Per-key outer-list length (number of inner lists).
    pub outer_lengths: Vec<u32>,
    /// Inner-list lengths, concatenated in key order.
    pub inner_lengths: Vec<u32>,
    /// Innermost elements, concatenated in (key, inner-list) order.
    pub values: Vec<i64>,
}

/// Decode a `map<i32, list<list<i64>>>`. Returns `(map, bytes_consumed)`.
pub fn decode_map_i32_array_array_i64(src: &[u8]) -> Result<(MapI32ArrayArrayI64, usize)> {
    let (header, mut pos) = header::read_map_header(src, Some(TYPE_I32), Some(TYPE_LIST))?;
    check_container_bound(header.size, 1, src.len() - pos)?;
    let mut keys = Vec::with_capacity(header.size);
    let mut outer_lengths = Vec::with_capacity(header.size);
    let mut inner_lengths: VecDynamicOutput<u32> = VecDynamicOutput::default();
    let mut values: VecDynamicOutput<i64> = VecDynamicOutput::default();
    for i in 0..header.size {
        let (k, n) = crate::header::read_i32(&src[pos..])?;
        pos += n;
        keys.push(k);

        let (outer, n) = header::read_list_header(&src[pos..], Some(TYPE_LIST))?;
        pos += n;
        outer_lengths.push(outer.size as u32);
        check_container_bound(outer.size, 1, src.len() - pos)?;

        let mut lengths_written = 0;
        let mut lengths_slot = inner_lengths.next(i, header.size);
        for _ in 0..outer.size {
            let (inner, n) = header::read_list_header(&src[pos..], Some(TYPE_I64))?;
            pos += n;
            check_container_bound(inner.size, 1, src.len() - pos)?;

            if lengths_written == lengths_slot.len() {
                lengths_slot = inner_lengths.next(i, header.size);
                lengths_written = 0;
            }
            lengths_slot[lengths_written] = inner.size as u32;
            lengths_written += 1;

            let mut values_written = 0;
            let mut values_slot = values.next(i, header.size);
            for _ in 0..inner.size {
                if values_written == values_slot.len() {
                    values_slot = values.next(i, header.size);
                    values_written = 0;
                }
                let (v, n) = crate::header::read_i64(&src[pos..])?;
                pos += n;
                values_slot[values_written] = v;
                values_written += 1;
            }
            values.finish(values_written);
        }
        inner_lengths.finish(lengths_written);
    }
    Ok((
        MapI32ArrayArrayI64 {
            keys,
            outer_lengths,
            inner_lengths: inner_lengths.into_inner(),
            values: values.into_inner(),
        },
        pos,
    ))
}

/// Encode a `map<i32, list<list<i64>>>`.
pub fn encode_map_i32_array_array_i64(map: &MapI32ArrayArrayI64) -> Vec<u8> {
    let mut out = Vec::new();
    header::write_map_header(TYPE_I32, TYPE_LIST, map.keys.len(), &mut out);
    let mut inner_cursor = 0usize;
    let mut value_cursor = 0usize;
    for (&k, &outer_len) in map.keys.iter().zip(&map.outer_lengths) {
        header::write_i32(k, &mut out);
        let outer_len = outer_len as usize;
        header::write_list_header(TYPE_LIST, outer_len, &mut out);
        for &inner_len in &map.inner_lengths[inner_cursor..inner_cursor + outer_len] {
            let inner_len = inner_len as usize;
            header::write_list_header(TYPE_I64, inner_len, &mut out);
            for &v in &map.values[value_cursor..value_cursor + inner_len] {
                header::write_i64(v, &mut out);
            }
            value_cursor += inner_len;
        }
        inner_cursor += outer_len;
    }
    out
}

/// `map<i32, map<i64, float>>`: one key plus one variable-length inner
/// map per entry, inner keys/values flattened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapI32MapI64Float {
    /// Outer map keys, in encounter order.
    pub keys: Vec<i32>,
    /// Per-outer-key inner-map size.
    pub lengths: Vec<u32>,
    /// Inner-map keys, concatenated in outer-key order.
    pub inner_keys: Vec<i64>,
    /// Inner-map values, aligned with `inner_keys`.
    pub inner_values: Vec<f32>,
}

/// Decode a `map<i32, map<i64, float>>`. Returns `(map, bytes_consumed)`.
pub fn decode_map_i32_map_i64_float(src: &[u8]) -> Result<(MapI32MapI64Float, usize)> {
    let (header, mut pos) = header::read_map_header(src, Some(TYPE_I32), Some(TYPE_MAP))?;
    check_container_bound(header.size, 1, src.len() - pos)?;
    let mut keys = Vec::with_capacity(header.size);
    let mut lengths = Vec::with_capacity(header.size);
    let mut inner_keys: VecDynamicOutput<i64> = VecDynamicOutput::default();
    let mut inner_values: VecDynamicOutput<f32> = VecDynamicOutput::default();
    for i in 0..header.size {
        let (k, n) = crate::header::read_i32(&src[pos..])?;
        pos += n;
        keys.push(k);

        let (inner, n) = header::read_map_header(&src[pos..], Some(TYPE_I64), Some(TYPE_FLOAT32))?;
        pos += n;
        lengths.push(inner.size as u32);
        check_container_bound(inner.size, 1, src.len() - pos)?;

        let mut keys_written = 0;
        let mut keys_slot = inner_keys.next(i, header.size);
        let mut values_written = 0;
        let mut values_slot = inner_values.next(i, header.size);
        for _ in 0..inner.size {
            if keys_written == keys_slot.len() {
                keys_slot = inner_keys.next(i, header.size);
                keys_written = 0;
            }
            let (k, n) = crate::header::read_i64(&src[pos..])?;
            pos += n;
            keys_slot[keys_written] = k;
            keys_written += 1;

            if values_written == values_slot.len() {
                values_slot = inner_values.next(i, header.size);
                values_written = 0;
            }
            let (v, next_pos) = read_be_f32(src, pos)?;
            pos = next_pos;
            values_slot[values_written] = v;
            values_written += 1;
        }
        inner_keys.finish(keys_written);
        inner_values.finish(values_written);
    }
    Ok((
        MapI32MapI64Float {
            keys,
            lengths,
            inner_keys: inner_keys.into_inner(),
            inner_values: inner_values.into_inner(),
        },
        pos,
    ))
}

/// Encode a `map<i32, map<i64, float>>`.
pub fn encode_map_i32_map_i64_float(map: &MapI32MapI64Float) -> Vec<u8> {
    let mut out = Vec::new();
    header::write_map_header(TYPE_I32, TYPE_MAP, map.keys.len(), &mut out);
    let mut cursor = 0usize;
    for (&k, &len) in map.keys.iter().zip(&map.lengths) {
        header::write_i32(k, &mut out);
        let len = len as usize;
        header::write_map_header(TYPE_I64, TYPE_FLOAT32, len, &mut out);
        for (&ik, &iv) in map.inner_keys[cursor..cursor + len].iter().zip(&map.inner_values[cursor..cursor + len]) {
            header::write_i64(ik, &mut out);
            write_be_f32(iv, &mut out);
        }
        cursor += len;
    }
    out
}
