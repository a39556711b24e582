//! Flat `list<i32>`, `list<i64>`, `list<float>` kernels.

use vex_core::error::{Error, ErrorCode, Result};

use crate::bounds::check_container_bound;
use crate::header::{self, TYPE_FLOAT32, TYPE_I32, TYPE_I64};

/// Decode a `list<i32>`. Returns `(values, bytes_consumed)`.
pub fn decode_i32(src: &[u8]) -> Result<(Vec<i32>, usize)> {
    let (list, mut pos) = header::read_list_header(src, Some(TYPE_I32))?;
    check_container_bound(list.size, 1, src.len() - pos)?;
    let mut values = Vec::with_capacity(list.size);
    for _ in 0..list.size {
        let (v, n) = header::read_i32(&src[pos..])?;
        values.push(v);
        pos += n;
    }
    Ok((values, pos))
}

/// Encode a `list<i32>`.
pub fn encode_i32(values: &[i32]) -> Vec<u8> {
    let mut out = Vec::new();
    header::write_list_header(TYPE_I32, values.len(), &mut out);
    for &v in values {
        header::write_i32(v, &mut out);
    }
    out
}

/// Decode a `list<i64>`. Returns `(values, bytes_consumed)`.
pub fn decode_i64(src: &[u8]) -> Result<(Vec<i64>, usize)> {
    let (list, mut pos) = header::read_list_header(src, Some(TYPE_I64))?;
    check_container_bound(list.size, 1, src.len() - pos)?;
    let mut values = Vec::with_capacity(list.size);
    for _ in 0..list.size {
        let (v, n) = header::read_i64(&src[pos..])?;
        values.push(v);
        pos += n;
    }
    Ok((values, pos))
}

/// Encode a `list<i64>`.
pub fn encode_i64(values: &[i64]) -> Vec<u8> {
    let mut out = Vec::new();
    header::write_list_header(TYPE_I64, values.len(), &mut out);
    for &v in values {
        header::write_i64(v, &mut out);
    }
    out
}

/// Decode a `list<float>` (the non-standard packed-big-endian-f32
/// extension). Returns `(values, bytes_consumed)`.
pub fn decode_float(src: &[u8]) -> Result<(Vec<f32>, usize)> {
    let (list, mut pos) = header::read_list_header(src, Some(TYPE_FLOAT32))?;
    check_container_bound(list.size, 4, src.len() - pos)?;
    let needed = list.size * 4;
    if src.len() - pos < needed {
        return Err(Error::new(ErrorCode::SrcSizeTooSmall, "truncated float array body"));
    }
    let mut values = Vec::with_capacity(list.size);
    for i in 0..list.size {
        let bytes: [u8; 4] = src[pos + i * 4..pos + i * 4 + 4].try_into().unwrap();
        values.push(f32::from_bits(u32::from_be_bytes(bytes)));
    }
    pos += needed;
    Ok((values, pos))
}

/// Encode a `list<float>`.
pub fn encode_float(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::new();
    header::write_list_header(TYPE_FLOAT32, values.len(), &mut out);
    for &v in values {
        out.extend_from_slice(&v.to_bits().to_be_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i32_array_round_trips() {
        let values = vec![0, -1, 1, i32::MIN, i32::MAX, -12345];
        let bytes = encode_i32(&values);
        let (decoded, consumed) = decode_i32(&bytes).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn i64_array_round_trips_long_form_header() {
        let values: Vec<i64> = (0..20).map(|i| i * i - 50).collect();
        let bytes = encode_i64(&values);
        let (decoded, consumed) = decode_i64(&bytes).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn float_array_round_trips_bit_exact() {
        let values = vec![0.0f32, -0.0, 1.5, f32::NAN, f32::INFINITY];
        let bytes = encode_float(&values);
        let (decoded, consumed) = decode_float(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        for (a, b) in values.iter().zip(decoded.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn rejects_oversized_length_claim() {
        // A header claiming far more elements than the remaining bytes
        // could possibly hold.
        let mut bytes = Vec::new();
        header::write_list_header(TYPE_I64, 1_000_000, &mut bytes);
        let err = decode_i64(&bytes).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NodeInvalidInput);
    }
}
