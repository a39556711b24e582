//! `delta`: transforms a numeric stream into consecutive differences
//! (`spec.md` §4.E). Operates in place on the stream's native width;
//! downstream nodes (e.g. [`super::zigzag`]) typically follow to make the
//! signed result more compressible.

use vex_core::error::{logic_error, Error, ErrorCode, Result};
use vex_core::stream::{StreamType, TypedStream};

use crate::node::{NodeParams, TransformKernel};

fn read_elem(bytes: &[u8], width: usize) -> i64 {
    match width {
        1 => bytes[0] as i8 as i64,
        2 => i16::from_le_bytes(bytes.try_into().unwrap()) as i64,
        4 => i32::from_le_bytes(bytes.try_into().unwrap()) as i64,
        8 => i64::from_le_bytes(bytes.try_into().unwrap()),
        _ => unreachable!("validated by TypedStream::create"),
    }
}

fn write_elem(value: i64, width: usize, out: &mut Vec<u8>) {
    match width {
        1 => out.push(value as i8 as u8),
        2 => out.extend_from_slice(&(value as i16).to_le_bytes()),
        4 => out.extend_from_slice(&(value as i32).to_le_bytes()),
        8 => out.extend_from_slice(&value.to_le_bytes()),
        _ => unreachable!("validated by TypedStream::create"),
    }
}

/// Delta-encodes (or decodes) a numeric stream, one element of wrapping
/// difference per step.
pub struct Delta;

impl TransformKernel for Delta {
    fn encode(&self, inputs: &[TypedStream], _params: &NodeParams) -> Result<Vec<TypedStream>> {
        let stream = &inputs[0];
        if stream.ty() != StreamType::Numeric {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "delta requires a Numeric stream"));
        }
        let width = stream.width();
        let n = stream.num_elements();
        let out = TypedStream::create(StreamType::Numeric, width)?;
        out.reserve(n)?;
        let mut prev = 0i64;
        stream.with_bytes(|bytes| {
            for i in 0..n {
                let cur = read_elem(&bytes[i * width..(i + 1) * width], width);
                let diff = cur.wrapping_sub(prev);
                let mut buf = Vec::with_capacity(width);
                write_elem(diff, width, &mut buf);
                out.write_bytes(&buf).expect("uncommitted write");
                prev = cur;
            }
        });
        out.commit(n)?;
        for (key, value) in stream.int_metadata().iter() {
            out.int_metadata_set(key, value);
        }
        Ok(vec![out])
    }

    fn decode(&self, outputs: &[TypedStream], _params: &NodeParams) -> Result<Vec<TypedStream>> {
        let stream = &outputs[0];
        if stream.ty() != StreamType::Numeric {
            return Err(logic_error("delta decode requires a Numeric stream"));
        }
        let width = stream.width();
        let n = stream.num_elements();
        let out = TypedStream::create(StreamType::Numeric, width)?;
        out.reserve(n)?;
        let mut prev = 0i64;
        stream.with_bytes(|bytes| {
            for i in 0..n {
                let diff = read_elem(&bytes[i * width..(i + 1) * width], width);
                let cur = prev.wrapping_add(diff);
                let mut buf = Vec::with_capacity(width);
                write_elem(cur, width, &mut buf);
                out.write_bytes(&buf).expect("uncommitted write");
                prev = cur;
            }
        });
        out.commit(n)?;
        for (key, value) in stream.int_metadata().iter() {
            out.int_metadata_set(key, value);
        }
        Ok(vec![out])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_round_trips_increasing_sequence() {
        let s = TypedStream::create(StreamType::Numeric, 4).unwrap();
        s.reserve(4).unwrap();
        for v in [10i32, 15, 12, 100] {
            s.write_bytes(&v.to_le_bytes()).unwrap();
        }
        s.commit(4).unwrap();

        let codec = Delta;
        let params = NodeParams::new();
        let encoded = codec.encode(&[s.clone()], &params).unwrap();
        let decoded = codec.decode(&encoded, &params).unwrap();
        decoded[0].with_bytes(|b| s.with_bytes(|orig| assert_eq!(b, orig)));
    }

    #[test]
    fn encode_and_decode_both_preserve_int_metadata() {
        let s = TypedStream::create(StreamType::Numeric, 4).unwrap();
        s.reserve(2).unwrap();
        s.write_bytes(&1i32.to_le_bytes()).unwrap();
        s.write_bytes(&2i32.to_le_bytes()).unwrap();
        s.commit(2).unwrap();
        s.int_metadata_set(5, 11);

        let codec = Delta;
        let params = NodeParams::new();
        let encoded = codec.encode(&[s.clone()], &params).unwrap();
        assert_eq!(encoded[0].int_metadata_get(5), Some(11));

        let decoded = codec.decode(&encoded, &params).unwrap();
        assert_eq!(decoded[0].int_metadata_get(5), Some(11));
    }
}
