//! `zigzag`: maps a signed numeric stream to the unsigned zigzag
//! encoding (`0, -1, 1, -2, 2, ... -> 0, 1, 2, 3, 4, ...`), so that small
//! negative values (typical after [`super::delta`]) compress as well as
//! small positive ones (`spec.md` §4.E).

use vex_core::error::{logic_error, Error, ErrorCode, Result};
use vex_core::stream::{StreamType, TypedStream};

use crate::node::{NodeParams, TransformKernel};

fn zigzag_encode(value: i64, bits: u32) -> u64 {
    ((value << 1) ^ (value >> (bits - 1))) as u64
}

fn zigzag_decode(value: u64, _bits: u32) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

fn read_signed(bytes: &[u8], width: usize) -> i64 {
    match width {
        1 => bytes[0] as i8 as i64,
        2 => i16::from_le_bytes(bytes.try_into().unwrap()) as i64,
        4 => i32::from_le_bytes(bytes.try_into().unwrap()) as i64,
        8 => i64::from_le_bytes(bytes.try_into().unwrap()),
        _ => unreachable!("validated by TypedStream::create"),
    }
}

fn write_unsigned(value: u64, width: usize, out: &mut Vec<u8>) {
    match width {
        1 => out.push(value as u8),
        2 => out.extend_from_slice(&(value as u16).to_le_bytes()),
        4 => out.extend_from_slice(&(value as u32).to_le_bytes()),
        8 => out.extend_from_slice(&value.to_le_bytes()),
        _ => unreachable!("validated by TypedStream::create"),
    }
}

fn read_unsigned(bytes: &[u8], width: usize) -> u64 {
    match width {
        1 => bytes[0] as u64,
        2 => u16::from_le_bytes(bytes.try_into().unwrap()) as u64,
        4 => u32::from_le_bytes(bytes.try_into().unwrap()) as u64,
        8 => u64::from_le_bytes(bytes.try_into().unwrap()),
        _ => unreachable!("validated by TypedStream::create"),
    }
}

fn write_signed(value: i64, width: usize, out: &mut Vec<u8>) {
    match width {
        1 => out.push(value as i8 as u8),
        2 => out.extend_from_slice(&(value as i16).to_le_bytes()),
        4 => out.extend_from_slice(&(value as i32).to_le_bytes()),
        8 => out.extend_from_slice(&value.to_le_bytes()),
        _ => unreachable!("validated by TypedStream::create"),
    }
}

/// Zigzag-encodes (or decodes) a numeric stream in place at its native
/// width.
pub struct Zigzag;

impl TransformKernel for Zigzag {
    fn encode(&self, inputs: &[TypedStream], _params: &NodeParams) -> Result<Vec<TypedStream>> {
        let stream = &inputs[0];
        if stream.ty() != StreamType::Numeric {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "zigzag requires a Numeric stream"));
        }
        let width = stream.width();
        let bits = (width * 8) as u32;
        let n = stream.num_elements();
        let out = TypedStream::create(StreamType::Numeric, width)?;
        out.reserve(n)?;
        stream.with_bytes(|bytes| {
            for i in 0..n {
                let signed = read_signed(&bytes[i * width..(i + 1) * width], width);
                let mut buf = Vec::with_capacity(width);
                write_unsigned(zigzag_encode(signed, bits), width, &mut buf);
                out.write_bytes(&buf).expect("uncommitted write");
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
            return Err(logic_error("zigzag decode requires a Numeric stream"));
        }
        let width = stream.width();
        let bits = (width * 8) as u32;
        let n = stream.num_elements();
        let out = TypedStream::create(StreamType::Numeric, width)?;
        out.reserve(n)?;
        stream.with_bytes(|bytes| {
            for i in 0..n {
                let unsigned = read_unsigned(&bytes[i * width..(i + 1) * width], width);
                let mut buf = Vec::with_capacity(width);
                write_signed(zigzag_decode(unsigned, bits), width, &mut buf);
                out.write_bytes(&buf).expect("uncommitted write");
            }
        });
        out.commit(n)?;
        for (key, value) in stream.int_metadata().iter() {
            out.int_metadata_set(key, value);
        }
        Ok(vec![out])
    }
}
