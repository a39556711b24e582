//! `rangepack`: subtracts a numeric stream's minimum element from every
//! element, then bit-packs the remainders at the narrowest fixed width
//! that covers the observed range (`spec.md` §1 taxonomy "range-pack").
//! A constant stream packs to zero bits per element; this is what lets
//! triple-delta'd sequences collapse to a handful of header bytes
//! (`spec.md` §8 scenario 5).

use vex_core::error::{logic_error, Error, ErrorCode, Result};
use vex_core::stream::{StreamType, TypedStream};
use vex_core::wire::varint;

use crate::node::{LeafKernel, NodeParams};
use crate::trace::StreamShape;

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

fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Number of bits needed to hold unsigned `range` (0 bits for `range == 0`).
fn bits_for_range(range: u64) -> u32 {
    if range == 0 {
        0
    } else {
        64 - range.leading_zeros()
    }
}

struct BitWriter {
    out: Vec<u8>,
    cur: u8,
    filled: u32,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            out: Vec::new(),
            cur: 0,
            filled: 0,
        }
    }

    fn push(&mut self, mut value: u64, bits: u32) {
        let mut remaining = bits;
        while remaining > 0 {
            let space = 8 - self.filled;
            let take = remaining.min(space);
            let mask = (1u64 << take) - 1;
            self.cur |= ((value & mask) as u8) << self.filled;
            self.filled += take;
            value >>= take;
            remaining -= take;
            if self.filled == 8 {
                self.out.push(self.cur);
                self.cur = 0;
                self.filled = 0;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.out.push(self.cur);
        }
        self.out
    }
}

struct BitReader<'a> {
    src: &'a [u8],
    byte: usize,
    bit: u32,
}

impl<'a> BitReader<'a> {
    fn new(src: &'a [u8]) -> Self {
        Self { src, byte: 0, bit: 0 }
    }

    fn pull(&mut self, bits: u32) -> Result<u64> {
        let mut value: u64 = 0;
        let mut shift = 0;
        let mut remaining = bits;
        while remaining > 0 {
            let byte = *self
                .src
                .get(self.byte)
                .ok_or_else(|| Error::new(ErrorCode::SrcSizeTooSmall, "rangepack: truncated bit stream"))?;
            let available = 8 - self.bit;
            let take = remaining.min(available);
            let mask = (1u16 << take) - 1;
            let bits_here = ((byte as u16) >> self.bit) & mask;
            value |= (bits_here as u64) << shift;
            shift += take;
            self.bit += take;
            if self.bit == 8 {
                self.bit = 0;
                self.byte += 1;
            }
            remaining -= take;
        }
        Ok(value)
    }
}

/// Min-subtract-then-bitpack leaf codec for `Numeric` streams.
pub struct RangePack;

impl LeafKernel for RangePack {
    fn encode(&self, inputs: &[TypedStream], _params: &NodeParams) -> Result<(Vec<u8>, Vec<u8>)> {
        let stream = &inputs[0];
        if stream.ty() != StreamType::Numeric {
            return Err(Error::new(ErrorCode::NodeInvalidInput, "rangepack requires a Numeric stream"));
        }
        let width = stream.width();
        let n = stream.num_elements();

        let (min, max) = stream.with_bytes(|bytes| {
            let mut min = i64::MAX;
            let mut max = i64::MIN;
            for i in 0..n {
                let v = read_elem(&bytes[i * width..(i + 1) * width], width);
                min = min.min(v);
                max = max.max(v);
            }
            (min, max)
        });
        let range = if n == 0 { 0 } else { (max as i128 - min as i128) as u64 };
        let bits = bits_for_range(range);

        let mut header = Vec::new();
        header.push(width as u8);
        header.push(bits as u8);
        varint::encode(zigzag_encode(if n == 0 { 0 } else { min }), &mut header);

        let mut writer = BitWriter::new();
        if bits > 0 {
            stream.with_bytes(|bytes| {
                for i in 0..n {
                    let v = read_elem(&bytes[i * width..(i + 1) * width], width);
                    writer.push((v - min) as u64, bits);
                }
            });
        }
        Ok((header, writer.finish()))
    }

    fn decode(
        &self,
        header: &[u8],
        payload: &[u8],
        shapes: &[StreamShape],
        _params: &NodeParams,
    ) -> Result<Vec<TypedStream>> {
        let shape = &shapes[0];
        let &[width_byte, bits_byte] = header
            .get(0..2)
            .ok_or_else(|| logic_error("rangepack: truncated header"))?
        else {
            unreachable!("slice pattern matches a fixed length-2 slice")
        };
        let width = width_byte as usize;
        let bits = bits_byte as u32;
        if width != shape.width {
            return Err(logic_error("rangepack: header width disagrees with recorded shape"));
        }
        let (encoded_min, _) = varint::decode_strict(&header[2..])?;
        let min = zigzag_decode(encoded_min);

        let out = TypedStream::create(StreamType::Numeric, width)?;
        out.reserve(shape.num_elements)?;
        let mut reader = BitReader::new(payload);
        for _ in 0..shape.num_elements {
            let delta = if bits > 0 { reader.pull(bits)? as i64 } else { 0 };
            let mut buf = Vec::with_capacity(width);
            write_elem(min + delta, width, &mut buf);
            out.write_bytes(&buf)?;
        }
        out.commit(shape.num_elements)?;
        for (key, value) in shape.int_metadata.iter() {
            out.int_metadata_set(key, value);
        }
        Ok(vec![out])
    }
}
