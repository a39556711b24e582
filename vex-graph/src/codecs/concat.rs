//! `concat`: merges N sibling streams into a single `Serial` stream,
//! self-describing enough (a varint length table, see
//! [`vex_core::wire::varint`]) to invert without external bookkeeping
//! (`spec.md` §3.2 "node" — arbitrary input arity).

use vex_core::error::{logic_error, Result};
use vex_core::wire::varint;
use vex_core::stream::{StreamType, TypedStream};

use crate::node::{NodeParams, TransformKernel};

/// Concatenates N input streams' raw bytes behind a varint length table.
pub struct Concat;

impl TransformKernel for Concat {
    fn encode(&self, inputs: &[TypedStream], _params: &NodeParams) -> Result<Vec<TypedStream>> {
        let mut table = Vec::new();
        varint::encode(inputs.len() as u64, &mut table);
        let mut bodies = Vec::new();
        for stream in inputs {
            stream.with_bytes(|bytes| {
                varint::encode(bytes.len() as u64, &mut table);
                bodies.extend_from_slice(bytes);
            });
        }
        let out = TypedStream::create(StreamType::Serial, 1)?;
        out.reserve(table.len() + bodies.len())?;
        out.write_bytes(&table)?;
        out.write_bytes(&bodies)?;
        out.commit(table.len() + bodies.len())?;
        Ok(vec![out])
    }

    fn decode(&self, outputs: &[TypedStream], _params: &NodeParams) -> Result<Vec<TypedStream>> {
        let merged = &outputs[0];
        let mut result = Vec::new();
        merged.with_bytes(|bytes| -> Result<()> {
            let mut pos = 0;
            let (count, n) = varint::decode_strict(&bytes[pos..])?;
            pos += n;
            let mut lengths = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (len, n) = varint::decode_strict(&bytes[pos..])?;
                pos += n;
                lengths.push(len as usize);
            }
            for len in lengths {
                if pos + len > bytes.len() {
                    return Err(logic_error("concat: length table overruns payload"));
                }
                let segment = TypedStream::create(StreamType::Serial, 1)?;
                segment.reserve(len)?;
                segment.write_bytes(&bytes[pos..pos + len])?;
                segment.commit(len)?;
                result.push(segment);
                pos += len;
            }
            Ok(())
        })?;
        Ok(result)
    }
}
