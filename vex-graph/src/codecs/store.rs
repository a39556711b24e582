//! `store`: the trivial leaf codec, copying a stream's raw bytes
//! verbatim. The executor's last-resort fallback when no other
//! compressor graph survives validation (`spec.md` §4.L "trivial store
//! graph").

use vex_core::error::Result;
use vex_core::stream::{StreamType, TypedStream};

use crate::node::{LeafKernel, NodeParams};
use crate::trace::StreamShape;

/// Copies a stream's content buffer and string-lengths array verbatim.
pub struct Store;

impl LeafKernel for Store {
    fn encode(&self, inputs: &[TypedStream], _params: &NodeParams) -> Result<(Vec<u8>, Vec<u8>)> {
        let stream = &inputs[0];
        let payload = stream.with_bytes(|b| b.to_vec());
        Ok((Vec::new(), payload))
    }

    fn decode(
        &self,
        _header: &[u8],
        payload: &[u8],
        shapes: &[StreamShape],
        _params: &NodeParams,
    ) -> Result<Vec<TypedStream>> {
        let shape = &shapes[0];
        let out = TypedStream::create(shape.ty, shape.width)?;
        out.write_bytes(payload)?;
        if shape.ty == StreamType::String {
            for len in shape.string_lengths.as_deref().unwrap_or(&[]) {
                out.append_to_string_lengths(*len)?;
            }
        } else {
            out.reserve(shape.num_elements)?;
        }
        out.commit(shape.num_elements)?;
        for (key, value) in shape.int_metadata.iter() {
            out.int_metadata_set(key, value);
        }
        Ok(vec![out])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_round_trips_numeric_stream() {
        let s = TypedStream::create(StreamType::Numeric, 4).unwrap();
        s.reserve(2).unwrap();
        s.write_bytes(&10u32.to_le_bytes()).unwrap();
        s.write_bytes(&20u32.to_le_bytes()).unwrap();
        s.commit(2).unwrap();

        let codec = Store;
        let params = NodeParams::new();
        let (header, payload) = codec.encode(&[s.clone()], &params).unwrap();
        let shape = StreamShape::of(&s);
        let decoded = codec.decode(&header, &payload, &[shape], &params).unwrap();
        decoded[0].with_bytes(|b| s.with_bytes(|orig| assert_eq!(b, orig)));
    }

    #[test]
    fn store_round_trips_int_metadata() {
        let s = TypedStream::create(StreamType::Numeric, 4).unwrap();
        s.reserve(1).unwrap();
        s.write_bytes(&7u32.to_le_bytes()).unwrap();
        s.commit(1).unwrap();
        s.int_metadata_set(3, -9);

        let codec = Store;
        let params = NodeParams::new();
        let (header, payload) = codec.encode(&[s.clone()], &params).unwrap();
        let shape = StreamShape::of(&s);
        let decoded = codec.decode(&header, &payload, &[shape], &params).unwrap();
        assert_eq!(decoded[0].int_metadata_get(3), Some(-9));
    }

    #[test]
    fn store_round_trips_string_stream() {
        let s = TypedStream::create(StreamType::String, 0).unwrap();
        for word in ["ab", "cde"] {
            s.write_bytes(word.as_bytes()).unwrap();
            s.append_to_string_lengths(word.len() as u32).unwrap();
        }
        s.commit(2).unwrap();

        let codec = Store;
        let params = NodeParams::new();
        let (header, payload) = codec.encode(&[s.clone()], &params).unwrap();
        let shape = StreamShape::of(&s);
        let decoded = codec.decode(&header, &payload, &[shape], &params).unwrap();
        assert_eq!(decoded[0].string_lengths(), vec![2, 3]);
    }
}
