//! Frame assembly: the on-disk container around a compressed trace
//! (`spec.md` §4.D, §8 scenario 3).
//!
//! Layout, in order:
//!
//! ```text
//! [magic:4][version:1][flags:1]
//! [chunk...]
//! [content_checksum:4]?   -- present iff flags & CONTENT_CHECKSUM
//! [compressed_checksum:4]? -- present iff flags & COMPRESSED_CHECKSUM, covers everything before it
//! ```
//!
//! A single chunk holds one encoded [`crate::trace::Trace`] followed by
//! its concatenated leaf payload section.

use vex_core::error::{Error, ErrorCode, Result};
use vex_core::wire::{checksum, magic, varint};

use crate::trace::Trace;

const FLAG_CONTENT_CHECKSUM: u8 = 0b01;
const FLAG_COMPRESSED_CHECKSUM: u8 = 0b10;

/// Which optional checksums a frame carries (`spec.md` §6 `Parameters`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumConfig {
    /// Checksum the original (pre-compression) content.
    pub content_checksum: bool,
    /// Checksum the compressed frame itself, covering everything before
    /// this checksum's own bytes.
    pub compressed_checksum: bool,
}

/// One chunk: a trace plus its concatenated leaf payloads.
pub struct Chunk {
    /// The execution trace for this chunk.
    pub trace: Trace,
    /// Concatenated leaf payload bytes; each `TraceEntry::Leaf` names its
    /// own `payload_offset`/`payload_len` into this buffer.
    pub payloads: Vec<u8>,
}

impl Chunk {
    fn encode(&self) -> Vec<u8> {
        let mut trace_bytes = Vec::new();
        self.trace.encode(&mut trace_bytes);
        let mut out = Vec::with_capacity(trace_bytes.len() + self.payloads.len() + 10);
        varint::encode(trace_bytes.len() as u64, &mut out);
        out.extend_from_slice(&trace_bytes);
        varint::encode(self.payloads.len() as u64, &mut out);
        out.extend_from_slice(&self.payloads);
        out
    }

    fn decode(input: &[u8]) -> Result<(Self, usize)> {
        let mut pos = 0;
        let (trace_len, n) = varint::decode_strict(&input[pos..])?;
        pos += n;
        let trace_len = trace_len as usize;
        let trace_end = pos
            .checked_add(trace_len)
            .filter(|&e| e <= input.len())
            .ok_or_else(|| Error::new(ErrorCode::Corruption, "truncated chunk: trace section"))?;
        let trace = Trace::decode(&input[pos..trace_end])?;
        pos = trace_end;
        let (payload_len, n) = varint::decode_strict(&input[pos..])?;
        pos += n;
        let payload_len = payload_len as usize;
        let payload_end = pos
            .checked_add(payload_len)
            .filter(|&e| e <= input.len())
            .ok_or_else(|| Error::new(ErrorCode::Corruption, "truncated chunk: payload section"))?;
        let payloads = input[pos..payload_end].to_vec();
        Ok((Chunk { trace, payloads }, payload_end))
    }
}

/// A full frame: header, one chunk, and whichever checksums were
/// requested.
pub struct Frame {
    /// Negotiated format version.
    pub version: u16,
    /// The single chunk this frame carries.
    pub chunk: Chunk,
    /// Which checksums are present.
    pub checksums: ChecksumConfig,
    /// The original (pre-compression) content, needed only to compute the
    /// content checksum at encode time.
    pub original_content: Option<Vec<u8>>,
}

impl Frame {
    /// Serialize this frame to bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut flags = 0u8;
        if self.checksums.content_checksum {
            flags |= FLAG_CONTENT_CHECKSUM;
        }
        if self.checksums.compressed_checksum {
            flags |= FLAG_COMPRESSED_CHECKSUM;
        }
        let mut out = Vec::new();
        magic::write_header(self.version, flags, &mut out)?;
        let chunk_bytes = self.chunk.encode();
        out.extend_from_slice(&chunk_bytes);

        if self.checksums.content_checksum {
            let content = self.original_content.as_deref().ok_or_else(|| {
                Error::new(
                    ErrorCode::InvalidRequest,
                    "content checksum requested but original content not supplied",
                )
            })?;
            out.extend_from_slice(&checksum::checksum32(content).to_le_bytes());
        }
        if self.checksums.compressed_checksum {
            let sum = checksum::checksum32(&out);
            out.extend_from_slice(&sum.to_le_bytes());
        }
        Ok(out)
    }

    /// Parse a frame's structure — header, chunk, and which checksums are
    /// declared — without verifying any checksum. The compressed-frame
    /// checksum can be checked immediately since every byte it covers is
    /// already in hand; the content checksum cannot, since it covers the
    /// *decompressed* content, which the caller has not produced yet. Use
    /// [`Frame::verify_content_checksum`] once it has.
    pub fn decode_unverified(input: &[u8]) -> Result<(Chunk, u16, ChecksumConfig)> {
        let (version, flags, header_len) = magic::read_header(input)?;
        let checksums = ChecksumConfig {
            content_checksum: flags & FLAG_CONTENT_CHECKSUM != 0,
            compressed_checksum: flags & FLAG_COMPRESSED_CHECKSUM != 0,
        };

        let trailer_len = (checksums.content_checksum as usize + checksums.compressed_checksum as usize) * 4;
        if input.len() < header_len + trailer_len {
            return Err(Error::new(ErrorCode::SrcSizeTooSmall, "frame shorter than its own trailer"));
        }
        let body_end = input.len() - trailer_len;

        if checksums.compressed_checksum {
            let covered = &input[..body_end + checksums.content_checksum as usize * 4];
            let stored = u32::from_le_bytes(input[input.len() - 4..].try_into().unwrap());
            let actual = checksum::checksum32(covered);
            if actual != stored {
                return Err(Error::new(ErrorCode::CompressedChecksumWrong, "compressed checksum mismatch"));
            }
        }

        let (chunk, consumed) = Chunk::decode(&input[header_len..body_end])?;
        if header_len + consumed != body_end {
            return Err(Error::new(ErrorCode::Corruption, "trailing bytes after chunk body"));
        }
        Ok((chunk, version, checksums))
    }

    /// Verify `input`'s content checksum against `content`, the
    /// already-reconstructed original bytes. No-op if `checksums` says no
    /// content checksum is present.
    pub fn verify_content_checksum(input: &[u8], content: &[u8], checksums: ChecksumConfig) -> Result<()> {
        if !checksums.content_checksum {
            return Ok(());
        }
        let trailer_len = (checksums.content_checksum as usize + checksums.compressed_checksum as usize) * 4;
        let offset = input.len() - trailer_len;
        let stored = u32::from_le_bytes(input[offset..offset + 4].try_into().unwrap());
        let actual = checksum::checksum32(content);
        if actual != stored {
            return Err(Error::new(ErrorCode::ContentChecksumWrong, "content checksum mismatch"));
        }
        Ok(())
    }

    /// Convenience combining [`Frame::decode_unverified`] and
    /// [`Frame::verify_content_checksum`] for callers that already have
    /// the original content on hand (primarily tests).
    pub fn decode(input: &[u8], original_content: Option<&[u8]>) -> Result<(Chunk, u16, ChecksumConfig)> {
        let (chunk, version, checksums) = Self::decode_unverified(input)?;
        if checksums.content_checksum {
            let content = original_content.ok_or_else(|| {
                Error::new(
                    ErrorCode::InvalidRequest,
                    "content checksum present but no decoded content supplied for verification",
                )
            })?;
            Self::verify_content_checksum(input, content, checksums)?;
        }
        Ok((chunk, version, checksums))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceEntry;

    fn sample_trace() -> Trace {
        let mut t = Trace::new();
        t.push(TraceEntry::Transform {
            node: crate::node::NodeId(1),
            num_outputs: 1,
        });
        t
    }

    #[test]
    fn frame_without_checksums_round_trips() {
        let frame = Frame {
            version: 1,
            chunk: Chunk {
                trace: sample_trace(),
                payloads: vec![1, 2, 3],
            },
            checksums: ChecksumConfig::default(),
            original_content: None,
        };
        let bytes = frame.encode().unwrap();
        let (chunk, version, checksums) = Frame::decode(&bytes, None).unwrap();
        assert_eq!(version, 1);
        assert!(!checksums.content_checksum);
        assert_eq!(chunk.payloads, vec![1, 2, 3]);
    }

    #[test]
    fn both_checksums_verify() {
        let original = b"hello world".to_vec();
        let frame = Frame {
            version: 2,
            chunk: Chunk {
                trace: sample_trace(),
                payloads: vec![9, 9],
            },
            checksums: ChecksumConfig {
                content_checksum: true,
                compressed_checksum: true,
            },
            original_content: Some(original.clone()),
        };
        let bytes = frame.encode().unwrap();
        let (_, _, checksums) = Frame::decode(&bytes, Some(&original)).unwrap();
        assert!(checksums.content_checksum && checksums.compressed_checksum);
    }

    #[test]
    fn corrupted_content_checksum_is_detected_in_isolation() {
        // spec.md §8 scenario 3: flip the content-checksum byte, then
        // recompute-and-rewrite the compressed checksum so only the
        // content checksum fails.
        let original = b"hello world".to_vec();
        let frame = Frame {
            version: 2,
            chunk: Chunk {
                trace: sample_trace(),
                payloads: vec![9, 9],
            },
            checksums: ChecksumConfig {
                content_checksum: true,
                compressed_checksum: true,
            },
            original_content: Some(original.clone()),
        };
        let mut bytes = frame.encode().unwrap();
        let content_checksum_offset = bytes.len() - 8;
        bytes[content_checksum_offset] ^= 0xff;
        let recomputed = checksum::checksum32(&bytes[..bytes.len() - 4]);
        let tail = bytes.len() - 4;
        bytes[tail..].copy_from_slice(&recomputed.to_le_bytes());

        let err = Frame::decode(&bytes, Some(&original)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ContentChecksumWrong);
    }
}
