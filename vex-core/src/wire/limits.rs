//! Version-dependent resource limits (`spec.md` §4.D).
//!
//! Exceeding either limit must abort compression with an
//! `invalidTransform`-family error before any data is written.

use crate::error::{Error, ErrorCode, Result};

/// Resource limits in effect for a given negotiated format version.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLimits {
    /// Maximum output streams a single node invocation may produce.
    pub max_node_outputs: usize,
    /// Maximum concurrent runtime streams live within one chunk.
    pub max_runtime_streams_per_chunk: usize,
}

impl ResourceLimits {
    /// The limits in effect at `version`. Versions 1 and 2 share limits;
    /// version 3 raises the per-chunk stream cap.
    pub fn for_version(version: u16) -> Self {
        if version >= 3 {
            Self {
                max_node_outputs: 64,
                max_runtime_streams_per_chunk: 4096,
            }
        } else {
            Self {
                max_node_outputs: 32,
                max_runtime_streams_per_chunk: 1024,
            }
        }
    }

    /// Validate a node's declared output count against this limit.
    pub fn check_node_outputs(&self, count: usize) -> Result<()> {
        if count > self.max_node_outputs {
            return Err(Error::new(
                ErrorCode::InvalidTransform,
                format!(
                    "node declares {count} outputs, exceeding the limit of {}",
                    self.max_node_outputs
                ),
            ));
        }
        Ok(())
    }

    /// Validate a chunk's live runtime-stream count against this limit.
    pub fn check_runtime_streams(&self, count: usize) -> Result<()> {
        if count > self.max_runtime_streams_per_chunk {
            return Err(Error::new(
                ErrorCode::InvalidTransform,
                format!(
                    "chunk requires {count} concurrent streams, exceeding the limit of {}",
                    self.max_runtime_streams_per_chunk
                ),
            ));
        }
        Ok(())
    }
}
