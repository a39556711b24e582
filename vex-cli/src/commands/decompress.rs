//! `vex decompress` (`SPEC_FULL.md` §6).

use std::fs;
use std::path::Path;

use vex_graph::compressor::Compressor;
use vex_graph::params::Parameters;

use crate::graphs::build_catalog;

/// Decompresses `input` into `output`. No `--graph` flag is needed: the
/// catalog registry's node ids are unique across every named graph, so
/// whichever node ids the frame's trace references resolve correctly
/// regardless of which named graph produced it.
pub fn cmd_decompress(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (registry, _graphs) = build_catalog();
    let bytes = fs::read(input)?;

    let info = Compressor::frame_info(&bytes)?;
    let params = Parameters::new().with_format_version(info.format_version)?;
    let compressor = Compressor::new(registry, params);

    let decompressed = compressor.decompress(&bytes)?;
    let out_bytes = decompressed.with_bytes(<[u8]>::to_vec);
    fs::write(output, &out_bytes)?;
    println!("decompressed {} bytes -> {} bytes", bytes.len(), out_bytes.len());
    Ok(())
}
