//! `vex frame-info` (`SPEC_FULL.md` §6).

use std::fs;
use std::path::Path;

use vex_graph::compressor::Compressor;

/// Prints a frame's header metadata without running the executor.
pub fn cmd_frame_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let info = Compressor::frame_info(&bytes)?;
    println!("format_version: {}", info.format_version);
    println!("content_checksum: {}", info.has_content_checksum);
    println!("compressed_checksum: {}", info.has_compressed_checksum);
    Ok(())
}
