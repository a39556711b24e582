//! `vex compress` (`SPEC_FULL.md` §6).

use std::fs;
use std::path::Path;

use vex_core::error::{Error, ErrorCode};
use vex_core::stream::{StreamType, TypedStream};
use vex_graph::compressor::Compressor;
use vex_graph::params::Parameters;

use crate::graphs::{build_catalog, find};

/// Compresses `input` into `output` by running the named graph
/// `graph` at `format_version`.
pub fn cmd_compress(input: &Path, output: &Path, graph: &str, format_version: u16) -> Result<(), Box<dyn std::error::Error>> {
    let (registry, graphs) = build_catalog();
    let named = find(&graphs, graph).ok_or_else(|| {
        let names: Vec<&str> = graphs.iter().map(|g| g.name).collect();
        Error::new(ErrorCode::InvalidRequest, format!("unknown graph {graph:?}; known graphs: {}", names.join(", ")))
    })?;

    let bytes = fs::read(input)?;
    let stream = build_stream(named.stream_type, named.width, &bytes)?;

    let params = Parameters::new().with_format_version(format_version)?;
    let compressor = Compressor::new(registry, params);
    let compressed = compressor.compress(named.root, stream)?;

    fs::write(output, &compressed)?;
    println!("compressed {} bytes -> {} bytes via {graph}", bytes.len(), compressed.len());
    Ok(())
}

fn build_stream(ty: StreamType, width: usize, bytes: &[u8]) -> Result<TypedStream, Error> {
    if bytes.len() % width != 0 {
        return Err(Error::new(
            ErrorCode::InvalidRequest,
            format!("input length {} is not a multiple of this graph's element width {width}", bytes.len()),
        ));
    }
    let num_elements = bytes.len() / width;
    let stream = TypedStream::create(ty, width)?;
    stream.reserve(num_elements)?;
    stream.write_bytes(bytes)?;
    stream.commit(num_elements)?;
    Ok(stream)
}
