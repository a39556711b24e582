//! `vex train` (`SPEC_FULL.md` §6, §4.L).

use std::fs::{self, File};
use std::path::Path;

use tracing::warn;
use vex_core::stream::{StreamType, TypedStream};
use vex_train::{save_population, CorpusItem, Engine, EngineConfig};

/// Runs ACE over every 8-byte-aligned file in `corpus_dir`, interpreting
/// each as a stream of little-endian `i64`s, and writes the resulting
/// population to `out` as a CBOR snapshot.
pub fn cmd_train(corpus_dir: &Path, out: &Path, generations: usize, population: usize) -> Result<(), Box<dyn std::error::Error>> {
    let mut corpus = Vec::new();
    for entry in fs::read_dir(corpus_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let bytes = fs::read(entry.path())?;
        if bytes.len() % 8 != 0 {
            warn!(file = %entry.path().display(), "skipping corpus file whose length is not a multiple of 8");
            continue;
        }
        let num_elements = bytes.len() / 8;
        let stream = TypedStream::create(StreamType::Numeric, 8)?;
        stream.reserve(num_elements)?;
        stream.write_bytes(&bytes)?;
        stream.commit(num_elements)?;
        corpus.push(CorpusItem::from_numeric_stream(&stream));
    }

    if corpus.is_empty() {
        return Err("corpus directory contained no usable (8-byte-aligned) files".into());
    }

    let config = EngineConfig {
        population_size: population,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(config, &corpus);
    engine.run(generations, None);

    let file = File::create(out)?;
    save_population(&engine.population(), file)?;
    println!(
        "trained {} generation(s) over {} corpus item(s); best compressed size {:.0} bytes; snapshot written to {}",
        engine.generation(),
        corpus.len(),
        engine.best_fitness().compressed_size,
        out.display()
    );
    Ok(())
}
