//! Benchmarked, memoized fitness evaluation (`spec.md` §4.L "Fitness" /
//! "Evaluation").
//!
//! A candidate's gene is built into a real `vex_graph` registry and run
//! through actual compress/decompress calls against the training
//! corpus; nothing here is simulated. Every objective is "smaller is
//! better": compressed size (with a simplicity penalty scaled by node
//! count), compress time, decompress time.
//!
//! The original C++'s `ACECompressionResult::asFloatVector()` reports
//! ratio and throughput (bigger is better); this port instead reports
//! raw size and raw nanosecond durations (smaller is better), which is
//! the convention the NSGA-II routines in [`crate::nsga`] assume. This
//! is a deliberate simplification, not an oversight — see `DESIGN.md`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use rand::Rng;
use vex_core::error::Result;
use vex_core::stream::{StreamType, TypedStream};
use vex_graph::compressor::Compressor;
use vex_graph::params::Parameters;

use crate::individual::Individual;
use crate::registry_build::build_registry;

/// The per-node simplicity penalty: compressed size is scaled by
/// `1 + node_count * SIMPLICITY_PENALTY`, breaking ties between
/// equally-compressing trees in favor of the simpler one.
const SIMPLICITY_PENALTY: f64 = 0.001;

/// One training input: a self-contained, `Send`-able snapshot of a
/// `Numeric` stream's content. Kept as plain bytes (rather than a
/// `TypedStream`, which is `Rc`-backed and so neither `Send` nor `Sync`)
/// so a whole corpus can be shared across the rayon thread pool; each
/// worker reconstructs its own `TypedStream` locally.
#[derive(Debug, Clone)]
pub struct CorpusItem {
    width: usize,
    num_elements: usize,
    bytes: Vec<u8>,
}

impl CorpusItem {
    /// Snapshot a numeric stream's content into a corpus item.
    pub fn from_numeric_stream(stream: &TypedStream) -> Self {
        assert_eq!(stream.ty(), StreamType::Numeric, "ACE corpus items must be Numeric streams");
        Self {
            width: stream.width(),
            num_elements: stream.num_elements(),
            bytes: stream.with_bytes(|b| b.to_vec()),
        }
    }

    /// Rebuild a fresh, local `TypedStream` from this item's snapshot.
    pub fn to_typed_stream(&self) -> Result<TypedStream> {
        let s = TypedStream::create(StreamType::Numeric, self.width)?;
        s.reserve(self.num_elements)?;
        s.write_bytes(&self.bytes)?;
        s.commit(self.num_elements)?;
        Ok(s)
    }
}

/// A candidate's 3-objective fitness vector, all smaller-is-better
/// (`spec.md` §4.L "Fitness").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fitness {
    /// Total compressed size across the corpus, after the simplicity
    /// penalty.
    pub compressed_size: f64,
    /// Total wall-clock compress time across the corpus, in nanoseconds.
    pub compress_time_ns: f64,
    /// Total wall-clock decompress time across the corpus, in nanoseconds.
    pub decompress_time_ns: f64,
}

impl Fitness {
    /// This fitness as the `Vec<f64>` the [`crate::nsga`] routines expect.
    pub fn as_vec(&self) -> Vec<f64> {
        vec![self.compressed_size, self.compress_time_ns, self.decompress_time_ns]
    }
}

/// Builds `individual` into a registry, compresses and decompresses
/// every corpus item once, and returns the raw (un-penalized except for
/// node-count scaling on size) fitness. This is the single-threaded unit
/// of work one rayon task performs for one candidate.
pub fn evaluate_one(individual: &Individual, corpus: &[CorpusItem], format_version: u16) -> Result<Fitness> {
    let (registry, root) = build_registry(individual);
    let params = Parameters::new().with_format_version(format_version)?;
    let compressor = Compressor::new(registry, params);

    let mut total_size = 0u64;
    let mut compress_ns = 0u128;
    let mut decompress_ns = 0u128;

    for item in corpus {
        let input = item.to_typed_stream()?;
        let t0 = Instant::now();
        let bytes = compressor.compress(root, input)?;
        compress_ns += t0.elapsed().as_nanos();
        total_size += bytes.len() as u64;

        let t1 = Instant::now();
        let _ = compressor.decompress(&bytes)?;
        decompress_ns += t1.elapsed().as_nanos();
    }

    let penalty = 1.0 + individual.node_count() as f64 * SIMPLICITY_PENALTY;
    Ok(Fitness {
        compressed_size: total_size as f64 * penalty,
        compress_time_ns: compress_ns as f64,
        decompress_time_ns: decompress_ns as f64,
    })
}

struct MemoEntry {
    fitness: Fitness,
    observations: u32,
}

/// Memoizes fitness by structural hash (`spec.md` §4.L "Evaluation"):
/// a never-before-seen candidate is always benchmarked; a repeat is
/// re-benchmarked with probability `1 / observations` to average out
/// measurement noise without re-running every identical candidate every
/// generation.
pub struct Evaluator<'a> {
    corpus: &'a [CorpusItem],
    format_version: u16,
    memo: Mutex<HashMap<u64, MemoEntry>>,
}

impl<'a> Evaluator<'a> {
    /// Builds an evaluator over `corpus`, run at `format_version`.
    pub fn new(corpus: &'a [CorpusItem], format_version: u16) -> Self {
        Self {
            corpus,
            format_version,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// The training corpus this evaluator benchmarks against.
    pub fn corpus(&self) -> &[CorpusItem] {
        self.corpus
    }

    /// The format version every candidate is compressed at.
    pub fn format_version(&self) -> u16 {
        self.format_version
    }

    /// Evaluates `individual`, consulting and updating the memo table.
    pub fn evaluate(&self, individual: &Individual, rng: &mut impl Rng) -> Result<Fitness> {
        let hash = individual.structural_hash();

        let should_benchmark = {
            let memo = self.memo.lock().expect("memo mutex poisoned");
            match memo.get(&hash) {
                None => true,
                Some(entry) => rng.gen_bool(1.0 / entry.observations as f64),
            }
        };

        if !should_benchmark {
            let memo = self.memo.lock().expect("memo mutex poisoned");
            return Ok(memo[&hash].fitness);
        }

        let fitness = evaluate_one(individual, self.corpus, self.format_version)?;
        let mut memo = self.memo.lock().expect("memo mutex poisoned");
        let entry = memo.entry(hash).or_insert(MemoEntry { fitness, observations: 0 });
        entry.fitness = fitness;
        entry.observations += 1;
        Ok(fitness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::Leaf;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn constant_corpus_item(value: i64, len: usize) -> CorpusItem {
        let s = TypedStream::create(StreamType::Numeric, 8).unwrap();
        s.reserve(len).unwrap();
        for _ in 0..len {
            s.write_bytes(&value.to_le_bytes()).unwrap();
        }
        s.commit(len).unwrap();
        CorpusItem::from_numeric_stream(&s)
    }

    #[test]
    fn rangepack_beats_store_on_a_constant_stream() {
        let corpus = vec![constant_corpus_item(7, 1000)];
        let store = evaluate_one(&Individual::leaf(Leaf::Store), &corpus, 1).unwrap();
        let rangepack = evaluate_one(&Individual::leaf(Leaf::RangePack), &corpus, 1).unwrap();
        assert!(rangepack.compressed_size < store.compressed_size);
    }

    #[test]
    fn memoized_evaluation_returns_consistent_fitness() {
        let corpus = vec![constant_corpus_item(7, 200)];
        let evaluator = Evaluator::new(&corpus, 1);
        let mut rng = SmallRng::seed_from_u64(3);
        let tree = Individual::leaf(Leaf::RangePack);
        let first = evaluator.evaluate(&tree, &mut rng).unwrap();
        let second = evaluator.evaluate(&tree, &mut rng).unwrap();
        assert_eq!(first.compressed_size, second.compressed_size);
    }
}
