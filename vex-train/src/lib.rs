//! # vex-train
//!
//! The Automated Compressor Explorer (`spec.md` §3.5, §4.L): an
//! NSGA-II-style multi-objective genetic search that discovers
//! compressor trees for a training corpus, evolving a population along
//! the Pareto frontier of (compressed-size, compress-time,
//! decompress-time).
//!
//! - [`individual`]: the gene — a unary pipeline of `vex-graph` transform
//!   nodes terminated by a leaf codec, plus the prebuilt/random tree
//!   builders used to seed a population.
//! - [`registry_build`]: turns a gene into a real, runnable
//!   `vex_graph::Registry` + root `GraphId`.
//! - [`nsga`]: `dominates`, `fast_non_dominated_sort`, `crowding_distance`.
//! - [`selection`]: NSGA-II-ordered tournament selection.
//! - [`operators`]: crossover and mutation over [`individual::Individual`].
//! - [`fitness`]: benchmarked, memoized fitness evaluation.
//! - [`engine`]: the population lifecycle (`step`/`run`) and CBOR
//!   snapshot/resume.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod fitness;
pub mod individual;
pub mod nsga;
pub mod operators;
pub mod registry_build;
pub mod selection;

pub use engine::{load_population, save_population, Engine, EngineConfig};
pub use fitness::{CorpusItem, Fitness};
pub use individual::Individual;
