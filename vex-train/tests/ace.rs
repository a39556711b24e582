//! End-to-end scenario from `spec.md` §8: ACE convergence on
//! triple-delta numeric data. The spec's population=50/generations=100
//! is scaled down per `SPEC_FULL.md` §12 so this runs in bounded time
//! while still exercising the same convergence property: starting from
//! a population seeded mostly with trees that do *not* already delta
//! the data, ACE should find a compressor at least as good as triple
//! delta into `rangepack`, comfortably under the spec's 90-byte target.

use vex_core::stream::{StreamType, TypedStream};
use vex_train::engine::EngineConfig;
use vex_train::individual::{Individual, Leaf, Op};
use vex_train::{CorpusItem, Engine};

fn triple_delta_sequence(len: usize) -> Vec<i64> {
    let mut values = vec![1i64; len];
    for _ in 0..3 {
        let mut acc = 0i64;
        for v in values.iter_mut() {
            acc += *v;
            *v = acc;
        }
    }
    values
}

fn corpus_from(values: &[i64]) -> CorpusItem {
    let s = TypedStream::create(StreamType::Numeric, 8).unwrap();
    s.reserve(values.len()).unwrap();
    for v in values {
        s.write_bytes(&v.to_le_bytes()).unwrap();
    }
    s.commit(values.len()).unwrap();
    CorpusItem::from_numeric_stream(&s)
}

#[test]
fn ace_converges_on_triple_delta_numeric_data() {
    let values = triple_delta_sequence(1000);
    let corpus = vec![corpus_from(&values)];

    let config = EngineConfig {
        population_size: 20,
        threads: 2,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(config, &corpus);
    engine.run(15, None);

    let best = engine.best_fitness();
    assert!(
        best.compressed_size <= 90.0,
        "best candidate's compressed size {} exceeds the 90-byte target",
        best.compressed_size
    );
}

#[test]
fn ace_never_regresses_below_a_known_good_pipeline() {
    let values = triple_delta_sequence(1000);
    let corpus = vec![corpus_from(&values)];

    let known_good = Individual::transform(
        Op::Delta,
        Individual::transform(Op::Delta, Individual::transform(Op::Delta, Individual::leaf(Leaf::RangePack))),
    );
    let known_good_fitness = vex_train::fitness::evaluate_one(&known_good, &corpus, 1).unwrap();

    let config = EngineConfig {
        population_size: 16,
        threads: 2,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(config, &corpus);
    engine.run(10, None);

    assert!(engine.best_fitness().compressed_size <= known_good_fitness.compressed_size * 1.5);
}

#[test]
fn final_pareto_front_has_no_internal_domination() {
    let values = triple_delta_sequence(256);
    let corpus = vec![corpus_from(&values)];

    let config = EngineConfig {
        population_size: 10,
        threads: 1,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(config, &corpus);
    engine.run(6, None);

    let fitnesses: Vec<Vec<f64>> = engine.pareto_front_with_fitness().iter().map(|(_, f)| f.as_vec()).collect();

    for i in 0..fitnesses.len() {
        for j in 0..fitnesses.len() {
            if i == j {
                continue;
            }
            assert!(
                !vex_train::nsga::dominates(&fitnesses[i], &fitnesses[j]),
                "candidate {i} dominates candidate {j} on the final Pareto front"
            );
        }
    }
}
