//! The population lifecycle (`spec.md` §4.L), analogous to the original
//! `tools/training/ace/automated_compressor_explorer.h`'s
//! `AutomatedCompressorExplorer : GeneticAlgorithm<ACECompressor>`: seeds
//! an initial population, then repeatedly extends it with
//! freshly-reproduced children, re-ranks the combined set by NSGA-II
//! Pareto rank and crowding distance, and truncates back down to
//! `population_size`.

use std::collections::HashSet;
use std::time::Instant;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{info, warn};

use crate::fitness::{CorpusItem, Evaluator, Fitness};
use crate::individual::{prebuilt_compressors, random_tree, Individual, Leaf};
use crate::nsga::{crowding_distance, fast_non_dominated_sort};
use crate::operators::{crossover, mutate, DEFAULT_MAX_RANDOM_OPS};
use crate::selection::TournamentSelector;

/// Tunables for one ACE run (`spec.md` §4.L).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Population size held at the end of every generation.
    pub population_size: usize,
    /// Tournament selection parameters.
    pub tournament: TournamentSelector,
    /// Probability a freshly-crossed-over child is also mutated.
    pub mutation_probability: f64,
    /// Wire format version every candidate is benchmarked at.
    pub format_version: u16,
    /// Cap on transform steps in a freshly random tree.
    pub max_random_ops: usize,
    /// Worker threads in the bounded pool fitness evaluation runs on.
    /// `0` defers to rayon's default (number of logical CPUs).
    pub threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            tournament: TournamentSelector {
                tournament_size: 4,
                win_probability: 0.8,
            },
            mutation_probability: 0.3,
            format_version: 1,
            max_random_ops: DEFAULT_MAX_RANDOM_OPS,
            threads: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct Member {
    genome: Individual,
    fitness: Fitness,
    rank: usize,
    crowding: f64,
}

/// Drives NSGA-II generations of [`Individual`] genes against a training
/// corpus (`spec.md` §4.L).
pub struct Engine<'a> {
    config: EngineConfig,
    evaluator: Evaluator<'a>,
    pool: ThreadPool,
    population: Vec<Member>,
    generation: usize,
}

impl<'a> Engine<'a> {
    /// Builds a new run, seeding from [`prebuilt_compressors`] plus
    /// randomly generated trees, filled out to `config.population_size`
    /// (`spec.md` §4.L "Initial population").
    pub fn new(config: EngineConfig, corpus: &'a [CorpusItem]) -> Self {
        Self::seed_with_snapshot(config, corpus, Vec::new())
    }

    /// Builds a new run whose initial population is a previously
    /// persisted snapshot, extended (never replaced) with the usual
    /// prebuilt and random seed trees (`spec.md` §4.L "Snapshot / resume":
    /// "loading a snapshot never discards the current population; it
    /// only extends it").
    pub fn seed_with_snapshot(config: EngineConfig, corpus: &'a [CorpusItem], snapshot: Vec<Individual>) -> Self {
        let mut initial = snapshot;
        let mut rng = SmallRng::from_entropy();
        for seed in prebuilt_compressors() {
            if !initial.contains(&seed) {
                initial.push(seed);
            }
        }
        while initial.len() < config.population_size {
            initial.push(random_tree(&mut rng, config.max_random_ops));
        }
        Self::from_population(config, corpus, initial)
    }

    /// Builds a run from an explicit initial population.
    pub fn from_population(config: EngineConfig, corpus: &'a [CorpusItem], initial: Vec<Individual>) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .expect("thread pool configuration is valid");
        let evaluator = Evaluator::new(corpus, config.format_version);
        let cap = config.population_size;
        let mut engine = Self {
            config,
            evaluator,
            pool,
            population: Vec::new(),
            generation: 0,
        };
        let evaluated = engine.evaluate_batch(initial);
        engine.population = engine.rank_and_truncate(evaluated, cap);
        engine
    }

    /// The current generation number (0 immediately after construction).
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// The live population's genomes, in no particular order. Exposed
    /// for CBOR snapshotting (`spec.md` §4.L "Snapshot / resume").
    pub fn population(&self) -> Vec<Individual> {
        self.population.iter().map(|m| m.genome.clone()).collect()
    }

    /// The current rank-0 (non-dominated) front: the Pareto frontier
    /// ACE's search is converging toward (`spec.md` §7 "ACE Pareto
    /// dominance").
    pub fn pareto_front(&self) -> Vec<Individual> {
        self.population.iter().filter(|m| m.rank == 0).map(|m| m.genome.clone()).collect()
    }

    /// The rank-0 front paired with the exact fitness values used to
    /// rank it, for verifying the no-internal-domination invariant
    /// without re-benchmarking (which would reintroduce timing noise
    /// that the stored ranking already accounted for).
    pub fn pareto_front_with_fitness(&self) -> Vec<(Individual, Fitness)> {
        self.population
            .iter()
            .filter(|m| m.rank == 0)
            .map(|m| (m.genome.clone(), m.fitness))
            .collect()
    }

    /// Merges a loaded snapshot into the running population without
    /// discarding any current member, then re-evaluates and re-truncates
    /// to `population_size` the same way [`Engine::step`] would.
    pub fn extend_with_snapshot(&mut self, snapshot: Vec<Individual>) {
        let mut combined: Vec<Individual> = self.population.iter().map(|m| m.genome.clone()).collect();
        combined.extend(snapshot);
        let evaluated = self.evaluate_batch(combined);
        let cap = self.config.population_size;
        self.population = self.rank_and_truncate(evaluated, cap);
    }

    /// Runs one generation: reproduce `population_size` children,
    /// combine with the current population, re-rank, and truncate.
    pub fn step(&mut self) {
        let pop_size = self.population.len();
        let rank: Vec<usize> = self.population.iter().map(|m| m.rank).collect();
        let crowding: Vec<f64> = self.population.iter().map(|m| m.crowding).collect();
        let mut seen: HashSet<u64> = self.population.iter().map(|m| m.genome.structural_hash()).collect();

        let mut rng = SmallRng::from_entropy();
        let mut children = Vec::with_capacity(self.config.population_size);
        let max_attempts = self.config.population_size * 4;
        let mut attempts = 0;
        while children.len() < self.config.population_size && attempts < max_attempts {
            attempts += 1;
            let a = self.config.tournament.select(&mut rng, pop_size, &rank, &crowding);
            let b = self.config.tournament.select(&mut rng, pop_size, &rank, &crowding);
            let mut child = crossover(&mut rng, &self.population[b].genome, &self.population[a].genome);
            if rng.gen_bool(self.config.mutation_probability) {
                child = mutate(&mut rng, &child);
            }
            if seen.insert(child.structural_hash()) {
                children.push(child);
            }
        }
        // Couldn't find enough children distinct from the current
        // population within the attempt budget: pad with fresh random
        // trees so the generation still advances at full width.
        while children.len() < self.config.population_size {
            children.push(random_tree(&mut rng, self.config.max_random_ops));
        }

        let mut combined: Vec<Individual> = self.population.iter().map(|m| m.genome.clone()).collect();
        combined.extend(children);

        let evaluated = self.evaluate_batch(combined);
        let cap = self.config.population_size;
        self.population = self.rank_and_truncate(evaluated, cap);
        self.generation += 1;
    }

    /// Runs generations until either `generations` completes or
    /// `deadline` passes, whichever comes first; always runs at least
    /// one generation regardless of `deadline` (`spec.md` §4.L
    /// "Termination").
    pub fn run(&mut self, generations: usize, deadline: Option<Instant>) {
        let generations = generations.max(1);
        for gen in 0..generations {
            if gen > 0 {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        break;
                    }
                }
            }
            self.step();
            info!(generation = self.generation, population = self.population.len(), "ACE generation complete");
        }
    }

    /// The best solution found so far: the rank-0 member with the
    /// smallest compressed size.
    pub fn solution(&self) -> Individual {
        self.best_member().genome.clone()
    }

    /// The fitness of [`Engine::solution`].
    pub fn best_fitness(&self) -> Fitness {
        self.best_member().fitness
    }

    fn best_member(&self) -> &Member {
        self.population
            .iter()
            .filter(|m| m.rank == 0)
            .min_by(|a, b| a.fitness.compressed_size.partial_cmp(&b.fitness.compressed_size).unwrap())
            .or_else(|| self.population.first())
            .expect("population is never empty")
    }

    fn evaluate_batch(&self, genomes: Vec<Individual>) -> Vec<(Individual, Fitness)> {
        self.pool.install(|| {
            genomes
                .into_par_iter()
                .filter_map(|genome| {
                    let mut rng = SmallRng::from_entropy();
                    match self.evaluator.evaluate(&genome, &mut rng) {
                        Ok(fitness) => Some((genome, fitness)),
                        Err(err) => {
                            warn!(gene = ?genome, error = %err, "candidate failed to compress, dropping from population");
                            None
                        }
                    }
                })
                .collect()
        })
    }

    fn rank_and_truncate(&self, evaluated: Vec<(Individual, Fitness)>, cap: usize) -> Vec<Member> {
        if evaluated.is_empty() {
            warn!("every candidate failed to compress; falling back to a trivial store graph");
            let fallback = Individual::leaf(Leaf::Store);
            let fitness = crate::fitness::evaluate_one(&fallback, self.evaluator.corpus(), self.evaluator.format_version())
                .expect("the store leaf always succeeds");
            return vec![Member {
                genome: fallback,
                fitness,
                rank: 0,
                crowding: f64::INFINITY,
            }];
        }

        let fitness_vecs: Vec<Vec<f64>> = evaluated.iter().map(|(_, f)| f.as_vec()).collect();
        let fronts = fast_non_dominated_sort(&fitness_vecs);
        let cap = cap.min(evaluated.len());

        let mut members = Vec::with_capacity(cap);
        for (rank, front) in fronts.iter().enumerate() {
            if members.len() >= cap {
                break;
            }
            let distances = crowding_distance(front, &fitness_vecs);
            if members.len() + front.len() <= cap {
                for (&idx, &dist) in front.iter().zip(&distances) {
                    let (genome, fitness) = evaluated[idx].clone();
                    members.push(Member { genome, fitness, rank, crowding: dist });
                }
                continue;
            }
            let remaining = cap - members.len();
            let mut ordered: Vec<(usize, f64)> = front.iter().copied().zip(distances.iter().copied()).collect();
            ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            for (idx, dist) in ordered.into_iter().take(remaining) {
                let (genome, fitness) = evaluated[idx].clone();
                members.push(Member { genome, fitness, rank, crowding: dist });
            }
        }
        members
    }
}

/// Serializes a population's genomes to CBOR (`spec.md` §4.L
/// "Snapshot / resume").
pub fn save_population(genomes: &[Individual], writer: impl std::io::Write) -> Result<(), ciborium::ser::Error<std::io::Error>> {
    ciborium::ser::into_writer(genomes, writer)
}

/// Deserializes genomes from a CBOR snapshot, for merging into
/// [`Engine::seed_with_snapshot`] or [`Engine::extend_with_snapshot`].
pub fn load_population(reader: impl std::io::Read) -> Result<Vec<Individual>, ciborium::de::Error<std::io::Error>> {
    ciborium::de::from_reader(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vex_core::stream::{StreamType, TypedStream};

    fn triple_delta_corpus() -> Vec<CorpusItem> {
        let n = 1000usize;
        let mut values = vec![1i64; n];
        for _ in 0..3 {
            let mut acc = 0i64;
            for v in values.iter_mut() {
                acc += *v;
                *v = acc;
            }
        }
        let s = TypedStream::create(StreamType::Numeric, 8).unwrap();
        s.reserve(n).unwrap();
        for v in &values {
            s.write_bytes(&v.to_le_bytes()).unwrap();
        }
        s.commit(n).unwrap();
        vec![CorpusItem::from_numeric_stream(&s)]
    }

    #[test]
    fn solution_never_regresses_below_the_store_baseline() {
        let corpus = triple_delta_corpus();
        let config = EngineConfig {
            population_size: 12,
            threads: 1,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config, &corpus);
        engine.run(5, None);
        let store_only = crate::fitness::evaluate_one(&Individual::leaf(Leaf::Store), &corpus, 1).unwrap();
        assert!(engine.best_fitness().compressed_size <= store_only.compressed_size);
    }

    #[test]
    fn snapshot_round_trips_through_cbor() {
        let population = vec![
            Individual::leaf(Leaf::Store),
            Individual::transform(crate::individual::Op::Delta, Individual::leaf(Leaf::RangePack)),
        ];
        let mut bytes = Vec::new();
        save_population(&population, &mut bytes).unwrap();
        let loaded = load_population(bytes.as_slice()).unwrap();
        assert_eq!(loaded, population);
    }

    #[test]
    fn extending_with_a_snapshot_never_shrinks_below_population_size() {
        let corpus = triple_delta_corpus();
        let config = EngineConfig {
            population_size: 8,
            threads: 1,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config, &corpus);
        let snapshot = vec![Individual::leaf(Leaf::RangePack)];
        engine.extend_with_snapshot(snapshot);
        assert_eq!(engine.population().len(), 8);
    }
}
