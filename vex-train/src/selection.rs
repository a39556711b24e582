//! NSGA-II tournament selection (`spec.md` §4.L "Selection"), ported
//! from `genetic_algorithm.h`'s `TournamentSelector`.

use rand::seq::index::sample;
use rand::Rng;

/// Samples a fixed-size, unique candidate set from the population, sorts
/// it by `(Pareto rank ascending, crowding distance descending)`, then
/// walks forward picking the current best with `win_probability`,
/// falling through to the next-best candidate otherwise; the last
/// candidate is returned unconditionally if none of the earlier ones won.
#[derive(Debug, Clone)]
pub struct TournamentSelector {
    /// Number of unique candidates sampled per selection.
    pub tournament_size: usize,
    /// Probability the best-ranked remaining candidate wins the tournament.
    pub win_probability: f64,
}

impl TournamentSelector {
    /// Select one index in `0..population_size`, given each member's
    /// Pareto `rank` (lower is better) and `crowding` distance (higher is
    /// better).
    pub fn select(&self, rng: &mut impl Rng, population_size: usize, rank: &[usize], crowding: &[f64]) -> usize {
        let size = self.tournament_size.min(population_size).max(1);
        let mut candidates: Vec<usize> = sample(rng, population_size, size).into_iter().collect();
        candidates.sort_by(|&a, &b| {
            rank[a]
                .cmp(&rank[b])
                .then_with(|| crowding[b].partial_cmp(&crowding[a]).unwrap_or(std::cmp::Ordering::Equal))
        });
        for &candidate in &candidates[..candidates.len() - 1] {
            if rng.gen_bool(self.win_probability) {
                return candidate;
            }
        }
        *candidates.last().expect("tournament_size is at least 1")
    }
}
