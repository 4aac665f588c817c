//! Monoalphabetic key search: genetic algorithm followed by strict hill-climbing.

use std::{ops::RangeInclusive, time::Duration};

use log::{debug, info};
use rand::{Rng, SeedableRng, seq::SliceRandom};
use rand_chacha::ChaCha20Rng;

use super::{Budget, History, SearchOutcome};
use crate::{
    cipher::SubstitutionKey,
    error::{Error, Result},
    language::LanguageModel,
    scoring::{ScoreWeights, Scorer, descending},
    text::ALPHABET_LEN,
};

#[derive(Clone, Debug)]
pub struct SubstitutionConfig {
    pub population: usize,
    pub generations: usize,
    /// Keys carried unchanged into the next generation.
    pub elite: usize,
    /// Parents are drawn from this many of the best keys.
    pub parent_pool: usize,
    pub mutation_rate: f64,
    /// Range of the crossover cut point.
    pub crossover_cut: RangeInclusive<usize>,
    pub climb_iterations: usize,
    /// Stop the genetic stage after this many generations without a new best.
    pub plateau: Option<usize>,
    /// Put the frequency-rank key into the first population.
    pub seed_with_frequency_key: bool,
    pub weights: ScoreWeights,
    pub seed: u64,
    pub timeout: Option<Duration>,
}

impl Default for SubstitutionConfig {
    fn default() -> Self {
        Self {
            population: 100,
            generations: 300,
            elite: 5,
            parent_pool: 50,
            mutation_rate: 0.2,
            crossover_cut: 5..=20,
            climb_iterations: 5000,
            plateau: None,
            seed_with_frequency_key: true,
            weights: ScoreWeights::substitution(),
            seed: 0,
            timeout: None,
        }
    }
}

impl SubstitutionConfig {
    fn validate(&self) -> Result<()> {
        if self.population < 2 {
            return Err(Error::parameter("population", "needs at least two keys"));
        }
        if self.elite >= self.population {
            return Err(Error::parameter("elite", "must be smaller than the population"));
        }
        if self.parent_pool == 0 {
            return Err(Error::parameter("parent_pool", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(Error::parameter("mutation_rate", "must lie in [0, 1]"));
        }
        if self.crossover_cut.is_empty() || *self.crossover_cut.end() > ALPHABET_LEN {
            return Err(Error::parameter("crossover_cut", "must be a non-empty range within 0..=26"));
        }
        Ok(())
    }
}

pub struct SubstitutionSearch<'m> {
    config: SubstitutionConfig,
    scorer: Scorer<'m>,
    plain_order: [u8; ALPHABET_LEN],
}

impl<'m> SubstitutionSearch<'m> {
    pub fn new(model: &'m LanguageModel, config: SubstitutionConfig) -> Self {
        Self {
            scorer: Scorer::new(model, config.weights.clone()),
            plain_order: model.letter_order(),
            config,
        }
    }

    pub fn run(&self, cipher: &[u8]) -> Result<SearchOutcome<SubstitutionKey>> {
        self.config.validate()?;
        if cipher.is_empty() {
            return Err(Error::EmptyInput);
        }

        let budget = Budget::with_timeout(self.config.timeout);
        let mut rng = ChaCha20Rng::seed_from_u64(self.config.seed);
        let mut history = History::default();

        let (ga_key, ga_score) = self.evolve(cipher, &mut rng, &budget, &mut history);
        info!("genetic stage finished with score {ga_score:.2}");

        let (key, score) = self.climb(cipher, ga_key, ga_score, &mut rng, &budget, &mut history);
        info!("hill-climbing finished with score {score:.2}");

        Ok(SearchOutcome {
            best: self.scorer.evaluate(key, &key.decrypt(cipher)),
            history: history.into_inner(),
        })
    }

    fn evolve(
        &self,
        cipher: &[u8],
        rng: &mut ChaCha20Rng,
        budget: &Budget,
        history: &mut History,
    ) -> (SubstitutionKey, f64) {
        let config = &self.config;
        let mut population: Vec<SubstitutionKey> = (0..config.population)
            .map(|_| SubstitutionKey::random(rng))
            .collect();
        if config.seed_with_frequency_key {
            population[0] = SubstitutionKey::from_frequency_rank(cipher, &self.plain_order);
        }

        let mut best_key = population[0];
        let mut best_score = f64::NEG_INFINITY;
        let mut stale = 0usize;

        for generation in 0..config.generations {
            if budget.exhausted() {
                debug!("deadline reached at generation {generation}");
                break;
            }

            let mut scored: Vec<(f64, SubstitutionKey)> = population
                .iter()
                .map(|key| (self.scorer.score(&key.decrypt(cipher)), *key))
                .collect();
            scored.sort_by(|a, b| descending(a.0, b.0));

            if scored[0].0 > best_score {
                best_score = scored[0].0;
                best_key = scored[0].1;
                stale = 0;
            } else {
                stale += 1;
            }
            history.record(best_score);

            if generation % 20 == 0 || generation + 1 == config.generations {
                debug!("generation {generation}: best score {best_score:.2}");
            }
            if config.plateau.is_some_and(|limit| stale >= limit) {
                debug!("no improvement for {stale} generations, stopping at {generation}");
                break;
            }

            let mut next: Vec<SubstitutionKey> =
                scored.iter().take(config.elite).map(|&(_, key)| key).collect();
            let pool = &scored[..config.parent_pool.min(scored.len())];
            while next.len() < config.population {
                let (_, first) = pool.choose(rng).copied().unwrap_or(scored[0]);
                let (_, second) = pool.choose(rng).copied().unwrap_or(scored[0]);
                let cut = rng.gen_range(config.crossover_cut.clone());
                let mut child = crossover(&first, &second, cut);
                if rng.gen_bool(config.mutation_rate) {
                    swap_random(&mut child, rng);
                }
                next.push(child);
            }
            population = next;
        }

        (best_key, best_score)
    }

    fn climb(
        &self,
        cipher: &[u8],
        mut key: SubstitutionKey,
        score: f64,
        rng: &mut ChaCha20Rng,
        budget: &Budget,
        history: &mut History,
    ) -> (SubstitutionKey, f64) {
        let mut score = if score.is_finite() {
            score
        } else {
            self.scorer.score(&key.decrypt(cipher))
        };

        for step in 0..self.config.climb_iterations {
            if budget.exhausted() {
                debug!("deadline reached at climb step {step}");
                break;
            }
            let (a, b) = swap_random(&mut key, rng);
            let candidate_score = self.scorer.score(&key.decrypt(cipher));
            if candidate_score > score {
                score = candidate_score;
            } else {
                key.swap(a, b);
            }
            history.record(score);
        }

        (key, score)
    }
}

/// Prefix of `first` up to `cut`, then the letters of `second` in order, skipping
/// those already taken. The result is always a permutation.
pub(crate) fn crossover(first: &SubstitutionKey, second: &SubstitutionKey, cut: usize) -> SubstitutionKey {
    let cut = cut.min(ALPHABET_LEN);
    let mut taken = [false; ALPHABET_LEN];
    let mut mapping = [0u8; ALPHABET_LEN];

    for (slot, &plain) in mapping.iter_mut().zip(&first.mapping()[..cut]) {
        *slot = plain;
        taken[plain as usize] = true;
    }
    let rest = second
        .mapping()
        .iter()
        .copied()
        .filter(|&plain| !taken[plain as usize]);
    for (slot, plain) in mapping[cut..].iter_mut().zip(rest) {
        *slot = plain;
    }

    // Both parents are permutations, so the merge is one too.
    SubstitutionKey::new(mapping).unwrap_or(*first)
}

/// Swaps two distinct positions and returns them.
fn swap_random(key: &mut SubstitutionKey, rng: &mut impl Rng) -> (usize, usize) {
    let a = rng.gen_range(0..ALPHABET_LEN);
    let mut b = rng.gen_range(0..ALPHABET_LEN);
    while b == a {
        b = rng.gen_range(0..ALPHABET_LEN);
    }
    key.swap(a, b);
    (a, b)
}
