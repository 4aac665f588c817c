//! Vigenère key search for a known key length.
//!
//! Stages: a per-column frequency guess, strict hill-climbing from that guess and
//! from random keys, then refinement passes that search small neighbourhoods
//! exhaustively.

use std::time::Duration;

use log::{debug, info, trace};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use super::{Budget, History, SearchOutcome};
use crate::{
    cipher::{VigenereKey, vigenere::decrypt_into},
    error::{Error, Result},
    language::LanguageModel,
    scoring::{ScoreWeights, Scorer, shift_alignment},
    text::{self, ALPHABET_LEN},
};

/// Widest window the exhaustive pass accepts; `26^4` keys per window.
pub const MAX_WINDOW: usize = 4;

#[derive(Clone, Debug)]
pub struct VigenereConfig {
    pub key_length: usize,
    /// Number of climbs; `None` uses `15·K/10` (at least one).
    pub restarts: Option<usize>,
    /// A climb stops after this many proposals without improvement.
    pub stall_limit: usize,
    /// Stall limit of the random refinement pass.
    pub refine_stall_limit: usize,
    /// Try every letter at every position.
    pub single_refinement: bool,
    /// Try every letter pair at every pair of positions.
    pub pair_refinement: bool,
    /// Width of the sliding exhaustive window; `None` skips the pass.
    pub window: Option<usize>,
    pub weights: ScoreWeights,
    pub seed: u64,
    pub timeout: Option<Duration>,
}

impl VigenereConfig {
    pub fn new(key_length: usize) -> Self {
        Self {
            key_length,
            restarts: None,
            stall_limit: 500,
            refine_stall_limit: 10_000,
            single_refinement: true,
            pair_refinement: false,
            window: Some(3),
            weights: ScoreWeights::vigenere(),
            seed: 0,
            timeout: None,
        }
    }

    fn restart_count(&self) -> usize {
        self.restarts.unwrap_or(15 * self.key_length / 10).max(1)
    }

    fn validate(&self, text_len: usize) -> Result<()> {
        if self.key_length == 0 {
            return Err(Error::key_length(0, "key length must be positive"));
        }
        if self.key_length > text_len {
            return Err(Error::key_length(
                self.key_length,
                format!("longer than the {text_len}-letter cipher text"),
            ));
        }
        if let Some(window) = self.window {
            if window == 0 || window > MAX_WINDOW {
                return Err(Error::parameter(
                    "window",
                    format!("must lie in 1..={MAX_WINDOW}"),
                ));
            }
        }
        Ok(())
    }
}

pub struct VigenereSearch<'m> {
    config: VigenereConfig,
    scorer: Scorer<'m>,
}

impl<'m> VigenereSearch<'m> {
    pub fn new(model: &'m LanguageModel, config: VigenereConfig) -> Self {
        Self {
            scorer: Scorer::new(model, config.weights.clone()),
            config,
        }
    }

    pub fn run(&self, cipher: &[u8]) -> Result<SearchOutcome<VigenereKey>> {
        if cipher.is_empty() {
            return Err(Error::EmptyInput);
        }
        self.config.validate(cipher.len())?;

        let budget = Budget::with_timeout(self.config.timeout);
        let mut rng = ChaCha20Rng::seed_from_u64(self.config.seed);
        let mut history = History::default();
        let mut eval = Evaluator::new(&self.scorer, cipher);

        let initial = frequency_key(cipher, self.config.key_length, self.scorer.model());
        debug!("frequency key: {}", text::from_letters(&initial));

        let restarts = self.config.restart_count();
        let mut best = initial.clone();
        let mut best_score = f64::NEG_INFINITY;
        for restart in 0..restarts {
            if budget.exhausted() {
                debug!("deadline reached before restart {restart}");
                break;
            }
            let start = if restart == 0 {
                initial.clone()
            } else {
                (0..self.config.key_length)
                    .map(|_| rng.gen_range(0..ALPHABET_LEN as u8))
                    .collect()
            };
            let (key, score) = self.climb(&mut eval, start, &mut rng, &budget, &mut history);
            debug!("restart {restart}/{restarts}: score {score:.2}");
            if score > best_score {
                best = key;
                best_score = score;
            }
        }
        if !best_score.is_finite() {
            best_score = eval.score(&best);
        }
        info!("restarts finished with score {best_score:.2}");

        best_score = self.refine_random(
            &mut eval,
            &mut best,
            best_score,
            &mut rng,
            &budget,
            &mut history,
        );
        if self.config.single_refinement {
            best_score = self.refine_single(&mut eval, &mut best, best_score, &budget, &mut history);
        }
        if self.config.pair_refinement {
            best_score = self.refine_pairs(&mut eval, &mut best, best_score, &budget, &mut history);
        }
        if let Some(window) = self.config.window {
            best_score =
                self.refine_windows(&mut eval, &mut best, best_score, window, &budget, &mut history);
        }
        info!("refinement finished with score {best_score:.2}");

        let key = VigenereKey::new(best)?;
        let plain = key.decrypt(cipher);
        Ok(SearchOutcome {
            best: self.scorer.evaluate(key, &plain),
            history: history.into_inner(),
        })
    }

    /// Improves a given key by exhaustive search. Non-empty `positions` are
    /// searched jointly (at most [`MAX_WINDOW`] of them); an empty slice runs the
    /// single-letter pass and then the pair pass over the whole key. The key
    /// length comes from `start`, not from the configuration.
    pub fn refine(
        &self,
        cipher: &[u8],
        start: &VigenereKey,
        positions: &[usize],
    ) -> Result<SearchOutcome<VigenereKey>> {
        if cipher.is_empty() {
            return Err(Error::EmptyInput);
        }
        if start.len() > cipher.len() {
            return Err(Error::key_length(
                start.len(),
                format!("longer than the {}-letter cipher text", cipher.len()),
            ));
        }
        validate_positions(positions, start.len())?;

        let budget = Budget::with_timeout(self.config.timeout);
        let mut history = History::default();
        let mut eval = Evaluator::new(&self.scorer, cipher);
        let mut key = start.shifts().to_vec();
        let mut score = eval.score(&key);
        history.record(score);
        debug!("refining {start} from score {score:.2}");

        if positions.is_empty() {
            score = self.refine_single(&mut eval, &mut key, score, &budget, &mut history);
            score = self.refine_pairs(&mut eval, &mut key, score, &budget, &mut history);
        } else if !budget.exhausted() {
            score = exhaust(&mut eval, &mut key, positions, score);
            history.record(score);
        }
        info!("refinement finished with score {score:.2}");

        let key = VigenereKey::new(key)?;
        let plain = key.decrypt(cipher);
        Ok(SearchOutcome {
            best: self.scorer.evaluate(key, &plain),
            history: history.into_inner(),
        })
    }

    /// One random position gets a different random letter; strict ascent.
    fn climb(
        &self,
        eval: &mut Evaluator,
        mut key: Vec<u8>,
        rng: &mut ChaCha20Rng,
        budget: &Budget,
        history: &mut History,
    ) -> (Vec<u8>, f64) {
        let mut score = eval.score(&key);
        let mut stalled = 0;
        while stalled < self.config.stall_limit && !budget.exhausted() {
            let position = rng.gen_range(0..key.len());
            let letter = rng.gen_range(0..ALPHABET_LEN as u8);
            if letter == key[position] {
                continue;
            }
            let previous = key[position];
            key[position] = letter;
            let candidate = eval.score(&key);
            if candidate > score {
                trace!("position {position} -> {letter}: {score:.2} to {candidate:.2}");
                score = candidate;
                stalled = 0;
            } else {
                key[position] = previous;
                stalled += 1;
            }
            history.record(score);
        }
        (key, score)
    }

    /// Shifts one random position by a random non-zero offset; strict ascent.
    fn refine_random(
        &self,
        eval: &mut Evaluator,
        key: &mut [u8],
        mut score: f64,
        rng: &mut ChaCha20Rng,
        budget: &Budget,
        history: &mut History,
    ) -> f64 {
        let mut stalled = 0;
        while stalled < self.config.refine_stall_limit && !budget.exhausted() {
            let position = rng.gen_range(0..key.len());
            let previous = key[position];
            key[position] = (previous + rng.gen_range(1..ALPHABET_LEN as u8)) % ALPHABET_LEN as u8;
            let candidate = eval.score(key);
            if candidate > score {
                score = candidate;
                stalled = 0;
            } else {
                key[position] = previous;
                stalled += 1;
            }
            history.record(score);
        }
        score
    }

    fn refine_single(
        &self,
        eval: &mut Evaluator,
        key: &mut [u8],
        score: f64,
        budget: &Budget,
        history: &mut History,
    ) -> f64 {
        let mut score = score;
        for position in 0..key.len() {
            if budget.exhausted() {
                break;
            }
            score = exhaust(eval, key, &[position], score);
            history.record(score);
        }
        score
    }

    fn refine_pairs(
        &self,
        eval: &mut Evaluator,
        key: &mut [u8],
        score: f64,
        budget: &Budget,
        history: &mut History,
    ) -> f64 {
        let mut score = score;
        for first in 0..key.len() {
            for second in first + 1..key.len() {
                if budget.exhausted() {
                    return score;
                }
                score = exhaust(eval, key, &[first, second], score);
                history.record(score);
            }
        }
        score
    }

    fn refine_windows(
        &self,
        eval: &mut Evaluator,
        key: &mut [u8],
        score: f64,
        window: usize,
        budget: &Budget,
        history: &mut History,
    ) -> f64 {
        let mut score = score;
        if window > key.len() {
            return score;
        }
        for start in 0..=key.len() - window {
            if budget.exhausted() {
                break;
            }
            let positions: Vec<usize> = (start..start + window).collect();
            let improved = exhaust(eval, key, &positions, score);
            if improved > score {
                debug!("window {positions:?} improved score to {improved:.2}");
            }
            score = improved;
            history.record(score);
        }
        score
    }
}

fn validate_positions(positions: &[usize], key_length: usize) -> Result<()> {
    if positions.len() > MAX_WINDOW {
        return Err(Error::parameter(
            "positions",
            format!("at most {MAX_WINDOW} positions are searched jointly"),
        ));
    }
    for (i, &position) in positions.iter().enumerate() {
        if position >= key_length {
            return Err(Error::parameter(
                "positions",
                format!("{position} is outside a {key_length}-letter key"),
            ));
        }
        if positions[..i].contains(&position) {
            return Err(Error::parameter("positions", format!("{position} is repeated")));
        }
    }
    Ok(())
}

/// Tries every letter combination at `positions`, leaving `key` at the best one
/// found. Only strict improvements over `score` are kept.
fn exhaust(eval: &mut Evaluator, key: &mut [u8], positions: &[usize], score: f64) -> f64 {
    let original: Vec<u8> = positions.iter().map(|&p| key[p]).collect();
    let mut best_letters = original.clone();
    let mut best_score = score;

    let combinations = ALPHABET_LEN.pow(positions.len() as u32);
    for mut index in 0..combinations {
        for &position in positions.iter().rev() {
            key[position] = (index % ALPHABET_LEN) as u8;
            index /= ALPHABET_LEN;
        }
        let candidate = eval.score(key);
        if candidate > best_score {
            best_score = candidate;
            best_letters = positions.iter().map(|&p| key[p]).collect();
        }
    }

    for (&position, &letter) in positions.iter().zip(&best_letters) {
        key[position] = letter;
    }
    best_score
}

/// Per residue class, the shift whose decryption carries the most expected
/// letter mass.
pub fn frequency_key(cipher: &[u8], key_length: usize, model: &LanguageModel) -> Vec<u8> {
    (0..key_length)
        .map(|column| {
            let slice: Vec<u8> = cipher.iter().skip(column).step_by(key_length).copied().collect();
            (0..ALPHABET_LEN as u8)
                .map(|shift| (shift, shift_alignment(&slice, shift, model)))
                .fold((0u8, f64::NEG_INFINITY), |best, (shift, mass)| {
                    if mass > best.1 { (shift, mass) } else { best }
                })
                .0
        })
        .collect()
}

/// Decrypts into a reused buffer and scores the result.
struct Evaluator<'a, 'm> {
    scorer: &'a Scorer<'m>,
    cipher: &'a [u8],
    buffer: Vec<u8>,
}

impl<'a, 'm> Evaluator<'a, 'm> {
    fn new(scorer: &'a Scorer<'m>, cipher: &'a [u8]) -> Self {
        Self {
            scorer,
            cipher,
            buffer: Vec::with_capacity(cipher.len()),
        }
    }

    fn score(&mut self, key: &[u8]) -> f64 {
        decrypt_into(key, self.cipher, &mut self.buffer);
        self.scorer.score(&self.buffer)
    }
}
