//! Ciphertext-only search for upper-triangular Hill keys.
//!
//! With `c = K·p` and `K` upper-triangular, coordinate `i` of a plain block only
//! depends on row `i` of `K` and the plain coordinates below it:
//!
//! ```text
//! p_i = K_ii⁻¹ · (c_i − Σ_{j>i} K_ij · p_j)   (mod 26)
//! ```
//!
//! So rows are recovered bottom-up. The last row is a single unit scalar scored by
//! chi-squared on its coordinate stream (phase 1). Every intermediate row is
//! enumerated per surviving partial key and pruned by chi-squared (phase 2). The
//! leading row is enumerated exhaustively against full decryptions, which are
//! scored for letter fit and dictionary coverage on the rayon pool (phase 3).

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    time::Duration,
};

use log::{debug, info};
use rayon::prelude::*;

use super::Budget;
use crate::{
    cipher::HillKey,
    error::{Error, Result},
    language::LanguageModel,
    modular::{self, MODULUS, Matrix, UNITS},
    scoring::{self, BatchBounds, DEFAULT_COVERAGE_WINDOW, ScoredCandidate},
    text,
};

/// Largest supported key dimension; the leading-row enumeration grows as
/// `12·26^(n−1)` per surviving partial key.
pub const MAX_HILL_DIMENSION: usize = 4;

/// How phase-3 survivors are ordered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HillRanking {
    /// Descending dictionary coverage, ties broken by lower chi-squared.
    #[default]
    WordCoverage,
    /// `coverage_norm − chi_norm`, min–max normalized over all phase-3 survivors.
    Normalized,
}

#[derive(Clone, Debug)]
pub struct HillConfig {
    pub dimension: usize,
    /// Last-row scalars kept after phase 1.
    pub max_c: usize,
    /// Row candidates kept per partial key in phase 2; `max_c·max_ab` survive the merge.
    pub max_ab: usize,
    /// Candidates returned.
    pub top_k: usize,
    pub ranking: HillRanking,
    /// Drop decryptions with a letter repeated three times in a row.
    pub reject_triple_letters: bool,
    pub timeout: Option<Duration>,
}

impl HillConfig {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            max_c: 10,
            max_ab: 20,
            top_k: 5,
            ranking: HillRanking::WordCoverage,
            reject_triple_letters: false,
            timeout: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.dimension == 0 || self.dimension > MAX_HILL_DIMENSION {
            return Err(Error::key_length(
                self.dimension,
                format!("Hill dimension must lie in 1..={MAX_HILL_DIMENSION}"),
            ));
        }
        for (name, value) in [("max_c", self.max_c), ("max_ab", self.max_ab), ("top_k", self.top_k)] {
            if value == 0 {
                return Err(Error::parameter(name, "must be positive"));
            }
        }
        Ok(())
    }
}

impl Default for HillConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Rows `fixed_from..n` of the key and the plain coordinate streams they decrypt.
#[derive(Clone, Debug)]
struct Partial {
    fixed_from: usize,
    entries: Vec<u32>,
    streams: Vec<Vec<u8>>,
    score: f64,
}

/// Phase-3 record: enough to rebuild the candidate, nothing more.
#[derive(Clone, Copy, Debug)]
struct RawScore {
    index: usize,
    chi_squared: f64,
    coverage: f64,
}

/// A phase-3 record with its ranking value. Greater is better: higher `combined`,
/// then lower chi-squared, then lower index.
#[derive(Clone, Copy, Debug)]
struct Ranked {
    combined: f64,
    raw: RawScore,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.combined
            .total_cmp(&other.combined)
            .then_with(|| other.raw.chi_squared.total_cmp(&self.raw.chi_squared))
            .then_with(|| other.raw.index.cmp(&self.raw.index))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// The best `capacity` records seen so far, plus how many were offered.
#[derive(Debug)]
struct TopK {
    capacity: usize,
    seen: usize,
    heap: BinaryHeap<Reverse<Ranked>>,
}

impl TopK {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seen: 0,
            heap: BinaryHeap::with_capacity(capacity + 1),
        }
    }

    fn push(mut self, candidate: Ranked) -> Self {
        self.seen += 1;
        self.offer(candidate);
        self
    }

    fn offer(&mut self, candidate: Ranked) {
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(candidate));
        } else if self.heap.peek().is_some_and(|Reverse(worst)| candidate > *worst) {
            self.heap.pop();
            self.heap.push(Reverse(candidate));
        }
    }

    fn merge(mut self, other: Self) -> Self {
        self.seen += other.seen;
        for Reverse(candidate) in other.heap {
            self.offer(candidate);
        }
        self
    }

    /// Best first.
    fn into_sorted(self) -> Vec<Ranked> {
        let mut ranked: Vec<Ranked> = self.heap.into_iter().map(|Reverse(r)| r).collect();
        ranked.sort_by(|a, b| b.cmp(a));
        ranked
    }
}

pub struct HillSearch<'m> {
    model: &'m LanguageModel,
    config: HillConfig,
}

impl<'m> HillSearch<'m> {
    pub fn new(model: &'m LanguageModel, config: HillConfig) -> Self {
        Self { model, config }
    }

    /// Ranked candidates, best first, at most `top_k` of them.
    pub fn run(&self, cipher: &[u8]) -> Result<Vec<ScoredCandidate<HillKey>>> {
        self.config.validate()?;
        if cipher.is_empty() {
            return Err(Error::EmptyInput);
        }

        let n = self.config.dimension;
        let padded = modular::pad_to_blocks(cipher, n);
        let budget = Budget::with_timeout(self.config.timeout);

        let partials = self.prune_rows(&padded)?;
        let top = self.phase_leading_row(&partials, &padded, cipher.len(), &budget);
        info!("phase 3: {} full keys scored", top.seen);
        if top.seen == 0 {
            return Err(Error::NoCandidateFound("phase 3"));
        }

        Ok(self.materialize(top.into_sorted(), &partials, &padded, cipher.len()))
    }

    /// Scores a given key with the measures phase 3 uses. `combined` is the
    /// dictionary coverage, since a lone key has no batch to normalize against.
    pub fn evaluate(&self, cipher: &[u8], key: HillKey) -> Result<ScoredCandidate<HillKey>> {
        if cipher.is_empty() {
            return Err(Error::EmptyInput);
        }
        let mut plain = key.decrypt(cipher);
        plain.truncate(cipher.len());
        let coverage = scoring::word_coverage(&plain, self.model, DEFAULT_COVERAGE_WINDOW);
        Ok(ScoredCandidate::measure(key, &plain, self.model, coverage))
    }

    /// Phases 1 and 2: every row but the leading one, pruned by chi-squared.
    fn prune_rows(&self, padded: &[u8]) -> Result<Vec<Partial>> {
        let n = self.config.dimension;
        let columns: Vec<Vec<u8>> = (0..n)
            .map(|i| padded.iter().skip(i).step_by(n).copied().collect())
            .collect();

        let mut partials = vec![Partial {
            fixed_from: n,
            entries: vec![0; n * n],
            streams: vec![Vec::new(); n],
            score: 0.0,
        }];

        if n > 1 {
            partials = self.phase_last_row(&partials[0], &columns);
            info!("phase 1: {} last-row candidates", partials.len());
            if partials.is_empty() {
                return Err(Error::NoCandidateFound("phase 1"));
            }
        }

        for row in (1..n.saturating_sub(1)).rev() {
            partials = self.phase_inner_row(&partials, row, &columns);
            info!("phase 2, row {row}: {} partial keys survive", partials.len());
            if partials.is_empty() {
                return Err(Error::NoCandidateFound("phase 2"));
            }
        }
        Ok(partials)
    }

    /// Phase 1: every unit scalar for the bottom-right entry.
    fn phase_last_row(&self, root: &Partial, columns: &[Vec<u8>]) -> Vec<Partial> {
        let mut candidates = self.row_candidates(root, root.fixed_from - 1, columns);
        candidates.truncate(self.config.max_c);
        for candidate in &candidates {
            debug!(
                "c = {} chi² = {:.2}",
                candidate.entries[candidate.entries.len() - 1],
                candidate.score
            );
        }
        candidates
    }

    /// Phase 2: best `max_ab` rows per parent, then the global `max_c·max_ab`
    /// by accumulated chi-squared.
    fn phase_inner_row(&self, parents: &[Partial], row: usize, columns: &[Vec<u8>]) -> Vec<Partial> {
        let mut merged: Vec<Partial> = parents
            .iter()
            .flat_map(|parent| {
                let mut candidates = self.row_candidates(parent, row, columns);
                candidates.truncate(self.config.max_ab);
                candidates
            })
            .collect();
        merged.sort_by(|a, b| a.score.total_cmp(&b.score));
        merged.truncate(self.config.max_c * self.config.max_ab);
        merged
    }

    /// Every admissible `row` extending `parent`, sorted by accumulated chi-squared.
    fn row_candidates(&self, parent: &Partial, row: usize, columns: &[Vec<u8>]) -> Vec<Partial> {
        let n = self.config.dimension;
        let mut candidates: Vec<Partial> = (0..row_space(n, row))
            .filter_map(|index| {
                let row_entries = decode_row(n, row, index);
                let stream = back_substitute(&row_entries, row, &columns[row], &parent.streams)?;
                let chi = scoring::chi_squared(&stream, self.model);

                let mut child = parent.clone();
                child.fixed_from = row;
                child.entries[row * n..(row + 1) * n].copy_from_slice(&row_entries);
                child.streams[row] = stream;
                child.score += chi;
                Some(child)
            })
            .collect();
        candidates.sort_by(|a, b| a.score.total_cmp(&b.score));
        candidates
    }

    /// Phase 3: full keys from a lazily indexed space, scored in parallel into a
    /// bounded top-k. Normalized ranking takes a bounds pass over the same space first.
    fn phase_leading_row(&self, partials: &[Partial], padded: &[u8], text_len: usize, budget: &Budget) -> TopK {
        let top_k = self.config.top_k;
        debug!(
            "phase 3: enumerating {} leading-row candidates",
            partials.len() * row_space(self.config.dimension, 0)
        );

        match self.config.ranking {
            HillRanking::WordCoverage => self
                .scored(partials, padded, text_len, budget)
                .map(|raw| Ranked {
                    combined: raw.coverage,
                    raw,
                })
                .fold(|| TopK::new(top_k), TopK::push)
                .reduce(|| TopK::new(top_k), TopK::merge),
            HillRanking::Normalized => {
                let bounds = self
                    .scored(partials, padded, text_len, budget)
                    .fold(BatchBounds::default, |bounds, raw| {
                        bounds.include(raw.chi_squared, raw.coverage)
                    })
                    .reduce(BatchBounds::default, BatchBounds::merge);
                debug!("phase 3 bounds: {bounds:?}");
                self.scored(partials, padded, text_len, budget)
                    .map(|raw| Ranked {
                        combined: bounds.combined(raw.chi_squared, raw.coverage),
                        raw,
                    })
                    .fold(|| TopK::new(top_k), TopK::push)
                    .reduce(|| TopK::new(top_k), TopK::merge)
            }
        }
    }

    /// Every phase-3 candidate that inverts, passes the filter and fits the deadline.
    fn scored<'a>(
        &'a self,
        partials: &'a [Partial],
        padded: &'a [u8],
        text_len: usize,
        budget: &'a Budget,
    ) -> impl ParallelIterator<Item = RawScore> + 'a {
        let per_parent = row_space(self.config.dimension, 0);
        (0..partials.len() * per_parent)
            .into_par_iter()
            .filter_map(move |index| {
                if budget.exhausted() {
                    return None;
                }
                let (_, inverse) = self.assemble(partials, per_parent, index)?;
                let mut plain = modular::decrypt_blocks(&inverse, padded);
                plain.truncate(text_len);
                if self.config.reject_triple_letters && text::has_letter_run(&plain, 3) {
                    return None;
                }
                Some(RawScore {
                    index,
                    chi_squared: scoring::chi_squared(&plain, self.model),
                    coverage: scoring::word_coverage(&plain, self.model, DEFAULT_COVERAGE_WINDOW),
                })
            })
    }

    /// Full key and inverse for a phase-3 index, or `None` when not invertible.
    fn assemble(&self, partials: &[Partial], per_parent: usize, index: usize) -> Option<(Matrix, Matrix)> {
        let n = self.config.dimension;
        let parent = &partials[index / per_parent];
        let mut entries = parent.entries.clone();
        entries[..n].copy_from_slice(&decode_row(n, 0, index % per_parent));
        let matrix = Matrix::from_entries(n, entries)?;
        let inverse = modular::mod_inverse_matrix(&matrix)?;
        Some((matrix, inverse))
    }

    fn materialize(
        &self,
        ranked: Vec<Ranked>,
        partials: &[Partial],
        padded: &[u8],
        text_len: usize,
    ) -> Vec<ScoredCandidate<HillKey>> {
        let per_parent = row_space(self.config.dimension, 0);
        let results: Vec<ScoredCandidate<HillKey>> = ranked
            .into_iter()
            .filter_map(|Ranked { combined, raw }| {
                let (matrix, inverse) = self.assemble(partials, per_parent, raw.index)?;
                let key = HillKey::from_parts(matrix, inverse);
                let mut plain = key.decrypt(padded);
                plain.truncate(text_len);
                Some(ScoredCandidate::measure(key, &plain, self.model, combined))
            })
            .collect();

        for (place, candidate) in results.iter().enumerate() {
            debug!(
                "#{} coverage {:.2} chi² {:.2} combined {:.3}",
                place + 1,
                candidate.coverage,
                candidate.chi_squared,
                candidate.combined
            );
        }
        results
    }
}

/// Number of admissible rows at position `row`: a unit diagonal times every
/// value of each entry to its right.
///
/// Off-diagonal entries take all 26 residues, units or not, so the leading row of
/// a 3×3 key spans `12·26·26` candidates rather than the `12·26·12` a unit-only
/// last column would give. Only the diagonal decides invertibility.
fn row_space(n: usize, row: usize) -> usize {
    UNITS.len() * (MODULUS as usize).pow((n - 1 - row) as u32)
}

/// Row `row` of an `n×n` upper-triangular key from its enumeration index.
fn decode_row(n: usize, row: usize, index: usize) -> Vec<u32> {
    let mut entries = vec![0u32; n];
    entries[row] = UNITS[index % UNITS.len()];
    let mut rest = index / UNITS.len();
    for entry in entries.iter_mut().skip(row + 1) {
        *entry = (rest % MODULUS as usize) as u32;
        rest /= MODULUS as usize;
    }
    entries
}

/// Plain stream of coordinate `row` given its key row and the streams below it.
fn back_substitute(row_entries: &[u32], row: usize, cipher: &[u8], streams: &[Vec<u8>]) -> Option<Vec<u8>> {
    let diag_inv = modular::mod_inverse(row_entries[row])?;
    let stream = (0..cipher.len())
        .map(|b| {
            let known: u32 = (row + 1..row_entries.len())
                .map(|j| row_entries[j] * streams[j][b] as u32)
                .sum();
            let residual = (cipher[b] as u32 + MODULUS - known % MODULUS) % MODULUS;
            ((diag_inv * residual) % MODULUS) as u8
        })
        .collect();
    Some(stream)
}
