//! Plaintext fitness measures.
//!
//! Every scorer is a pure function of a letter slice and the shared
//! [`LanguageModel`], so searches can call them from any thread.

use std::{cmp::Ordering, ops::RangeInclusive};

use crate::{
    language::LanguageModel,
    text::{self, ALPHABET_LEN},
};

/// Lookahead used by [`word_coverage`] when a caller has no preference.
pub const DEFAULT_COVERAGE_WINDOW: usize = 12;

/// Frequent Portuguese words and suffixes counted by [`pattern_hits`].
pub const PATTERNS: &[&str] = &[
    "que", "para", "como", "nao", "uma", "das", "dos", "mas", "por", "se", "ao", "no", "de",
    "em", "um", "cao", "nte", "ura", "ica", "ista", "ismo", "mento", "dade", "acao", "aria",
    "avel", "ivel", "eiro", "osa", "oso",
];

/// Pearson chi-squared distance from the expected letter distribution. Lower is
/// closer to the language; empty text scores `+∞`.
pub fn chi_squared(letters: &[u8], model: &LanguageModel) -> f64 {
    if letters.is_empty() {
        return f64::INFINITY;
    }
    let n = letters.len() as f64;
    let counts = text::letter_counts(letters);
    model
        .letter_freq()
        .iter()
        .zip(counts)
        .filter_map(|(&freq, observed)| {
            let expected = n * freq;
            (expected > 0.0).then(|| (observed as f64 - expected).powi(2) / expected)
        })
        .sum()
}

/// Sum of bigram log-probabilities plus twice the sum of trigram log-probabilities.
pub fn ngram_log_likelihood(letters: &[u8], model: &LanguageModel) -> f64 {
    let bigrams: f64 = letters
        .windows(2)
        .map(|w| model.bigram_log_prob(w[0], w[1]))
        .sum();
    let trigrams: f64 = letters
        .windows(3)
        .map(|w| model.trigram_log_prob(w[0], w[1], w[2]))
        .sum();
    bigrams + 2.0 * trigrams
}

/// Fraction of letters covered by a greedy longest-match segmentation.
///
/// Scans left to right; at each position the longest dictionary word of at most
/// `max_window` letters is consumed, otherwise a single letter is skipped.
pub fn word_coverage(letters: &[u8], model: &LanguageModel, max_window: usize) -> f64 {
    if letters.is_empty() {
        return 0.0;
    }
    let window = max_window.min(model.longest_word());
    let mut covered = 0usize;
    let mut pos = 0usize;
    while pos < letters.len() {
        let longest = window.min(letters.len() - pos);
        match (1..=longest)
            .rev()
            .find(|&len| model.is_word(&letters[pos..pos + len]))
        {
            Some(len) => {
                covered += len;
                pos += len;
            }
            None => pos += 1,
        }
    }
    covered as f64 / letters.len() as f64
}

/// Counts every `(position, length)` whose substring is a dictionary word.
pub fn word_hits(letters: &[u8], model: &LanguageModel, lengths: &RangeInclusive<usize>) -> usize {
    let max_len = (*lengths.end()).min(model.longest_word());
    let min_len = (*lengths.start()).max(1);
    let mut hits = 0;
    for start in 0..letters.len() {
        let available = letters.len() - start;
        for len in min_len..=max_len.min(available) {
            if model.is_word(&letters[start..start + len]) {
                hits += 1;
            }
        }
    }
    hits
}

/// Non-overlapping occurrences of every entry of [`PATTERNS`].
pub fn pattern_hits(letters: &[u8]) -> usize {
    PATTERNS
        .iter()
        .map(|pattern| count_non_overlapping(letters, pattern.as_bytes()))
        .sum()
}

fn count_non_overlapping(letters: &[u8], pattern: &[u8]) -> usize {
    let matches_at = |pos: usize| {
        letters[pos..pos + pattern.len()]
            .iter()
            .zip(pattern)
            .all(|(&l, &p)| l + b'a' == p)
    };
    let mut count = 0;
    let mut pos = 0;
    while pos + pattern.len() <= letters.len() {
        if matches_at(pos) {
            count += 1;
            pos += pattern.len();
        } else {
            pos += 1;
        }
    }
    count
}

/// Weights of the combined score used by the metaheuristic searches.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreWeights {
    pub ngram: f64,
    pub word: f64,
    pub pattern: f64,
    /// Word lengths counted by [`word_hits`].
    pub word_lengths: RangeInclusive<usize>,
}

impl ScoreWeights {
    pub fn substitution() -> Self {
        Self {
            ngram: 1.0,
            word: 2.0,
            pattern: 1.5,
            word_lengths: 3..=9,
        }
    }

    pub fn vigenere() -> Self {
        Self {
            ngram: 1.0,
            word: 7.0,
            pattern: 0.0,
            word_lengths: 4..=10,
        }
    }
}

/// Weighted combination of n-gram, dictionary and pattern signals. Higher is better.
pub struct Scorer<'m> {
    model: &'m LanguageModel,
    weights: ScoreWeights,
}

impl<'m> Scorer<'m> {
    pub fn new(model: &'m LanguageModel, weights: ScoreWeights) -> Self {
        Self { model, weights }
    }

    pub fn model(&self) -> &'m LanguageModel {
        self.model
    }

    pub fn score(&self, letters: &[u8]) -> f64 {
        let mut total = self.weights.ngram * ngram_log_likelihood(letters, self.model);
        if self.weights.word != 0.0 {
            total += self.weights.word
                * word_hits(letters, self.model, &self.weights.word_lengths) as f64;
        }
        if self.weights.pattern != 0.0 {
            total += self.weights.pattern * pattern_hits(letters) as f64;
        }
        total
    }

    /// Full breakdown for a finished key; `combined` is [`Scorer::score`].
    pub fn evaluate<K>(&self, key: K, letters: &[u8]) -> ScoredCandidate<K> {
        ScoredCandidate::measure(key, letters, self.model, self.score(letters))
    }
}

/// A key with its decryption and every score the engine computes for it.
#[derive(Clone, Debug)]
pub struct ScoredCandidate<K> {
    pub key: K,
    pub plaintext: String,
    pub chi_squared: f64,
    pub ngram: f64,
    pub coverage: f64,
    /// The value the producing search ranked by.
    pub combined: f64,
}

impl<K> ScoredCandidate<K> {
    pub fn measure(key: K, letters: &[u8], model: &LanguageModel, combined: f64) -> Self {
        Self {
            key,
            plaintext: text::from_letters(letters),
            chi_squared: chi_squared(letters, model),
            ngram: ngram_log_likelihood(letters, model),
            coverage: word_coverage(letters, model, DEFAULT_COVERAGE_WINDOW),
            combined,
        }
    }
}

/// Min–max normalizes a fixed batch of `(chi_squared, coverage)` pairs and returns
/// `coverage_norm - chi_norm` for each entry, in input order.
///
/// The values are only comparable within the batch they were computed over. A
/// column whose values are all equal (or infinite) normalizes to zero.
pub fn normalize_batch(batch: &[(f64, f64)]) -> Vec<f64> {
    let bounds = batch
        .iter()
        .fold(BatchBounds::default(), |bounds, &(chi, cov)| bounds.include(chi, cov));
    batch.iter().map(|&(chi, cov)| bounds.combined(chi, cov)).collect()
}

/// Finite min–max bounds of a batch of `(chi_squared, coverage)` pairs.
///
/// Bounds of disjoint parts merge into the bounds of the whole, so a batch can be
/// measured in parallel without being held in memory.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatchBounds {
    chi: (f64, f64),
    coverage: (f64, f64),
}

impl Default for BatchBounds {
    fn default() -> Self {
        Self {
            chi: (f64::INFINITY, f64::NEG_INFINITY),
            coverage: (f64::INFINITY, f64::NEG_INFINITY),
        }
    }
}

impl BatchBounds {
    pub fn include(self, chi: f64, coverage: f64) -> Self {
        Self {
            chi: widen(self.chi, chi),
            coverage: widen(self.coverage, coverage),
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            chi: (self.chi.0.min(other.chi.0), self.chi.1.max(other.chi.1)),
            coverage: (
                self.coverage.0.min(other.coverage.0),
                self.coverage.1.max(other.coverage.1),
            ),
        }
    }

    /// `coverage_norm - chi_norm` within these bounds.
    pub fn combined(&self, chi: f64, coverage: f64) -> f64 {
        normalize(coverage, self.coverage.0, self.coverage.1) - normalize(chi, self.chi.0, self.chi.1)
    }
}

fn widen((lo, hi): (f64, f64), value: f64) -> (f64, f64) {
    if value.is_finite() {
        (lo.min(value), hi.max(value))
    } else {
        (lo, hi)
    }
}

fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if !(max > min) {
        return 0.0;
    }
    if !value.is_finite() {
        return if value > 0.0 { 1.0 } else { 0.0 };
    }
    (value - min) / (max - min)
}

/// Descending order on `f64`, NaN last.
pub(crate) fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

/// Expected-frequency mass of a Caesar-shifted slice; the per-column signal
/// used to seed repeating-key searches.
pub fn shift_alignment(letters: &[u8], shift: u8, model: &LanguageModel) -> f64 {
    let freq = model.letter_freq();
    letters
        .iter()
        .map(|&c| freq[((c + ALPHABET_LEN as u8 - shift) % ALPHABET_LEN as u8) as usize])
        .sum()
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::language::ModelOptions;

    const SAMPLE: &str = "manhaocaboalmeidaperguntaoqueelesestaofazendoaliaaquelahoraasarmasestaoapontadasparaelesenquantoestaocomasmaosnacabecaoc";

    fn model() -> LanguageModel {
        LanguageModel::from_corpus(
            ["casa", "amarela", "sol", "nasce", "cedo", "que", "para"],
            &ModelOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn chi_squared_prefers_language_over_noise() {
        let model = model();
        let natural = text::to_letters(SAMPLE);
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let noise: Vec<u8> = (0..natural.len()).map(|_| rng.gen_range(0..26)).collect();
        assert!(chi_squared(&natural, &model) < chi_squared(&noise, &model));
    }

    #[test]
    fn chi_squared_of_empty_text_is_worst() {
        assert_eq!(chi_squared(&[], &model()), f64::INFINITY);
    }

    #[test]
    fn ngram_score_is_finite_for_unseen_text() {
        let model = model();
        let score = ngram_log_likelihood(&text::to_letters("zzzzqqqq"), &model);
        assert!(score.is_finite() && score < 0.0);
        assert!(
            ngram_log_likelihood(&text::to_letters("casaamarela"), &model)
                > ngram_log_likelihood(&text::to_letters("qxzkwyjvbfa"), &model)
        );
    }

    #[test]
    fn coverage_of_dictionary_text_is_full() {
        let model = model();
        let letters = text::to_letters("casaamarelasolnascecedo");
        assert_eq!(word_coverage(&letters, &model, DEFAULT_COVERAGE_WINDOW), 1.0);
        assert_eq!(word_coverage(&[], &model, DEFAULT_COVERAGE_WINDOW), 0.0);
    }

    #[test]
    fn coverage_grows_with_matching_text() {
        let model = model();
        let steps = ["xxxxxxxxxxxxxxxx", "casaxxxxxxxxxxxx", "casaxxxxsolxxxxx", "casaxxxxsolnasce"];
        let coverages: Vec<f64> = steps
            .iter()
            .map(|s| word_coverage(&text::to_letters(s), &model, DEFAULT_COVERAGE_WINDOW))
            .collect();
        assert!(coverages.windows(2).all(|w| w[0] <= w[1]), "{coverages:?}");
        assert_eq!(coverages[0], 0.0);
        assert_eq!(coverages[1], 0.25);
    }

    #[test]
    fn coverage_respects_window() {
        let model = model();
        let letters = text::to_letters("amarela");
        assert_eq!(word_coverage(&letters, &model, 6), 0.0);
        assert_eq!(word_coverage(&letters, &model, 7), 1.0);
    }

    #[test]
    fn word_hits_count_every_match() {
        let model = model();
        // "casa", "sol" and "que" are words; "asa" is not
        assert_eq!(word_hits(&text::to_letters("casasolque"), &model, &(3..=9)), 3);
        assert_eq!(word_hits(&text::to_letters("casasolque"), &model, &(4..=10)), 1);
    }

    #[test]
    fn patterns_are_non_overlapping() {
        assert_eq!(count_non_overlapping(&text::to_letters("aaaa"), b"aa"), 2);
        // que, de(2), para, em
        assert_eq!(pattern_hits(&text::to_letters("quedeparadem")), 5);
    }

    #[test]
    fn weighted_score_rewards_words() {
        let model = model();
        let scorer = Scorer::new(&model, ScoreWeights::substitution());
        let good = scorer.score(&text::to_letters("casaamarelaparaque"));
        let bad = scorer.score(&text::to_letters("xkqwzjvbyhtfgpmlrd"));
        assert!(good > bad);
    }

    #[test]
    fn batch_normalization_is_relative() {
        let scores = normalize_batch(&[(10.0, 0.5), (20.0, 0.0), (15.0, 1.0)]);
        assert_eq!(scores, vec![0.5, -1.0, 0.5]);
        assert_eq!(normalize_batch(&[(3.0, 0.2)]), vec![0.0]);
        let with_inf = normalize_batch(&[(f64::INFINITY, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        assert_eq!(with_inf, vec![-1.0, 0.0, -1.0]);
    }

    #[test]
    fn merged_bounds_match_whole_batch() {
        let batch = [(10.0, 0.5), (20.0, 0.0), (f64::INFINITY, 0.3), (15.0, 1.0), (12.0, 0.25)];
        let part = |pairs: &[(f64, f64)]| {
            pairs
                .iter()
                .fold(BatchBounds::default(), |b, &(chi, cov)| b.include(chi, cov))
        };
        let merged = part(&batch[..2]).merge(part(&batch[2..]));
        assert_eq!(merged, part(&batch));

        let streamed: Vec<f64> = batch.iter().map(|&(chi, cov)| merged.combined(chi, cov)).collect();
        assert_eq!(streamed, normalize_batch(&batch));
        assert_eq!(BatchBounds::default().merge(merged), merged);
    }

    #[test]
    fn descending_orders_nan_last() {
        let mut values = vec![1.0, f64::NAN, 3.0, 2.0];
        values.sort_by(|&a, &b| descending(a, b));
        assert_eq!(&values[..3], &[3.0, 2.0, 1.0]);
        assert!(values[3].is_nan());
    }
}
