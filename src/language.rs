//! Portuguese language statistics shared read-only by every search.

use std::{cmp::Ordering, collections::HashSet, fs, path::Path};

use log::{debug, info};

use crate::{
    error::{Error, Result},
    text::{self, ALPHABET_LEN},
};

const LETTER_FREQ_TABLE: &str = include_str!("../frequency_table/portuguese.csv");

const BIGRAM_SPACE: usize = ALPHABET_LEN * ALPHABET_LEN;
const TRIGRAM_SPACE: usize = BIGRAM_SPACE * ALPHABET_LEN;

/// Where the expected letter distribution comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LetterSource {
    /// The embedded Portuguese reference table.
    #[default]
    Reference,
    /// Letter counts of the corpus itself.
    Corpus,
}

#[derive(Clone, Debug)]
pub struct ModelOptions {
    pub letter_source: LetterSource,
    /// Shortest word form kept in the dictionary.
    pub min_word_len: usize,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            letter_source: LetterSource::Reference,
            min_word_len: 3,
        }
    }
}

/// Letter frequencies, smoothed n-gram log tables and the word dictionary.
///
/// Built once, never mutated; `&LanguageModel` is handed to every search worker.
pub struct LanguageModel {
    letter_freq: [f64; ALPHABET_LEN],
    bigram_log_probs: Vec<f64>,
    trigram_log_probs: Vec<f64>,
    dictionary: HashSet<Vec<u8>>,
    longest_word: usize,
}

impl LanguageModel {
    pub fn from_corpus<I, S>(words: I, options: &ModelOptions) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut corpus: Vec<u8> = Vec::new();
        let mut dictionary = HashSet::new();
        let mut longest_word = 0;

        for word in words {
            let raw = word.as_ref();
            // Tokens with digits or punctuation are not word forms.
            if raw.is_empty() || !raw.chars().all(char::is_alphabetic) {
                continue;
            }
            let letters = text::to_letters(raw);
            if letters.is_empty() {
                continue;
            }
            corpus.extend_from_slice(&letters);
            if letters.len() >= options.min_word_len.max(1) {
                longest_word = longest_word.max(letters.len());
                dictionary.insert(letters);
            }
        }

        if corpus.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let letter_freq = match options.letter_source {
            LetterSource::Reference => parse_letter_freq_table(LETTER_FREQ_TABLE)?,
            LetterSource::Corpus => corpus_letter_freq(&corpus),
        };

        let bigram_log_probs = smoothed_log_table(&corpus, 2);
        let trigram_log_probs = smoothed_log_table(&corpus, 3);

        info!(
            "language model built: {} corpus letters, {} dictionary words",
            corpus.len(),
            dictionary.len()
        );

        Ok(Self {
            letter_freq,
            bigram_log_probs,
            trigram_log_probs,
            dictionary,
            longest_word,
        })
    }

    /// Reads a line-delimited word list. Every whitespace-separated token counts.
    pub fn read_word_list(path: impl AsRef<Path>) -> Result<Vec<String>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        let words: Vec<String> = content
            .lines()
            .flat_map(str::split_whitespace)
            .map(str::to_owned)
            .collect();
        debug!("read {} tokens from {}", words.len(), path.display());
        Ok(words)
    }

    pub fn letter_freq(&self) -> &[f64; ALPHABET_LEN] {
        &self.letter_freq
    }

    /// Letters sorted from most to least expected.
    pub fn letter_order(&self) -> [u8; ALPHABET_LEN] {
        let mut letters: Vec<u8> = (0..ALPHABET_LEN as u8).collect();
        letters.sort_by(|&a, &b| {
            self.letter_freq[b as usize]
                .partial_cmp(&self.letter_freq[a as usize])
                .unwrap_or(Ordering::Equal)
        });

        let mut order = [0u8; ALPHABET_LEN];
        order.copy_from_slice(&letters);
        order
    }

    pub fn bigram_log_prob(&self, a: u8, b: u8) -> f64 {
        self.bigram_log_probs[a as usize * ALPHABET_LEN + b as usize]
    }

    pub fn trigram_log_prob(&self, a: u8, b: u8, c: u8) -> f64 {
        self.trigram_log_probs
            [(a as usize * ALPHABET_LEN + b as usize) * ALPHABET_LEN + c as usize]
    }

    pub fn is_word(&self, letters: &[u8]) -> bool {
        self.dictionary.contains(letters)
    }

    pub fn contains_word(&self, word: &str) -> bool {
        self.is_word(&text::to_letters(word))
    }

    pub fn dictionary_len(&self) -> usize {
        self.dictionary.len()
    }

    pub fn longest_word(&self) -> usize {
        self.longest_word
    }
}

/// `log((count + 1) / (total + 26^n))` for every n-gram of the corpus stream.
fn smoothed_log_table(corpus: &[u8], n: usize) -> Vec<f64> {
    let space = match n {
        2 => BIGRAM_SPACE,
        _ => TRIGRAM_SPACE,
    };
    let mut counts = vec![0u64; space];
    let mut total = 0u64;
    for window in corpus.windows(n) {
        let index = window
            .iter()
            .fold(0usize, |acc, &l| acc * ALPHABET_LEN + l as usize);
        counts[index] += 1;
        total += 1;
    }

    let denominator = (total + space as u64) as f64;
    counts
        .into_iter()
        .map(|count| ((count + 1) as f64 / denominator).ln())
        .collect()
}

fn corpus_letter_freq(corpus: &[u8]) -> [f64; ALPHABET_LEN] {
    let counts = text::letter_counts(corpus);
    let total = corpus.len() as f64;
    let mut freqs = [0.0; ALPHABET_LEN];
    for (freq, count) in freqs.iter_mut().zip(counts) {
        *freq = count as f64 / total;
    }
    freqs
}

/// Parses a `letter,frequency` CSV with a header line. The result is normalized
/// to sum to one.
pub fn parse_letter_freq_table(table: &str) -> Result<[f64; ALPHABET_LEN]> {
    let mut freqs = [0.0; ALPHABET_LEN];
    let mut seen = [false; ALPHABET_LEN];

    for (line_no, raw_line) in table.lines().enumerate() {
        if line_no == 0 || raw_line.trim().is_empty() {
            continue;
        }

        let mut parts = raw_line.split(',');
        let letter_str = parts
            .next()
            .ok_or_else(|| Error::FrequencyTable("missing letter column".into()))?
            .trim();
        let freq_str = parts
            .next()
            .ok_or_else(|| Error::FrequencyTable("missing frequency column".into()))?
            .trim();

        let mut chars = letter_str.chars();
        let idx = match (chars.next().and_then(text::letter_index), chars.next()) {
            (Some(idx), None) => idx as usize,
            _ => {
                return Err(Error::FrequencyTable(format!(
                    "line {}: '{letter_str}' is not a single letter",
                    line_no + 1
                )));
            }
        };
        if seen[idx] {
            return Err(Error::FrequencyTable(format!(
                "duplicate letter '{letter_str}'"
            )));
        }

        let freq: f64 = freq_str.parse().map_err(|_| {
            Error::FrequencyTable(format!("failed to parse frequency for '{letter_str}'"))
        })?;
        freqs[idx] = freq;
        seen[idx] = true;
    }

    if seen.iter().any(|&flag| !flag) {
        return Err(Error::FrequencyTable(
            "missing entries for one or more letters".into(),
        ));
    }

    let total: f64 = freqs.iter().sum();
    if total <= 0.0 {
        return Err(Error::FrequencyTable("frequencies sum to zero".into()));
    }
    for freq in &mut freqs {
        *freq /= total;
    }
    Ok(freqs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> LanguageModel {
        LanguageModel::from_corpus(
            ["a", "casa", "é", "dele", "123", "coração"],
            &ModelOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn reference_table_sums_to_one() {
        let freqs = parse_letter_freq_table(LETTER_FREQ_TABLE).unwrap();
        let total: f64 = freqs.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(freqs[4] > freqs[0], "e is the most frequent letter");
    }

    #[test]
    fn dictionary_is_normalized_and_filtered() {
        let model = model();
        assert!(model.contains_word("casa"));
        assert!(model.contains_word("coracao"));
        assert!(model.contains_word("Coração"));
        assert!(!model.contains_word("a"), "shorter than min_word_len");
        assert_eq!(model.dictionary_len(), 3);
        assert_eq!(model.longest_word(), 7);
    }

    #[test]
    fn ngram_tables_are_laplace_smoothed() {
        let model = model();
        // corpus stream: "acasaedelecoracao" -> 17 letters, 16 bigrams
        let seen = model.bigram_log_prob(0, 18); // "as"
        let unseen = model.bigram_log_prob(25, 25); // "zz"
        assert!((unseen - (1.0f64 / 692.0).ln()).abs() < 1e-12);
        assert!(seen > unseen);
        assert!(model.trigram_log_prob(25, 25, 25).is_finite());
    }

    #[test]
    fn empty_corpus_is_rejected() {
        let err = LanguageModel::from_corpus(["42", "!!"], &ModelOptions::default());
        assert!(matches!(err, Err(Error::EmptyCorpus)));
    }

    #[test]
    fn corpus_letter_source_counts_letters() {
        let options = ModelOptions {
            letter_source: LetterSource::Corpus,
            ..ModelOptions::default()
        };
        let model = LanguageModel::from_corpus(["aab"], &options).unwrap();
        assert!((model.letter_freq()[0] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(model.letter_order()[0], 0);
    }

    #[test]
    fn malformed_table_is_rejected() {
        assert!(parse_letter_freq_table("letter,frequency\na,0.5\n").is_err());
        assert!(parse_letter_freq_table("letter,frequency\nab,0.5\n").is_err());
    }
}
