//! Ciphertext-only key searches.

use std::time::{Duration, Instant};

use crate::scoring::ScoredCandidate;

pub mod hill;
pub mod substitution;
pub mod vigenere;

pub use hill::{HillConfig, HillRanking, HillSearch};
pub use substitution::{SubstitutionConfig, SubstitutionSearch};
pub use vigenere::{VigenereConfig, VigenereSearch};

/// Wall-clock bound shared by every loop of a search. Without a deadline a
/// search runs until its iteration counts are spent.
#[derive(Clone, Copy, Debug, Default)]
pub struct Budget {
    deadline: Option<Instant>,
}

impl Budget {
    pub fn unlimited() -> Self {
        Self { deadline: None }
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    pub fn exhausted(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Best key of a randomized search plus the best-so-far score after every
/// generation or climb step. The history never decreases.
#[derive(Clone, Debug)]
pub struct SearchOutcome<K> {
    pub best: ScoredCandidate<K>,
    pub history: Vec<f64>,
}

/// Records best-so-far scores; pushing a worse score repeats the previous best.
#[derive(Debug, Default)]
pub(crate) struct History {
    scores: Vec<f64>,
}

impl History {
    pub(crate) fn record(&mut self, score: f64) {
        let best = self.scores.last().map_or(score, |&last| last.max(score));
        self.scores.push(best);
    }

    pub(crate) fn into_inner(self) -> Vec<f64> {
        self.scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_monotone() {
        let mut history = History::default();
        for score in [-5.0, -7.0, -3.0, -4.0] {
            history.record(score);
        }
        assert_eq!(history.into_inner(), vec![-5.0, -5.0, -3.0, -3.0]);
    }

    #[test]
    fn zero_timeout_is_exhausted() {
        assert!(Budget::with_timeout(Some(Duration::ZERO)).exhausted());
        assert!(!Budget::unlimited().exhausted());
    }
}
