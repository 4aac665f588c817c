//! Ciphertext-only cryptanalysis of Hill, monoalphabetic substitution and
//! Vigenère ciphers over the 26-letter alphabet, scored against Portuguese.
//!
//! Build a [`LanguageModel`] once from a word list and hand it to the searches in
//! [`attack`]. Every search returns [`ScoredCandidate`]s; the randomized ones also
//! report their best-so-far history.

pub mod attack;
pub mod cipher;
pub mod error;
pub mod known;
pub mod language;
pub mod modular;
pub mod scoring;
pub mod text;

pub use error::{Error, Result};
pub use language::{LanguageModel, LetterSource, ModelOptions};
pub use scoring::{ScoreWeights, ScoredCandidate};
