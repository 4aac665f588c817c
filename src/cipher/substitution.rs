use std::fmt::{self, Display};

use rand::{Rng, seq::SliceRandom};

use crate::{
    error::{Error, Result},
    text::{self, ALPHABET_LEN},
};

/// Monoalphabetic key: `mapping[cipher] = plain`. Always a permutation of `0..26`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubstitutionKey {
    mapping: [u8; ALPHABET_LEN],
}

impl SubstitutionKey {
    pub fn new(mapping: [u8; ALPHABET_LEN]) -> Result<Self> {
        let mut seen = [false; ALPHABET_LEN];
        for &plain in &mapping {
            let slot = seen
                .get_mut(plain as usize)
                .ok_or_else(|| Error::InvalidKey(format!("letter index {plain} out of range")))?;
            if *slot {
                return Err(Error::InvalidKey(format!(
                    "plain letter '{}' mapped twice",
                    (b'a' + plain) as char
                )));
            }
            *slot = true;
        }
        Ok(Self { mapping })
    }

    /// Parses the 26-letter plain alphabet listed in cipher-letter order.
    pub fn parse(alphabet: &str) -> Result<Self> {
        let letters = text::to_letters(alphabet);
        let mapping: [u8; ALPHABET_LEN] = letters.as_slice().try_into().map_err(|_| {
            Error::InvalidKey(format!("expected 26 letters, got {}", letters.len()))
        })?;
        Self::new(mapping)
    }

    pub fn identity() -> Self {
        let mut mapping = [0u8; ALPHABET_LEN];
        for (i, slot) in mapping.iter_mut().enumerate() {
            *slot = i as u8;
        }
        Self { mapping }
    }

    pub fn random(rng: &mut impl Rng) -> Self {
        let mut key = Self::identity();
        key.mapping.shuffle(rng);
        key
    }

    /// Pairs cipher letters ranked by count with `plain_order`. Ties keep
    /// alphabetical order.
    pub fn from_frequency_rank(cipher: &[u8], plain_order: &[u8; ALPHABET_LEN]) -> Self {
        let counts = text::letter_counts(cipher);
        let mut letters: Vec<u8> = (0..ALPHABET_LEN as u8).collect();
        letters.sort_by(|&a, &b| counts[b as usize].cmp(&counts[a as usize]));

        let mut mapping = [0u8; ALPHABET_LEN];
        for (&cipher_idx, &plain_idx) in letters.iter().zip(plain_order) {
            mapping[cipher_idx as usize] = plain_idx;
        }
        Self { mapping }
    }

    pub fn mapping(&self) -> &[u8; ALPHABET_LEN] {
        &self.mapping
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        self.mapping.swap(a, b);
    }

    pub fn inverse(&self) -> Self {
        let mut mapping = [0u8; ALPHABET_LEN];
        for (cipher, &plain) in self.mapping.iter().enumerate() {
            mapping[plain as usize] = cipher as u8;
        }
        Self { mapping }
    }

    pub fn decrypt(&self, cipher: &[u8]) -> Vec<u8> {
        cipher.iter().map(|&idx| self.mapping[idx as usize]).collect()
    }

    /// Applies the inverse mapping, turning plain letters into cipher letters.
    pub fn encrypt(&self, plain: &[u8]) -> Vec<u8> {
        self.inverse().decrypt(plain)
    }
}

impl Display for SubstitutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text::from_letters(&self.mapping))
    }
}
