use std::fmt::{self, Display};

use crate::{
    error::{Error, Result},
    text::{self, ALPHABET_LEN},
};

/// Repeating shift key. `plain[i] = cipher[i] - key[i mod len]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VigenereKey {
    shifts: Vec<u8>,
}

impl VigenereKey {
    pub fn new(shifts: Vec<u8>) -> Result<Self> {
        if shifts.is_empty() {
            return Err(Error::key_length(0, "a Vigenère key needs at least one letter"));
        }
        if let Some(bad) = shifts.iter().find(|&&s| s as usize >= ALPHABET_LEN) {
            return Err(Error::InvalidKey(format!("shift {bad} out of range")));
        }
        Ok(Self { shifts })
    }

    pub fn parse(key: &str) -> Result<Self> {
        Self::new(text::to_letters(key))
    }

    pub fn shifts(&self) -> &[u8] {
        &self.shifts
    }

    pub fn len(&self) -> usize {
        self.shifts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }

    pub(crate) fn set(&mut self, position: usize, shift: u8) {
        self.shifts[position] = shift;
    }

    pub fn decrypt(&self, cipher: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(cipher.len());
        decrypt_into(&self.shifts, cipher, &mut out);
        out
    }

    pub fn encrypt(&self, plain: &[u8]) -> Vec<u8> {
        plain
            .iter()
            .zip(self.shifts.iter().cycle())
            .map(|(&p, &k)| (p + k) % ALPHABET_LEN as u8)
            .collect()
    }
}

/// Decrypts into a reusable buffer; search loops call this once per proposal.
pub(crate) fn decrypt_into(shifts: &[u8], cipher: &[u8], out: &mut Vec<u8>) {
    out.clear();
    out.extend(
        cipher
            .iter()
            .zip(shifts.iter().cycle())
            .map(|(&c, &k)| (c + ALPHABET_LEN as u8 - k) % ALPHABET_LEN as u8),
    );
}

impl Display for VigenereKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text::from_letters(&self.shifts))
    }
}
