//! Key recovery when a stretch of plaintext is known.

use std::fmt::{self, Display};

use log::debug;

use crate::{
    cipher::{HillKey, VigenereKey},
    error::{Error, Result},
    modular::{self, MODULUS, Matrix},
    text::{self, ALPHABET_LEN},
};

/// Cipher letter → plain letter, possibly incomplete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PartialMapping {
    mapping: [Option<u8>; ALPHABET_LEN],
}

impl PartialMapping {
    pub fn get(&self, cipher: u8) -> Option<u8> {
        self.mapping.get(cipher as usize).copied().flatten()
    }

    pub fn mapped(&self) -> usize {
        self.mapping.iter().flatten().count()
    }

    /// Unmapped letters render as `?`.
    pub fn decrypt(&self, cipher: &[u8]) -> String {
        cipher
            .iter()
            .map(|&c| self.get(c).map_or('?', |p| (b'a' + p) as char))
            .collect()
    }
}

impl Display for PartialMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (cipher, plain) in self.mapping.iter().enumerate() {
            if let Some(plain) = plain {
                writeln!(f, "{} -> {}", (b'a' + cipher as u8) as char, (b'a' + plain) as char)?;
            }
        }
        Ok(())
    }
}

/// Pairs the letters of both texts rank-for-rank by frequency.
pub fn frequency_mapping(plain: &[u8], cipher: &[u8]) -> PartialMapping {
    let plain_rank = rank_by_count(plain);
    let cipher_rank = rank_by_count(cipher);
    let mut mapping = [None; ALPHABET_LEN];
    for (&c, &p) in cipher_rank.iter().zip(&plain_rank) {
        mapping[c as usize] = Some(p);
    }
    PartialMapping { mapping }
}

/// Letters present in `letters`, most frequent first, ties by first appearance.
fn rank_by_count(letters: &[u8]) -> Vec<u8> {
    let counts = text::letter_counts(letters);
    let mut first_seen = [usize::MAX; ALPHABET_LEN];
    for (pos, &letter) in letters.iter().enumerate().rev() {
        first_seen[letter as usize] = pos;
    }
    let mut present: Vec<u8> = (0..ALPHABET_LEN as u8)
        .filter(|&l| counts[l as usize] > 0)
        .collect();
    present.sort_by(|&a, &b| {
        counts[b as usize]
            .cmp(&counts[a as usize])
            .then(first_seen[a as usize].cmp(&first_seen[b as usize]))
    });
    present
}

pub fn extract_vigenere_key(plain: &[u8], cipher: &[u8], key_length: usize) -> Result<VigenereKey> {
    if key_length == 0 || key_length > plain.len().min(cipher.len()) {
        return Err(Error::key_length(key_length, "must be positive and fit within both texts"));
    }
    let shifts = plain
        .iter()
        .zip(cipher)
        .take(key_length)
        .map(|(&p, &c)| (c + ALPHABET_LEN as u8 - p) % ALPHABET_LEN as u8)
        .collect();
    VigenereKey::new(shifts)
}

/// Solves `K = C·P⁻¹` on the first window of `n` aligned blocks whose plaintext
/// matrix is invertible. Blocks are the matrix columns.
pub fn recover_hill_key(plain: &[u8], cipher: &[u8], n: usize) -> Result<HillKey> {
    if n == 0 {
        return Err(Error::key_length(0, "Hill dimension must be positive"));
    }
    let window = n * n;
    let usable = plain.len().min(cipher.len());
    if usable < window {
        return Err(Error::key_length(n, format!("needs at least {window} aligned letters")));
    }

    for start in (0..=usable - window).step_by(n) {
        let p = block_columns(&plain[start..start + window], n);
        let Some(p_inverse) = p.as_ref().and_then(modular::mod_inverse_matrix) else {
            continue;
        };
        let Some(c) = block_columns(&cipher[start..start + window], n) else {
            continue;
        };
        debug!("plaintext window at {start} is invertible");
        match HillKey::new(c.mul(&p_inverse)) {
            Ok(key) => return Ok(key),
            Err(err) => debug!("window at {start} gave a singular key: {err}"),
        }
    }
    Err(Error::NoCandidateFound("known-plaintext window"))
}

/// `n` consecutive blocks of `n` letters as the columns of a matrix.
fn block_columns(letters: &[u8], n: usize) -> Option<Matrix> {
    let entries = (0..n).flat_map(|row| (0..n).map(move |col| u32::from(letters[col * n + row]) % MODULUS));
    Matrix::from_entries(n, entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = "manhaocaboalmeidaperguntaoqueelesestaofazendoaliaaquelahoraasarmasestaoapontadasparaelesenquantoestaocomasmaosnacabecaoc";
    const CIPHER: &str = "cbetbvrbzvbdcimpbwiygfejbvsfiidikikjbvnbuiepvbdmbbsfidbtvybbkbycbkikjbvbwvejbpbkwbybidikiesfbejvikjbvrvcbkcbvkebrbzirbvr";

    #[test]
    fn frequency_mapping_recovers_aligned_text() {
        let cipher = text::to_letters(CIPHER);
        let mapping = frequency_mapping(&text::to_letters(PLAIN), &cipher);
        assert_eq!(mapping.mapped(), 20);
        assert_eq!(mapping.decrypt(&cipher), PLAIN);
    }

    #[test]
    fn unmapped_letters_render_as_question_marks() {
        let mapping = frequency_mapping(&text::to_letters("aab"), &text::to_letters("xxy"));
        assert_eq!(mapping.get(23), Some(0));
        assert_eq!(mapping.decrypt(&text::to_letters("xyz")), "ab?");
        assert_eq!(mapping.to_string(), "x -> a\ny -> b\n");
    }

    #[test]
    fn ties_break_by_first_appearance() {
        assert_eq!(rank_by_count(&text::to_letters("cbab")), vec![1, 2, 0]);
    }

    #[test]
    fn vigenere_key_by_subtraction() {
        let key = VigenereKey::parse("lemon").unwrap();
        let plain = text::to_letters("attackatdawn");
        let cipher = key.encrypt(&plain);
        assert_eq!(extract_vigenere_key(&plain, &cipher, 5).unwrap(), key);
        assert!(matches!(
            extract_vigenere_key(&plain, &cipher, 0),
            Err(Error::InvalidKeyLength { .. })
        ));
        assert!(matches!(
            extract_vigenere_key(&plain, &cipher, 13),
            Err(Error::InvalidKeyLength { .. })
        ));
    }

    #[test]
    fn hill_key_from_aligned_blocks() {
        let key = HillKey::new(Matrix::from_rows(&[[3, 3], [2, 5]]).unwrap()).unwrap();
        let plain = text::to_letters("helpmeobiwankenobi");
        let cipher = key.encrypt(&plain);
        let recovered = recover_hill_key(&plain, &cipher, 2).unwrap();
        assert_eq!(recovered.matrix(), key.matrix());
    }

    #[test]
    fn hill_recovery_slides_past_singular_windows() {
        let key = HillKey::new(Matrix::from_rows(&[[1, 2, 0], [0, 3, 4], [0, 0, 5]]).unwrap()).unwrap();
        // The first three windows are singular; only the last one inverts.
        let plain = text::to_letters("aaaaaaaaajogodebol");
        let cipher = key.encrypt(&plain);
        let recovered = recover_hill_key(&plain, &cipher, 3).unwrap();
        assert_eq!(recovered.matrix(), key.matrix());
    }

    #[test]
    fn hill_recovery_without_invertible_window() {
        let plain = text::to_letters("aaaaaaaa");
        assert!(matches!(
            recover_hill_key(&plain, &plain, 2),
            Err(Error::NoCandidateFound(_))
        ));
        assert!(matches!(
            recover_hill_key(&plain[..3], &plain[..3], 2),
            Err(Error::InvalidKeyLength { .. })
        ));
    }
}
