//! Conversion between raw text and the letter-index form every cipher works on.
//!
//! A letter is an index in `0..26` (`a` = 0). Normalization strips accents through
//! canonical decomposition, lowercases, and drops everything that is not `a..z`.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

pub const ALPHABET_LEN: usize = 26;

/// Lowercase, accent-stripped, letters only.
pub fn normalize(input: &str) -> String {
    input
        .nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .filter(|ch| ch.is_ascii_alphabetic())
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

/// Normalizes `input` and maps it to letter indices.
pub fn to_letters(input: &str) -> Vec<u8> {
    normalize(input).bytes().map(|b| b - b'a').collect()
}

/// Maps letter indices back to lowercase text. Values are reduced mod 26.
pub fn from_letters(letters: &[u8]) -> String {
    letters
        .iter()
        .map(|&idx| (b'a' + idx % ALPHABET_LEN as u8) as char)
        .collect()
}

pub fn letter_index(ch: char) -> Option<u8> {
    ch.is_ascii_alphabetic()
        .then(|| ch.to_ascii_lowercase() as u8 - b'a')
}

pub fn letter_counts(letters: &[u8]) -> [usize; ALPHABET_LEN] {
    let mut counts = [0usize; ALPHABET_LEN];
    for &idx in letters {
        counts[idx as usize] += 1;
    }
    counts
}

/// True when some letter appears three or more times in a row.
pub fn has_letter_run(letters: &[u8], run: usize) -> bool {
    run > 0 && letters.windows(run).any(|w| w.iter().all(|&l| l == w[0]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_accents_and_punctuation() {
        assert_eq!(normalize("Ação, é já!"), "acaoeja");
        assert_eq!(normalize("Coração 123"), "coracao");
    }

    #[test]
    fn letters_round_trip() {
        let letters = to_letters("Olá Mundo");
        assert_eq!(letters, vec![14, 11, 0, 12, 20, 13, 3, 14]);
        assert_eq!(from_letters(&letters), "olamundo");
    }

    #[test]
    fn letter_index_rejects_non_letters() {
        assert_eq!(letter_index('Z'), Some(25));
        assert_eq!(letter_index('3'), None);
    }

    #[test]
    fn detects_runs() {
        assert!(has_letter_run(&to_letters("caaab"), 3));
        assert!(!has_letter_run(&to_letters("caabb"), 3));
    }
}
