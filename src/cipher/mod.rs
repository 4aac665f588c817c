//! Key types for the three classical ciphers, with encrypt/decrypt over letter indices.

pub mod hill;
pub mod substitution;
pub mod vigenere;

pub use hill::HillKey;
pub use substitution::SubstitutionKey;
pub use vigenere::VigenereKey;
