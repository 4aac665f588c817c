use thiserror::Error;

/// Errors surfaced by the library.
///
/// Per-candidate failures inside a search (a key without a modular inverse) never
/// reach the caller: they are skipped where they occur. The variants below are
/// either setup failures or an explicit "nothing survived" outcome.
#[derive(Error, Debug)]
pub enum Error {
    #[error("matrix is not invertible mod 26 (determinant {determinant})")]
    NotInvertible { determinant: u32 },

    #[error("input text contains no alphabetic characters")]
    EmptyInput,

    #[error("invalid key length {length}: {reason}")]
    InvalidKeyLength { length: usize, reason: String },

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("no viable candidate found during {0}")]
    NoCandidateFound(&'static str),

    #[error("corpus contains no usable words")]
    EmptyCorpus,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("malformed frequency table: {0}")]
    FrequencyTable(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn key_length(length: usize, reason: impl Into<String>) -> Self {
        Self::InvalidKeyLength {
            length,
            reason: reason.into(),
        }
    }

    pub(crate) fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
