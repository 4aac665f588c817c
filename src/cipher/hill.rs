use std::fmt::{self, Display};

use crate::{
    error::{Error, Result},
    modular::{self, Matrix},
};

/// Hill key: a square matrix whose determinant is a unit mod 26. The inverse is
/// computed once at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HillKey {
    matrix: Matrix,
    inverse: Matrix,
}

impl HillKey {
    pub fn new(matrix: Matrix) -> Result<Self> {
        let inverse = modular::mod_inverse_matrix(&matrix).ok_or(Error::NotInvertible {
            determinant: matrix.determinant(),
        })?;
        Ok(Self { matrix, inverse })
    }

    /// Parses rows separated by `;` with entries separated by commas or
    /// whitespace, e.g. `"15,25,5; 0,25,11; 0,0,3"`.
    pub fn parse(key: &str) -> Result<Self> {
        let rows = key
            .split(';')
            .map(|row| {
                row.split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|entry| !entry.is_empty())
                    .map(|entry| {
                        entry
                            .parse::<u32>()
                            .map_err(|_| Error::InvalidKey(format!("'{entry}' is not a matrix entry")))
                    })
                    .collect::<Result<Vec<u32>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        let matrix = Matrix::from_rows(&rows)
            .ok_or_else(|| Error::InvalidKey(format!("'{key}' is not a square matrix")))?;
        Self::new(matrix)
    }

    /// Builds the key from a matrix and an inverse already known to match it.
    pub(crate) fn from_parts(matrix: Matrix, inverse: Matrix) -> Self {
        debug_assert_eq!(inverse.mul(&matrix), Matrix::identity(matrix.dimension()));
        Self { matrix, inverse }
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    pub fn inverse(&self) -> &Matrix {
        &self.inverse
    }

    pub fn dimension(&self) -> usize {
        self.matrix.dimension()
    }

    /// Output length is the input length rounded up to a whole block.
    pub fn encrypt(&self, plain: &[u8]) -> Vec<u8> {
        modular::transform_blocks(&self.matrix, plain)
    }

    /// Output length is the input length rounded up to a whole block; the
    /// trailing padding letters are left for the caller to drop.
    pub fn decrypt(&self, cipher: &[u8]) -> Vec<u8> {
        modular::decrypt_blocks(&self.inverse, cipher)
    }
}

impl Display for HillKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.matrix.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text;

    #[test]
    fn rejects_singular_matrix() {
        let m = Matrix::from_rows(&[[2, 4], [1, 2]]).unwrap();
        assert!(matches!(HillKey::new(m), Err(Error::NotInvertible { .. })));
    }

    #[test]
    fn round_trip_with_padding() {
        let key = HillKey::new(Matrix::from_rows(&[[15, 25, 5], [0, 25, 11], [0, 0, 3]]).unwrap())
            .unwrap();
        let plain = text::to_letters("vacomospaisto");
        let cipher = key.encrypt(&plain);
        assert_eq!(cipher.len(), 15);
        let decrypted = key.decrypt(&cipher);
        assert_eq!(decrypted.len(), 15);
        assert_eq!(&decrypted[..plain.len()], plain.as_slice());
        assert_eq!(&decrypted[plain.len()..], &[0, 0]);
    }

    #[test]
    fn parses_rows_and_entries() {
        let key = HillKey::parse("15,25,5; 0 25 11;0, 0, 3").unwrap();
        assert_eq!(key.matrix(), &Matrix::from_rows(&[[15, 25, 5], [0, 25, 11], [0, 0, 3]]).unwrap());
        assert_eq!(HillKey::parse("27").unwrap().matrix().get(0, 0), 1);

        assert!(matches!(HillKey::parse("1,7;0"), Err(Error::InvalidKey(_))));
        assert!(matches!(HillKey::parse("1,x;0,17"), Err(Error::InvalidKey(_))));
        assert!(matches!(HillKey::parse(""), Err(Error::InvalidKey(_))));
        assert!(matches!(HillKey::parse("2,4;1,2"), Err(Error::NotInvertible { .. })));
    }

    #[test]
    fn textbook_two_by_two() {
        let key = HillKey::new(Matrix::from_rows(&[[3, 3], [2, 5]]).unwrap()).unwrap();
        let cipher = key.encrypt(&text::to_letters("help"));
        assert_eq!(text::from_letters(&cipher), "hiat");
    }
}
