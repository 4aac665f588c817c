//! Arithmetic mod 26: scalar inverses, square matrices, block transforms.

use std::fmt::{self, Display};

pub const MODULUS: u32 = 26;

/// Scalars in `1..26` that have an inverse mod 26.
pub const UNITS: [u32; 12] = [1, 3, 5, 7, 9, 11, 15, 17, 19, 21, 23, 25];

/// Multiplicative inverse of `a` mod 26, or `None` when `gcd(a, 26) != 1`.
pub fn mod_inverse(a: u32) -> Option<u32> {
    let a = a % MODULUS;
    (1..MODULUS).find(|&i| (a * i) % MODULUS == 1)
}

pub fn is_unit(a: u32) -> bool {
    gcd(a % MODULUS, MODULUS) == 1
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Square matrix with entries reduced mod 26, stored row-major.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Matrix {
    n: usize,
    entries: Vec<u32>,
}

impl Matrix {
    /// Builds an `n×n` matrix from row-major entries, reducing each mod 26.
    /// Returns `None` when `entries.len() != n*n`.
    pub fn from_entries(n: usize, entries: impl IntoIterator<Item = u32>) -> Option<Self> {
        let entries: Vec<u32> = entries.into_iter().map(|v| v % MODULUS).collect();
        (n > 0 && entries.len() == n * n).then_some(Self { n, entries })
    }

    pub fn from_rows<R: AsRef<[u32]>>(rows: &[R]) -> Option<Self> {
        let n = rows.len();
        if rows.iter().any(|row| row.as_ref().len() != n) {
            return None;
        }
        Self::from_entries(n, rows.iter().flat_map(|row| row.as_ref().iter().copied()))
    }

    pub fn identity(n: usize) -> Self {
        let mut entries = vec![0; n * n];
        for i in 0..n {
            entries[i * n + i] = 1;
        }
        Self { n, entries }
    }

    pub fn dimension(&self) -> usize {
        self.n
    }

    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.entries[row * self.n + col]
    }

    pub fn row(&self, row: usize) -> &[u32] {
        &self.entries[row * self.n..(row + 1) * self.n]
    }

    pub fn is_upper_triangular(&self) -> bool {
        (0..self.n).all(|i| (0..i).all(|j| self.get(i, j) == 0))
    }

    /// Determinant reduced into `0..26`.
    pub fn determinant(&self) -> u32 {
        let det = bareiss_determinant(self.n, self.entries.iter().map(|&v| v as i128).collect());
        det.rem_euclid(MODULUS as i128) as u32
    }

    /// Transposed cofactor matrix mod 26.
    pub fn adjugate(&self) -> Self {
        let n = self.n;
        if n == 1 {
            return Self::identity(1);
        }
        let mut entries = vec![0; n * n];
        for i in 0..n {
            for j in 0..n {
                let minor: Vec<i128> = (0..n)
                    .filter(|&r| r != i)
                    .flat_map(|r| {
                        (0..n)
                            .filter(move |&c| c != j)
                            .map(move |c| self.get(r, c) as i128)
                    })
                    .collect();
                let cofactor = bareiss_determinant(n - 1, minor);
                let signed = if (i + j) % 2 == 0 { cofactor } else { -cofactor };
                // adj[j][i] = C[i][j]
                entries[j * n + i] = signed.rem_euclid(MODULUS as i128) as u32;
            }
        }
        Self { n, entries }
    }

    /// `self · other` mod 26. Dimensions must agree.
    pub fn mul(&self, other: &Matrix) -> Matrix {
        debug_assert_eq!(self.n, other.n);
        let n = self.n;
        let mut entries = vec![0; n * n];
        for i in 0..n {
            for j in 0..n {
                let sum: u32 = (0..n).map(|k| self.get(i, k) * other.get(k, j)).sum();
                entries[i * n + j] = sum % MODULUS;
            }
        }
        Matrix { n, entries }
    }

    /// `self · v` mod 26 written into `out`.
    pub fn mul_vector(&self, v: &[u8], out: &mut [u8]) {
        for (i, slot) in out.iter_mut().enumerate().take(self.n) {
            let sum: u32 = self
                .row(i)
                .iter()
                .zip(v)
                .map(|(&k, &x)| k * x as u32)
                .sum();
            *slot = (sum % MODULUS) as u8;
        }
    }
}

impl Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.n {
            let row: Vec<String> = self.row(i).iter().map(|v| format!("{v:2}")).collect();
            writeln!(f, "[{}]", row.join(" "))?;
        }
        Ok(())
    }
}

/// Fraction-free Gaussian elimination; exact over the integers.
fn bareiss_determinant(n: usize, mut m: Vec<i128>) -> i128 {
    if n == 0 {
        return 1;
    }
    let mut sign = 1i128;
    let mut prev = 1i128;
    for k in 0..n - 1 {
        if m[k * n + k] == 0 {
            let Some(swap) = (k + 1..n).find(|&r| m[r * n + k] != 0) else {
                return 0;
            };
            for c in 0..n {
                m.swap(k * n + c, swap * n + c);
            }
            sign = -sign;
        }
        let pivot = m[k * n + k];
        for i in k + 1..n {
            for j in k + 1..n {
                m[i * n + j] = (m[i * n + j] * pivot - m[i * n + k] * m[k * n + j]) / prev;
            }
        }
        prev = pivot;
    }
    sign * m[n * n - 1]
}

/// Inverse of `m` mod 26 via `det⁻¹ · adj(m)`, or `None` when the determinant
/// shares a factor with 26.
pub fn mod_inverse_matrix(m: &Matrix) -> Option<Matrix> {
    let det_inv = mod_inverse(m.determinant())?;
    let adj = m.adjugate();
    Some(Matrix {
        n: m.n,
        entries: adj.entries.iter().map(|&v| (v * det_inv) % MODULUS).collect(),
    })
}

/// Right-pads `letters` with zeros up to a multiple of `block`.
pub fn pad_to_blocks(letters: &[u8], block: usize) -> Vec<u8> {
    let mut padded = letters.to_vec();
    let rem = padded.len() % block;
    if rem != 0 {
        padded.resize(padded.len() + block - rem, 0);
    }
    padded
}

/// Applies `m` to every column block of `letters`, in block order. The input is
/// zero-padded first, so the output length is the padded length.
pub fn transform_blocks(m: &Matrix, letters: &[u8]) -> Vec<u8> {
    let padded = pad_to_blocks(letters, m.n);
    let mut out = vec![0u8; padded.len()];
    for (block, dest) in padded.chunks_exact(m.n).zip(out.chunks_exact_mut(m.n)) {
        m.mul_vector(block, dest);
    }
    out
}

/// `plain_block = inverse · cipher_block` for every block.
pub fn decrypt_blocks(inverse: &Matrix, cipher: &[u8]) -> Vec<u8> {
    transform_blocks(inverse, cipher)
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn scalar_inverses() {
        for a in 0..MODULUS {
            match mod_inverse(a) {
                Some(inv) => {
                    assert!(is_unit(a));
                    assert_eq!((a * inv) % MODULUS, 1);
                }
                None => assert!(!is_unit(a), "{a} should be invertible"),
            }
        }
        assert_eq!(UNITS.iter().filter(|&&a| mod_inverse(a).is_some()).count(), 12);
        assert_eq!(mod_inverse(13), None);
        assert_eq!(mod_inverse(2), None);
    }

    #[test]
    fn determinant_matches_cofactor_expansion() {
        let m = Matrix::from_rows(&[[6, 24, 1], [13, 16, 10], [20, 17, 15]]).unwrap();
        // 6(16*15-10*17) - 24(13*15-10*20) + 1(13*17-16*20) = 441
        assert_eq!(m.determinant(), 441 % 26);
    }

    #[test]
    fn determinant_handles_zero_pivot() {
        let m = Matrix::from_rows(&[[0, 1], [1, 0]]).unwrap();
        assert_eq!(m.determinant(), 25);
    }

    #[test]
    fn known_inverse() {
        let key = Matrix::from_rows(&[[15, 25, 5], [0, 25, 11], [0, 0, 3]]).unwrap();
        let inv = mod_inverse_matrix(&key).unwrap();
        assert_eq!(inv, Matrix::from_rows(&[[7, 19, 14], [0, 25, 21], [0, 0, 9]]).unwrap());
    }

    #[test]
    fn singular_matrices_have_no_inverse() {
        let even = Matrix::from_rows(&[[2, 0], [0, 1]]).unwrap();
        let thirteen = Matrix::from_rows(&[[13, 0], [0, 1]]).unwrap();
        assert_eq!(mod_inverse_matrix(&even), None);
        assert_eq!(mod_inverse_matrix(&thirteen), None);
    }

    #[test]
    fn random_invertible_matrices_invert() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let mut checked = 0;
        while checked < 50 {
            let n = rng.gen_range(1..=4);
            let m = Matrix::from_entries(n, (0..n * n).map(|_| rng.gen_range(0..MODULUS))).unwrap();
            let Some(inv) = mod_inverse_matrix(&m) else {
                continue;
            };
            assert_eq!(inv.mul(&m), Matrix::identity(n));
            assert_eq!(m.mul(&inv), Matrix::identity(n));

            let block: Vec<u8> = (0..n).map(|_| rng.gen_range(0..26)).collect();
            let cipher = transform_blocks(&m, &block);
            assert_eq!(decrypt_blocks(&inv, &cipher), block);
            checked += 1;
        }
    }

    #[test]
    fn short_input_is_zero_padded() {
        let m = Matrix::identity(3);
        let out = transform_blocks(&m, &[1, 2, 3, 4]);
        assert_eq!(out, vec![1, 2, 3, 4, 0, 0]);
    }

    #[test]
    fn rejects_ragged_rows() {
        assert!(Matrix::from_rows(&[vec![1, 2], vec![3]]).is_none());
        assert!(Matrix::from_entries(2, [1, 2, 3]).is_none());
    }
}
