//! Dense LU factorization by the Crout algorithm.
//!
//! Rows are not physically exchanged: the permutation vector records which
//! stored row sits in each pivot position, and [`solve`] reads through it.
//! Pivots are chosen with implicit equilibration, i.e. the candidate with the
//! largest `|a[row][col] / rowmax[row]|` wins, where `rowmax` is the entry of
//! largest magnitude in the original row.

use std::ops::{Index, IndexMut};

use super::ROUNDOFF;
use crate::error::{KineticError, Result};

/// Square dense matrix stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    /// Matrix entries (row-major)
    a: Vec<f64>,
    /// Matrix dimension
    size: usize,
}

impl DenseMatrix {
    /// Create a zero matrix of the given dimension.
    pub fn new(size: usize) -> Self {
        Self {
            a: vec![0.0; size * size],
            size,
        }
    }

    /// Build a matrix from rows. All rows must have `rows.len()` entries.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let size = rows.len();
        let mut m = Self::new(size);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != size {
                return Err(KineticError::dimension(format!(
                    "row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    size
                )));
            }
            m.a[i * size..(i + 1) * size].copy_from_slice(row);
        }
        Ok(m)
    }

    /// Matrix dimension.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Set every entry to zero.
    pub fn clear(&mut self) {
        self.a.fill(0.0);
    }

    /// Add to matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.a[row * self.size + col] += value;
    }

    /// Matrix-vector product `A x`.
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        (0..self.size)
            .map(|i| {
                self.a[i * self.size..(i + 1) * self.size]
                    .iter()
                    .zip(x)
                    .map(|(a, x)| a * x)
                    .sum()
            })
            .collect()
    }
}

impl Index<(usize, usize)> for DenseMatrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        &self.a[row * self.size + col]
    }
}

impl IndexMut<(usize, usize)> for DenseMatrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        &mut self.a[row * self.size + col]
    }
}

/// Factor `a` in place.
///
/// On return the lower triangle (through `perm`) holds the factors that
/// transform the right-hand side and the upper triangle holds the unit-diagonal
/// back-substitution factors. `perm` and `rowmax` are caller-owned scratch of
/// at least `a.size()` entries so repeated factorizations do not allocate.
pub fn crout(a: &mut DenseMatrix, perm: &mut [usize], rowmax: &mut [f64]) -> Result<()> {
    let n = a.size();
    if perm.len() < n || rowmax.len() < n {
        return Err(KineticError::dimension(format!(
            "crout scratch too small for {} equations",
            n
        )));
    }

    for i in 0..n {
        perm[i] = i;
        let mut k = 0;
        for j in 1..n {
            if a[(i, j)].abs() > a[(i, k)].abs() {
                k = j;
            }
        }
        rowmax[i] = a[(i, k)];
        // An all-zero row can never yield a pivot and would poison the
        // equilibration ratios with NaN.
        if rowmax[i] == 0.0 {
            return Err(KineticError::Singular { pivot: i });
        }
    }

    for r in 0..n {
        // Column r of the lower factor
        for i in r..n {
            let irow = perm[i];
            let mut sum = 0.0;
            for k in 0..r {
                sum += a[(irow, k)] * a[(perm[k], r)];
            }
            a[(irow, r)] -= sum;
        }

        // Pick the most accurate pivot among the remaining rows
        let mut pivot = perm[r];
        let mut save_i = r;
        let mut equil_1 = (a[(pivot, r)] / rowmax[pivot]).abs();
        for i in (r + 1)..n {
            let irow = perm[i];
            let equil_2 = (a[(irow, r)] / rowmax[irow]).abs();
            if equil_2 > equil_1 {
                pivot = irow;
                save_i = i;
                equil_1 = equil_2;
            }
        }

        if pivot != perm[r] {
            perm[save_i] = perm[r];
            perm[r] = pivot;
        }

        if a[(pivot, r)].abs() < ROUNDOFF {
            return Err(KineticError::Singular { pivot: r });
        }

        // Row r of the unit upper factor
        for j in (r + 1)..n {
            let mut sum = 0.0;
            for k in 0..r {
                sum += a[(pivot, k)] * a[(perm[k], j)];
            }
            a[(pivot, j)] = (a[(pivot, j)] - sum) / a[(pivot, r)];
        }
    }

    Ok(())
}

/// Solve `A x = b` with a matrix factored by [`crout`].
///
/// Without `remap` the solution lands in `p[0..n]`. With `remap = Some(y)`
/// component `i` is written to `p[y[i]]`, which lets a caller solve straight
/// into state slots scattered through a larger instance-data array.
///
/// # Panics
///
/// Panics if `b` or `perm` is shorter than the matrix size, if `remap` is
/// shorter or points past the end of `p`, or, without `remap`, if `p` is
/// shorter than the matrix size.
pub fn solve(a: &DenseMatrix, b: &[f64], perm: &[usize], p: &mut [f64], remap: Option<&[usize]>) {
    let n = a.size();
    debug_assert!(b.len() >= n && perm.len() >= n, "rhs or permutation shorter than {}", n);
    debug_assert!(
        match remap {
            Some(y) => y.len() >= n && y[..n].iter().all(|&s| s < p.len()),
            None => p.len() >= n,
        },
        "solution slots do not fit {} unknowns",
        n
    );
    let slot = |i: usize| remap.map_or(i, |y| y[i]);

    // Forward substitution with pivoting
    for i in 0..n {
        let pivot = perm[i];
        let mut sum = 0.0;
        for j in 0..i {
            sum += a[(pivot, j)] * p[slot(j)];
        }
        p[slot(i)] = (b[pivot] - sum) / a[(pivot, i)];
    }

    // Back substitution; the upper factor has a unit diagonal
    for i in (0..n).rev() {
        let pivot = perm[i];
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += a[(pivot, j)] * p[slot(j)];
        }
        p[slot(i)] -= sum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn factor_and_solve(rows: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>> {
        let mut a = DenseMatrix::from_rows(rows)?;
        let n = a.size();
        let mut perm = vec![0; n];
        let mut rowmax = vec![0.0; n];
        crout(&mut a, &mut perm, &mut rowmax)?;
        let mut x = vec![0.0; n];
        solve(&a, b, &perm, &mut x, None);
        Ok(x)
    }

    #[test]
    fn test_crout_solves_symmetric_system() {
        let rows = vec![
            vec![4.0, -2.0, 1.0],
            vec![-2.0, 4.0, -2.0],
            vec![1.0, -2.0, 4.0],
        ];
        let x = factor_and_solve(&rows, &[11.0, -16.0, 17.0]).unwrap();
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[2], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_crout_pivots_on_zero_diagonal() {
        let rows = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let x = factor_and_solve(&rows, &[2.0, 3.0]).unwrap();
        assert_abs_diff_eq!(x[0], 3.0, epsilon = 1e-15);
        assert_abs_diff_eq!(x[1], 2.0, epsilon = 1e-15);
    }

    #[test]
    fn test_crout_equilibrated_pivot_choice() {
        // Largest magnitude in column 0 is row 1, but relative to its row
        // maximum row 0 is the better pivot.
        let rows = vec![vec![1.0, 0.5], vec![2.0, 1000.0]];
        let mut a = DenseMatrix::from_rows(&rows).unwrap();
        let mut perm = vec![0; 2];
        let mut rowmax = vec![0.0; 2];
        crout(&mut a, &mut perm, &mut rowmax).unwrap();
        assert_eq!(perm, vec![0, 1]);

        let b = [2.0, 2004.0];
        let mut x = vec![0.0; 2];
        solve(&a, &b, &perm, &mut x, None);
        let check = DenseMatrix::from_rows(&rows).unwrap().mul_vec(&x);
        assert_abs_diff_eq!(check[0], b[0], epsilon = 1e-10);
        assert_abs_diff_eq!(check[1], b[1], epsilon = 1e-10);
    }

    #[test]
    fn test_crout_singular() {
        let rows = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        let err = factor_and_solve(&rows, &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, KineticError::Singular { pivot: 1 }));
    }

    #[test]
    fn test_crout_zero_row_is_singular() {
        let rows = vec![vec![1.0, 2.0], vec![0.0, 0.0]];
        let err = factor_and_solve(&rows, &[1.0, 0.0]).unwrap_err();
        assert!(matches!(err, KineticError::Singular { pivot: 1 }));
    }

    #[test]
    fn test_solve_scatters_through_remap() {
        let rows = vec![vec![2.0, 0.0], vec![0.0, 4.0]];
        let mut a = DenseMatrix::from_rows(&rows).unwrap();
        let mut perm = vec![0; 2];
        let mut rowmax = vec![0.0; 2];
        crout(&mut a, &mut perm, &mut rowmax).unwrap();

        let mut data = vec![-1.0; 6];
        solve(&a, &[4.0, 8.0], &perm, &mut data, Some(&[4, 1]));
        assert_eq!(data, vec![-1.0, 2.0, -1.0, -1.0, 2.0, -1.0]);
    }

    #[test]
    #[should_panic]
    fn test_solve_short_output_panics() {
        let mut a = DenseMatrix::from_rows(&[vec![2.0, 0.0], vec![0.0, 2.0]]).unwrap();
        let mut perm = vec![0; 2];
        let mut rowmax = vec![0.0; 2];
        crout(&mut a, &mut perm, &mut rowmax).unwrap();
        let mut x = vec![0.0; 1];
        solve(&a, &[1.0, 1.0], &perm, &mut x, None);
    }

    #[test]
    fn test_from_rows_rejects_ragged_input() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(matches!(
            DenseMatrix::from_rows(&rows),
            Err(KineticError::InvalidDimension { .. })
        ));
    }
}
