//! Numeric factor and solve over an already ordered sparse matrix.
//!
//! No searching and no allocation: elimination only ever touches elements
//! that minimum ordering created in advance.

use super::matrix::{Elm, ElmId, SparseMatrix};
use super::ROUNDOFF;
use crate::error::{KineticError, Result};

impl SparseMatrix {
    /// Solve the system in place.
    ///
    /// On entry `rhs` holds the right-hand side indexed by logical row; on
    /// success it holds the solution indexed by logical variable. The
    /// coefficient values are overwritten by the factors.
    pub fn matsol(&mut self) -> Result<()> {
        for k in 0..self.neqn() {
            let pivot = self.diag[k];
            if self.pool[pivot].value.abs() <= ROUNDOFF {
                return Err(KineticError::Singular { pivot: k });
            }
            let mut el = self.pool[pivot].r_down;
            while let Some(e) = el {
                self.subrow(pivot, e);
                el = self.pool[e].r_down;
            }
        }
        self.bksub();
        Ok(())
    }

    /// Subtract a multiple of the pivot row from the row holding `rowsub`.
    fn subrow(&mut self, pivot: ElmId, rowsub: ElmId) {
        let r = self.pool[rowsub].value / self.pool[pivot].value;
        let (prow, srow) = (self.pool[pivot].row, self.pool[rowsub].row);
        self.rhs[srow] -= self.rhs[prow] * r;

        let mut target = rowsub;
        let mut el = self.pool[pivot].c_right;
        while let Some(e) = el {
            let col = self.pool[e].col;
            // Fill-in guarantees the matching element exists further right
            while let Some(next) = self.pool[target].c_right {
                target = next;
                if self.pool[target].col == col {
                    break;
                }
            }
            debug_assert_eq!(self.pool[target].col, col);
            let v = self.pool[e].value * r;
            self.pool[target].value -= v;
            el = self.pool[e].c_right;
        }
    }

    fn bksub(&mut self) {
        for k in (0..self.neqn()).rev() {
            let d = self.diag[k];
            let mut el = self.pool[d].c_right;
            while let Some(e) = el {
                let Elm { row, col, value, .. } = self.pool[e];
                self.rhs[row] -= value * self.rhs[col];
                el = self.pool[e].c_right;
            }
            let row = self.pool[d].row;
            self.rhs[row] /= self.pool[d].value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::crout::{crout, solve, DenseMatrix};
    use approx::assert_abs_diff_eq;

    /// Load the nonzeros of `rows` into a fresh ordered matrix.
    fn load(rows: &[Vec<f64>], b: &[f64]) -> SparseMatrix {
        let n = rows.len();
        let mut m = SparseMatrix::new();
        m.initeqn(n);
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    m.getelm(i, j, None);
                }
            }
        }
        m.spar_minorder();
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    let e = m.getelm(i, j, None);
                    *m.value_mut(e) = v;
                }
            }
        }
        m.rhs_mut().copy_from_slice(b);
        m
    }

    fn dense_solution(rows: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
        let n = rows.len();
        let mut a = DenseMatrix::from_rows(rows).unwrap();
        let mut perm = vec![0; n];
        let mut rowmax = vec![0.0; n];
        crout(&mut a, &mut perm, &mut rowmax).unwrap();
        let mut x = vec![0.0; n];
        solve(&a, b, &perm, &mut x, None);
        x
    }

    #[test]
    fn test_matsol_matches_dense_solve() {
        let rows = vec![
            vec![4.0, 0.0, 1.0, 0.0, 0.0, 2.0],
            vec![0.0, 3.0, 0.0, 0.5, 0.0, 0.0],
            vec![1.0, 0.0, 5.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.5, 0.0, 6.0, 0.0, 1.0],
            vec![0.0, 0.0, 1.0, 0.0, 7.0, 0.0],
            vec![2.0, 0.0, 0.0, 1.0, 0.0, 8.0],
        ];
        let b = [1.0, -2.0, 3.0, 0.5, -1.0, 4.0];
        let mut m = load(&rows, &b);
        m.matsol().unwrap();

        let expected = dense_solution(&rows, &b);
        for (x, e) in m.rhs().iter().zip(&expected) {
            assert_abs_diff_eq!(*x, *e, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_matsol_arrow_pattern() {
        // Dense first row and column; natural order would fill everything
        let rows = vec![
            vec![5.0, 1.0, 1.0, 1.0],
            vec![1.0, 4.0, 0.0, 0.0],
            vec![1.0, 0.0, 3.0, 0.0],
            vec![1.0, 0.0, 0.0, 2.0],
        ];
        let b = [8.0, 5.0, 4.0, 3.0];
        let mut m = load(&rows, &b);
        m.matsol().unwrap();
        let expected = dense_solution(&rows, &b);
        for (x, e) in m.rhs().iter().zip(&expected) {
            assert_abs_diff_eq!(*x, *e, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_matsol_zero_pivot_is_singular() {
        let mut m = SparseMatrix::new();
        m.initeqn(2);
        let e = m.getelm(0, 1, None);
        m.spar_minorder();
        *m.value_mut(e) = 1.0;
        assert!(matches!(m.matsol(), Err(KineticError::Singular { .. })));
    }
}
