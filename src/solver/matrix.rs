//! Arena-backed sparse matrix with order-preserving row and column links.
//!
//! Every nonzero is an [`Elm`] stored in a per-matrix pool and addressed by
//! an [`ElmId`]. Each element sits in two doubly linked lists: its column
//! (`r_up`/`r_down`) and its row (`c_left`/`c_right`). Both lists are kept in
//! *solution order*, i.e. ascending `varord` of the row (for columns) or of
//! the column (for rows):
//!
//! ```text
//!   varord[diag[k].row] == k == varord[diag[k].col]
//!   rowst[k].row == diag[k].row
//!   varord[e.col] < varord[e.c_right.col]
//!   varord[e.row] < varord[e.r_down.row]
//! ```
//!
//! Elements are never removed: reordering relinks them in place, so an
//! `ElmId` stays valid until the structure is rebuilt with [`SparseMatrix::initeqn`].

use std::fmt;
use std::ops::{Index, IndexMut};

use super::minorder::OrderList;

/// Index of an element in the matrix pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElmId(pub usize);

impl fmt::Display for ElmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// One nonzero coefficient and its four solution-order links.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Elm {
    /// Row (logical index)
    pub row: usize,
    /// Column (logical index)
    pub col: usize,
    /// Coefficient value
    pub value: f64,
    /// Element above in the same column
    pub r_up: Option<ElmId>,
    /// Element below in the same column
    pub r_down: Option<ElmId>,
    /// Element to the left in the same row
    pub c_left: Option<ElmId>,
    /// Element to the right in the same row
    pub c_right: Option<ElmId>,
}

impl Elm {
    fn unlinked(row: usize, col: usize) -> Self {
        Self {
            row,
            col,
            value: 0.0,
            r_up: None,
            r_down: None,
            c_left: None,
            c_right: None,
        }
    }
}

/// Per-matrix element storage.
///
/// Keeping the pool inside the matrix means independent solver contexts
/// never share allocations.
#[derive(Debug, Clone, Default)]
pub(super) struct ElmPool {
    elms: Vec<Elm>,
}

impl ElmPool {
    fn alloc(&mut self, row: usize, col: usize) -> ElmId {
        let id = ElmId(self.elms.len());
        self.elms.push(Elm::unlinked(row, col));
        id
    }

    fn clear(&mut self) {
        self.elms.clear();
    }

    fn len(&self) -> usize {
        self.elms.len()
    }
}

impl Index<ElmId> for ElmPool {
    type Output = Elm;

    fn index(&self, id: ElmId) -> &Elm {
        &self.elms[id.0]
    }
}

impl IndexMut<ElmId> for ElmPool {
    fn index_mut(&mut self, id: ElmId) -> &mut Elm {
        &mut self.elms[id.0]
    }
}

/// Sparse matrix in solution order plus its right-hand side.
#[derive(Debug, Clone, Default)]
pub struct SparseMatrix {
    /// Element storage
    pub(super) pool: ElmPool,
    /// Leftmost element of each solution-order row
    pub(super) rowst: Vec<ElmId>,
    /// Pivot element of each solution-order row
    pub(super) diag: Vec<ElmId>,
    /// Logical index -> solution-order position
    pub(super) varord: Vec<usize>,
    /// Right-hand side on entry to `matsol`, solution on exit
    pub(super) rhs: Vec<f64>,
    /// Fill counts, present only while minimum ordering runs
    pub(super) order: Option<OrderList>,
}

impl SparseMatrix {
    /// Create an empty matrix. Call [`initeqn`](Self::initeqn) before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of equations.
    pub fn neqn(&self) -> usize {
        self.diag.len()
    }

    /// Number of stored elements, including fill-in.
    pub fn element_count(&self) -> usize {
        self.pool.len()
    }

    /// Solution-order position of logical index `i`.
    pub fn varord(&self) -> &[usize] {
        &self.varord
    }

    /// Right-hand side, or the solution after [`matsol`](Self::matsol).
    pub fn rhs(&self) -> &[f64] {
        &self.rhs
    }

    /// Mutable right-hand side.
    pub fn rhs_mut(&mut self) -> &mut [f64] {
        &mut self.rhs
    }

    /// Element by id.
    pub fn elm(&self, id: ElmId) -> &Elm {
        &self.pool[id]
    }

    /// Coefficient value by id.
    pub fn value(&self, id: ElmId) -> f64 {
        self.pool[id].value
    }

    /// Mutable coefficient value by id.
    pub fn value_mut(&mut self, id: ElmId) -> &mut f64 {
        &mut self.pool[id].value
    }

    /// Pivot element of solution-order row `k`.
    pub fn diag(&self, k: usize) -> ElmId {
        self.diag[k]
    }

    /// Reset the structure for `n` equations.
    ///
    /// All previous elements are discarded, the ordering becomes the
    /// identity and each row is seeded with a zero diagonal.
    pub fn initeqn(&mut self, n: usize) {
        self.pool.clear();
        self.order = None;
        self.varord = (0..n).collect();
        self.diag = (0..n).map(|i| self.pool.alloc(i, i)).collect();
        self.rowst = self.diag.clone();
        self.rhs = vec![0.0; n];
    }

    /// Return the unique element at (`row`, `col`), creating it if absent.
    ///
    /// A new element is linked into both its column and row lists at the
    /// position that keeps solution order. When `reuse` is given, that
    /// (already allocated, currently unlinked) element is linked instead of
    /// a fresh one; reordering uses this to relink elements in place.
    pub fn getelm(&mut self, row: usize, col: usize, reuse: Option<ElmId>) -> ElmId {
        let vrow = self.varord[row];
        let vcol = self.varord[col];

        if vrow == vcol {
            return self.diag[vrow];
        }

        let new_elm;
        if vrow > vcol {
            // Lower triangle: search downward from diag[vcol]
            let mut el = self.diag[vcol];
            loop {
                match self.pool[el].r_down {
                    None => break,
                    Some(next) if self.pool[next].row == row => return next,
                    Some(next) if self.varord[self.pool[next].row] > vrow => break,
                    Some(next) => el = next,
                }
            }

            new_elm = self.claim(row, col, reuse);
            let below = self.pool[el].r_down;
            self.pool[new_elm].r_down = below;
            self.pool[el].r_down = Some(new_elm);
            self.pool[new_elm].r_up = Some(el);
            if let Some(below) = below {
                self.pool[below].r_up = Some(new_elm);
            }

            // Search leftward from diag[vrow]
            let mut el = self.diag[vrow];
            while let Some(next) = self.pool[el].c_left {
                if self.varord[self.pool[next].col] < vcol {
                    break;
                }
                el = next;
            }

            let left = self.pool[el].c_left;
            self.pool[new_elm].c_left = left;
            self.pool[el].c_left = Some(new_elm);
            self.pool[new_elm].c_right = Some(el);
            match left {
                Some(left) => self.pool[left].c_right = Some(new_elm),
                None => self.rowst[vrow] = new_elm,
            }
        } else {
            // Upper triangle: search upward from diag[vcol]
            let mut el = self.diag[vcol];
            loop {
                match self.pool[el].r_up {
                    None => break,
                    Some(next) if self.pool[next].row == row => return next,
                    Some(next) if self.varord[self.pool[next].row] < vrow => break,
                    Some(next) => el = next,
                }
            }

            new_elm = self.claim(row, col, reuse);
            let above = self.pool[el].r_up;
            self.pool[new_elm].r_up = above;
            self.pool[el].r_up = Some(new_elm);
            self.pool[new_elm].r_down = Some(el);
            if let Some(above) = above {
                self.pool[above].r_down = Some(new_elm);
            }

            // Search rightward from diag[vrow]
            let mut el = self.diag[vrow];
            while let Some(next) = self.pool[el].c_right {
                if self.varord[self.pool[next].col] > vcol {
                    break;
                }
                el = next;
            }

            let right = self.pool[el].c_right;
            self.pool[new_elm].c_right = right;
            self.pool[el].c_right = Some(new_elm);
            self.pool[new_elm].c_left = Some(el);
            if let Some(right) = right {
                self.pool[right].c_left = Some(new_elm);
            }
        }

        self.pool[new_elm].row = row;
        self.pool[new_elm].col = col;
        new_elm
    }

    /// Take the element to link: the reused one, or a fresh zero element.
    /// A fresh element raises its row's fill count while ordering runs.
    fn claim(&mut self, row: usize, col: usize, reuse: Option<ElmId>) -> ElmId {
        match reuse {
            Some(id) => id,
            None => {
                let id = self.pool.alloc(row, col);
                if let Some(order) = self.order.as_mut() {
                    order.increase(row);
                }
                id
            }
        }
    }

    /// Iterate the elements of solution-order row `k`, left to right.
    pub fn row_iter(&self, k: usize) -> impl Iterator<Item = ElmId> + '_ {
        std::iter::successors(Some(self.rowst[k]), move |&el| self.pool[el].c_right)
    }

    /// Iterate the elements strictly below the pivot of solution-order column `k`.
    pub fn below_diag(&self, k: usize) -> impl Iterator<Item = ElmId> + '_ {
        std::iter::successors(self.pool[self.diag[k]].r_down, move |&el| self.pool[el].r_down)
    }

    /// Verify that every link agrees with `varord`.
    pub fn check_consistency(&self) -> bool {
        let n = self.neqn();
        if self.varord.len() != n || self.rowst.len() != n {
            return false;
        }
        for i in 0..n {
            let d = &self.pool[self.diag[i]];
            if d.row != d.col || self.varord[d.row] != i {
                return false;
            }
            if self.pool[self.rowst[i]].row != d.row {
                return false;
            }

            let mut el = Some(self.rowst[i]);
            let mut first = true;
            while let Some(e) = el {
                let elm = &self.pool[e];
                if first {
                    if elm.c_left.is_some() {
                        return false;
                    }
                    first = false;
                } else {
                    let Some(left) = elm.c_left else {
                        return false;
                    };
                    let left = &self.pool[left];
                    if left.c_right != Some(e) || self.varord[left.col] >= self.varord[elm.col] {
                        return false;
                    }
                }
                el = elm.c_right;
            }

            let mut el = d.r_down;
            while let Some(e) = el {
                let elm = &self.pool[e];
                let Some(up) = elm.r_up else {
                    return false;
                };
                let up = &self.pool[up];
                if up.r_down != Some(e) || self.varord[up.row] >= self.varord[elm.row] {
                    return false;
                }
                el = elm.r_down;
            }

            let mut el = d.r_up;
            while let Some(e) = el {
                let elm = &self.pool[e];
                let Some(down) = elm.r_down else {
                    return false;
                };
                let down = &self.pool[down];
                if down.r_up != Some(e) || self.varord[down.row] <= self.varord[elm.row] {
                    return false;
                }
                el = elm.r_up;
            }
        }
        true
    }
}

impl fmt::Display for SparseMatrix {
    /// Print the nonzero pattern in solution order, one row per line,
    /// prefixed by the logical row and its solution position.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.neqn();
        for i in 0..n {
            let mut line = vec![b' '; n];
            for el in self.row_iter(i) {
                line[self.varord[self.pool[el].col]] = b'*';
            }
            writeln!(
                f,
                "{:3} {:3} {}",
                self.pool[self.diag[i]].row,
                i,
                String::from_utf8_lossy(&line).trim_end()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initeqn_seeds_diagonal() {
        let mut m = SparseMatrix::new();
        m.initeqn(4);
        assert_eq!(m.neqn(), 4);
        assert_eq!(m.element_count(), 4);
        for i in 0..4 {
            assert_eq!(m.varord()[i], i);
            let d = m.elm(m.diag(i));
            assert_eq!((d.row, d.col, d.value), (i, i, 0.0));
        }
        assert!(m.check_consistency());
    }

    #[test]
    fn test_getelm_identity_is_stable() {
        let mut m = SparseMatrix::new();
        m.initeqn(5);
        let a = m.getelm(3, 1, None);
        let b = m.getelm(1, 3, None);
        m.getelm(4, 1, None);
        m.getelm(2, 1, None);
        m.getelm(3, 0, None);
        m.getelm(3, 4, None);
        assert_eq!(m.getelm(3, 1, None), a);
        assert_eq!(m.getelm(1, 3, None), b);
        assert_eq!(m.getelm(2, 2, None), m.diag(2));
        assert_eq!(m.element_count(), 5 + 6);
        assert!(m.check_consistency());
    }

    #[test]
    fn test_getelm_keeps_rows_and_columns_ordered() {
        let mut m = SparseMatrix::new();
        m.initeqn(4);
        // Insert out of order
        m.getelm(0, 3, None);
        m.getelm(0, 1, None);
        m.getelm(0, 2, None);
        m.getelm(3, 0, None);
        m.getelm(1, 0, None);

        let cols: Vec<usize> = m.row_iter(0).map(|e| m.elm(e).col).collect();
        assert_eq!(cols, vec![0, 1, 2, 3]);
        let rows: Vec<usize> = m.below_diag(0).map(|e| m.elm(e).row).collect();
        assert_eq!(rows, vec![1, 3]);
        assert!(m.check_consistency());
    }

    #[test]
    fn test_getelm_updates_row_start() {
        let mut m = SparseMatrix::new();
        m.initeqn(3);
        let e = m.getelm(2, 0, None);
        assert_eq!(m.row_iter(2).next(), Some(e));
    }

    #[test]
    fn test_pattern_display() {
        let mut m = SparseMatrix::new();
        m.initeqn(3);
        m.getelm(0, 2, None);
        m.getelm(2, 1, None);
        let text = m.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["  0   0 * *", "  1   1  *", "  2   2  **"]);
    }
}
