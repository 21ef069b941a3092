//! Minimum-degree pivot ordering.
//!
//! Runs once per sparsity pattern. Rows are kept in a list sorted by their
//! current number of entries; the row with the fewest entries becomes the
//! next pivot, is moved into place, and the fill-in its elimination will
//! need is created immediately. Afterwards the numeric phase never has to
//! allocate or search.

use log::debug;

use super::matrix::{Elm, ElmId, SparseMatrix};

#[derive(Debug, Clone)]
struct Item {
    elm: ElmId,
    norder: usize,
    next: Option<usize>,
    prev: Option<usize>,
}

/// Rows not yet pivoted, sorted ascending by fill count.
///
/// A circular doubly linked list over row indices with a sentinel at index
/// `n`. A row is inserted before the first item whose count is greater or
/// equal, so among rows with equal counts the most recently (re)inserted one
/// is popped first. Pivot choice depends on this rule.
#[derive(Debug, Clone)]
pub(super) struct OrderList {
    items: Vec<Item>,
    sentinel: usize,
}

impl OrderList {
    fn new(n: usize, diag: &[ElmId]) -> Self {
        let mut items: Vec<Item> = (0..=n)
            .map(|i| Item {
                elm: diag.get(i).copied().unwrap_or(ElmId(usize::MAX)),
                norder: 0,
                next: None,
                prev: None,
            })
            .collect();
        items[n].next = Some(n);
        items[n].prev = Some(n);
        Self { items, sentinel: n }
    }

    /// First (lowest count) row, if any remain.
    fn head(&self) -> Option<usize> {
        match self.items[self.sentinel].next {
            Some(i) if i != self.sentinel => Some(i),
            _ => None,
        }
    }

    /// Unlink `row`. Rows already removed are left alone.
    fn delete(&mut self, row: usize) {
        let (Some(next), Some(prev)) = (self.items[row].next, self.items[row].prev) else {
            return;
        };
        self.items[next].prev = Some(prev);
        self.items[prev].next = Some(next);
        self.items[row].next = None;
        self.items[row].prev = None;
    }

    /// Link `row` immediately before `before`.
    fn link_before(&mut self, before: usize, row: usize) {
        let prev = self.items[before].prev.unwrap_or(self.sentinel);
        self.items[row].prev = Some(prev);
        self.items[row].next = Some(before);
        self.items[before].prev = Some(row);
        self.items[prev].next = Some(row);
    }

    fn insert(&mut self, row: usize) {
        let norder = self.items[row].norder;
        let mut i = self.items[self.sentinel].next.unwrap_or(self.sentinel);
        while i != self.sentinel && self.items[i].norder < norder {
            i = self.items[i].next.unwrap_or(self.sentinel);
        }
        self.link_before(i, row);
    }

    fn resort(&mut self, row: usize, norder: usize) {
        if self.items[row].next.is_none() {
            // Already pivoted; its count no longer matters.
            self.items[row].norder = norder;
            return;
        }
        self.delete(row);
        self.items[row].norder = norder;
        self.insert(row);
    }

    /// A new element was created in `row`.
    pub(super) fn increase(&mut self, row: usize) {
        let norder = self.items[row].norder + 1;
        self.resort(row, norder);
    }

    /// `row` lost one entry to elimination.
    fn reduce(&mut self, row: usize) {
        let norder = self.items[row].norder.saturating_sub(1);
        self.resort(row, norder);
    }

    /// Rows in list order, for inspection.
    #[cfg(test)]
    fn rows(&self) -> Vec<usize> {
        let mut out = Vec::new();
        let mut i = self.items[self.sentinel].next.unwrap_or(self.sentinel);
        while i != self.sentinel {
            out.push(i);
            i = self.items[i].next.unwrap_or(self.sentinel);
        }
        out
    }
}

impl SparseMatrix {
    /// Compute a minimum-degree solution order and create all fill-in.
    ///
    /// The matrix values are untouched; only links, `varord`, `diag` and
    /// `rowst` change.
    pub fn spar_minorder(&mut self) {
        debug_assert!(self.check_consistency());
        let before = self.element_count();

        self.init_minorder();
        for i in 0..self.neqn() {
            self.get_next_pivot(i);
        }
        self.order = None;

        debug_assert!(self.check_consistency());
        debug!(
            "minimum ordering of {} equations: {} elements, {} fill-in",
            self.neqn(),
            self.element_count(),
            self.element_count() - before
        );
    }

    fn init_minorder(&mut self) {
        let n = self.neqn();
        let mut order = OrderList::new(n, &[]);
        for i in 0..n {
            let count = self.row_iter(i).count();
            let diag = self.diag[i];
            let row = self.pool[diag].row;
            order.items[row].elm = diag;
            order.items[row].norder = count;
            order.insert(row);
        }
        self.order = Some(order);
    }

    /// Promote the lowest-count row to solution position `i` and create the
    /// fill-in its elimination needs.
    fn get_next_pivot(&mut self, i: usize) {
        let Some((row, pivot_elm)) = self
            .order
            .as_ref()
            .and_then(|order| order.head().map(|row| (row, order.items[row].elm)))
        else {
            return;
        };

        let mut j = self.varord[row];
        if j != i {
            debug_assert!(j > i);
            // Push rows i..j down by one and put the new pivot in the hole
            let el = self.rowst[j];
            while j > i {
                self.diag[j] = self.diag[j - 1];
                self.rowst[j] = self.rowst[j - 1];
                self.varord[self.pool[self.diag[j]].row] = j;
                j -= 1;
            }
            self.diag[i] = pivot_elm;
            self.rowst[i] = el;
            self.varord[row] = i;
            self.re_link(i);
        }

        // Ensure every element elimination of this pivot will touch exists
        let below: Vec<ElmId> = self.below_diag(i).collect();
        let right: Vec<usize> = std::iter::successors(self.pool[self.diag[i]].c_right, |&e| {
            self.pool[e].c_right
        })
        .map(|e| self.pool[e].col)
        .collect();
        for el in below {
            let el_row = self.pool[el].row;
            for &col in &right {
                self.getelm(el_row, col, None);
            }
            if let Some(order) = self.order.as_mut() {
                order.reduce(el_row);
            }
        }

        if let Some(order) = self.order.as_mut() {
            order.delete(row);
        }
    }

    /// Restore link order after the pivot moved to position `i`.
    ///
    /// The pivot's row elements are out of order in their columns and the
    /// pivot's column elements are out of order in their rows. Unlink them
    /// all, then relink each one through `getelm`.
    fn re_link(&mut self, i: usize) {
        let diag = self.diag[i];

        let row_elms: Vec<ElmId> = self.row_iter(i).collect();
        for el in row_elms {
            let (up, down) = (self.pool[el].r_up, self.pool[el].r_down);
            if let Some(up) = up {
                self.pool[up].r_down = down;
            }
            if let Some(down) = down {
                self.pool[down].r_up = up;
            }
        }

        let column_elms: Vec<ElmId> = self
            .below_diag(i)
            .chain(std::iter::successors(self.pool[diag].r_up, |&e| {
                self.pool[e].r_up
            }))
            .collect();
        for el in column_elms {
            let (left, right) = (self.pool[el].c_left, self.pool[el].c_right);
            if let Some(right) = right {
                self.pool[right].c_left = left;
            }
            match left {
                Some(left) => self.pool[left].c_right = right,
                None => {
                    if let Some(right) = right {
                        let k = self.varord[self.pool[el].row];
                        self.rowst[k] = right;
                    }
                }
            }
        }

        // Everything is consistent except the unlinked pivot row and column.
        self.rowst[i] = diag;
        let d = self.pool[diag];
        let pivot = &mut self.pool[diag];
        pivot.c_right = None;
        pivot.c_left = None;
        pivot.r_up = None;
        pivot.r_down = None;

        let chains: [(Option<ElmId>, fn(&Elm) -> Option<ElmId>); 4] = [
            (d.c_right, |e: &Elm| e.c_right),
            (d.c_left, |e: &Elm| e.c_left),
            (d.r_up, |e: &Elm| e.r_up),
            (d.r_down, |e: &Elm| e.r_down),
        ];
        for (start, step) in chains {
            let mut el = start;
            while let Some(e) = el {
                el = step(&self.pool[e]);
                let (row, col) = (self.pool[e].row, self.pool[e].col);
                self.getelm(row, col, Some(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Arrow matrix: row 0 and column 0 are full, the rest is diagonal.
    /// Eliminating row 0 first would fill the whole matrix.
    fn arrow(n: usize) -> SparseMatrix {
        let mut m = SparseMatrix::new();
        m.initeqn(n);
        for k in 1..n {
            m.getelm(0, k, None);
            m.getelm(k, 0, None);
        }
        m
    }

    #[test]
    fn test_order_list_ties_favor_latest_insert() {
        let diag: Vec<ElmId> = (0..4).map(ElmId).collect();
        let mut order = OrderList::new(4, &diag);
        for (row, count) in [(0, 2), (1, 1), (2, 2), (3, 1)] {
            order.items[row].norder = count;
            order.insert(row);
        }
        assert_eq!(order.rows(), vec![3, 1, 2, 0]);

        order.reduce(2);
        assert_eq!(order.rows(), vec![2, 3, 1, 0]);
        order.increase(3);
        assert_eq!(order.rows(), vec![2, 1, 3, 0]);
        order.delete(2);
        order.delete(2);
        assert_eq!(order.rows(), vec![1, 3, 0]);
        assert_eq!(order.head(), Some(1));
    }

    #[test]
    fn test_minorder_arrow_matrix_has_no_fill() {
        let mut m = arrow(5);
        let before = m.element_count();
        m.spar_minorder();
        assert_eq!(m.element_count(), before);
        // The dense row is not eliminated until its degree has dropped
        assert!(m.varord()[0] >= 3);
        assert!(m.check_consistency());
    }

    #[test]
    fn test_minorder_permutation_is_bijection() {
        let mut m = SparseMatrix::new();
        m.initeqn(6);
        for (r, c) in [(0, 3), (3, 0), (1, 5), (5, 2), (2, 4), (4, 1), (0, 5), (5, 0)] {
            m.getelm(r, c, None);
        }
        m.spar_minorder();

        let mut seen = vec![false; 6];
        for row in 0..6 {
            let k = m.varord()[row];
            assert!(!seen[k]);
            seen[k] = true;
            assert_eq!(m.elm(m.diag(k)).row, row);
        }
        assert!(m.check_consistency());
    }

    #[test]
    fn test_minorder_equal_degree_tie_break() {
        // Every row has one entry; each insert lands at the head.
        let mut m = SparseMatrix::new();
        m.initeqn(3);
        m.spar_minorder();
        assert_eq!(m.varord(), &[2, 1, 0]);
        assert!(m.check_consistency());
    }

    #[test]
    fn test_minorder_creates_required_fill_in() {
        // Eliminating row 1 first couples rows 0 and 2.
        let mut m = SparseMatrix::new();
        m.initeqn(3);
        m.getelm(0, 1, None);
        m.getelm(1, 0, None);
        m.getelm(1, 2, None);
        m.getelm(2, 1, None);
        m.getelm(0, 0, None);
        let before = m.element_count();
        m.spar_minorder();
        assert!(m.check_consistency());
        // Whatever order was chosen, each pivot's below-column times
        // right-row entries must exist.
        for k in 0..3 {
            let below: Vec<usize> = m.below_diag(k).map(|e| m.elm(e).row).collect();
            let right: Vec<usize> = m
                .row_iter(k)
                .filter(|&e| m.varord()[m.elm(e).col] > k)
                .map(|e| m.elm(e).col)
                .collect();
            for &r in &below {
                for &c in &right {
                    let vr = m.varord()[r];
                    assert!(m.row_iter(vr).any(|e| m.elm(e).col == c));
                }
            }
        }
        assert!(m.element_count() >= before);
    }
}
