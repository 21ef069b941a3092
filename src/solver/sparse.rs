//! Two-phase sparse solver driven by an equation callback.

use std::any::TypeId;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use log::{debug, trace};

use super::config::SolverConfig;
use super::matrix::{ElmId, SparseMatrix};
use crate::error::{KineticError, Result};

/// Fingerprint of the callback that built a sparse structure.
///
/// Two schemes with the same key must request the same elements in the
/// same order. A different key forces a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemeKey(u64);

impl SchemeKey {
    /// Key from an explicit value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Key derived from a type's identity.
    pub fn of<T: ?Sized + 'static>() -> Self {
        let mut hasher = DefaultHasher::new();
        TypeId::of::<T>().hash(&mut hasher);
        Self(hasher.finish())
    }

    /// Raw key value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Time at which the equations are assembled and the step being taken.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Step {
    /// Current time
    pub t: f64,
    /// Time step
    pub dt: f64,
}

impl Step {
    pub fn new(t: f64, dt: f64) -> Self {
        Self { t, dt }
    }
}

/// What an element request does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Answer from the recorded coefficient slots
    #[default]
    Solve,
    /// Create the element and count the request
    Count,
    /// Record the element's slot in call order
    Build,
}

/// Equation callback.
///
/// `assemble` fills the Newton system for one pass: `rhs(i)` receives the
/// residual of equation `i` and `elm(i, j)` its derivative with respect to
/// variable `j`, sign chosen so that solving gives the state *increment*.
/// Coefficients and right-hand side are zero on entry.
///
/// The element requests must come in the same order and number on every
/// call for a given [`key`](Scheme::key).
pub trait Scheme {
    /// Structure fingerprint.
    fn key(&self) -> SchemeKey;

    /// Fill coefficients and right-hand side.
    fn assemble(&mut self, eq: &mut Equations<'_>, data: &[f64], step: Step);
}

impl<F> Scheme for F
where
    F: FnMut(&mut Equations<'_>, &[f64], Step) + 'static,
{
    fn key(&self) -> SchemeKey {
        SchemeKey::of::<F>()
    }

    fn assemble(&mut self, eq: &mut Equations<'_>, data: &[f64], step: Step) {
        self(eq, data, step)
    }
}

/// Element accessor handed to [`Scheme::assemble`].
pub struct Equations<'a> {
    matrix: &'a mut SparseMatrix,
    coef_list: &'a mut Vec<ElmId>,
    phase: Phase,
    ngetcall: usize,
    scratch: f64,
    out_of_range: Option<(usize, usize)>,
}

impl<'a> Equations<'a> {
    fn new(matrix: &'a mut SparseMatrix, coef_list: &'a mut Vec<ElmId>, phase: Phase) -> Self {
        Self {
            matrix,
            coef_list,
            phase,
            ngetcall: 0,
            scratch: 0.0,
            out_of_range: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of equations.
    pub fn neqn(&self) -> usize {
        self.matrix.neqn()
    }

    /// Coefficient of variable `col` in equation `row`.
    pub fn elm(&mut self, row: usize, col: usize) -> &mut f64 {
        let call = self.ngetcall;
        self.ngetcall += 1;

        let n = self.matrix.neqn();
        if row >= n || col >= n {
            if self.out_of_range.is_none() {
                self.out_of_range = Some((row, col));
            }
            return &mut self.scratch;
        }

        match self.phase {
            Phase::Solve => match self.coef_list.get(call) {
                Some(&id) => self.matrix.value_mut(id),
                None => &mut self.scratch,
            },
            Phase::Count => {
                let id = self.matrix.getelm(row, col, None);
                self.matrix.value_mut(id)
            }
            Phase::Build => {
                let id = self.matrix.getelm(row, col, None);
                self.coef_list.push(id);
                self.matrix.value_mut(id)
            }
        }
    }

    /// Right-hand side of equation `row`.
    pub fn rhs(&mut self, row: usize) -> &mut f64 {
        let n = self.matrix.neqn();
        if row >= n {
            if self.out_of_range.is_none() {
                self.out_of_range = Some((row, row));
            }
            return &mut self.scratch;
        }
        &mut self.matrix.rhs_mut()[row]
    }

    /// Number of element requests made, or the first bad index.
    fn finish(self) -> Result<usize> {
        if let Some((row, col)) = self.out_of_range {
            return Err(KineticError::dimension(format!(
                "element ({}, {}) outside a system of {} equations",
                row,
                col,
                self.matrix.neqn()
            )));
        }
        Ok(self.ngetcall)
    }
}

/// Sparse solver context.
///
/// Owns the matrix and the coefficient-slot cache for one scheme. Keep one
/// per thread; a built context may be cloned to skip the symbolic phase on
/// other threads.
#[derive(Debug, Clone, Default)]
pub struct SparseObj {
    matrix: SparseMatrix,
    coef_list: Vec<ElmId>,
    key: Option<SchemeKey>,
    config: SolverConfig,
}

impl SparseObj {
    /// Create an empty context with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty context with the given configuration.
    pub fn with_config(config: SolverConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Solver configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// The ordered matrix.
    pub fn matrix(&self) -> &SparseMatrix {
        &self.matrix
    }

    /// Solution of the last linear solve, indexed by variable.
    pub fn rhs(&self) -> &[f64] {
        self.matrix.rhs()
    }

    /// Number of recorded coefficient slots.
    pub fn coef_count(&self) -> usize {
        self.coef_list.len()
    }

    /// Key of the scheme that built the current structure.
    pub fn key(&self) -> Option<SchemeKey> {
        self.key
    }

    /// Make sure the structure matches `scheme` and `n`, building it if not.
    fn prepare<S: Scheme + ?Sized>(
        &mut self,
        n: usize,
        scheme: &mut S,
        data: &[f64],
        step: Step,
    ) -> Result<()> {
        let key = scheme.key();
        if self.key == Some(key) && self.matrix.neqn() == n {
            return Ok(());
        }
        self.key = None;
        self.create_coef_list(n, scheme, data, step)?;
        self.key = Some(key);
        Ok(())
    }

    /// Symbolic phase: discover the pattern, order it and record the slots.
    fn create_coef_list<S: Scheme + ?Sized>(
        &mut self,
        n: usize,
        scheme: &mut S,
        data: &[f64],
        step: Step,
    ) -> Result<()> {
        self.matrix.initeqn(n);
        self.coef_list.clear();

        let mut eq = Equations::new(&mut self.matrix, &mut self.coef_list, Phase::Count);
        scheme.assemble(&mut eq, data, step);
        let count = eq.finish()?;

        self.matrix.spar_minorder();

        self.coef_list.reserve_exact(count);
        let mut eq = Equations::new(&mut self.matrix, &mut self.coef_list, Phase::Build);
        scheme.assemble(&mut eq, data, step);
        let got = eq.finish()?;
        if got != count {
            return Err(KineticError::PatternMismatch {
                expected: count,
                got,
            });
        }

        debug!(
            "built sparse structure: {} equations, {} coefficient slots, {} elements",
            n,
            count,
            self.matrix.element_count()
        );
        Ok(())
    }

    /// Zero every coefficient and the right-hand side.
    fn init_coef_list(&mut self) {
        for k in 0..self.matrix.neqn() {
            let row: Vec<ElmId> = self.matrix.row_iter(k).collect();
            for el in row {
                *self.matrix.value_mut(el) = 0.0;
            }
        }
        self.matrix.rhs_mut().fill(0.0);
    }

    /// Numeric phase assembly through the recorded slots.
    fn assemble<S: Scheme + ?Sized>(&mut self, scheme: &mut S, data: &[f64], step: Step) -> Result<()> {
        self.init_coef_list();
        let mut eq = Equations::new(&mut self.matrix, &mut self.coef_list, Phase::Solve);
        scheme.assemble(&mut eq, data, step);
        let got = eq.finish()?;
        if got != self.coef_list.len() {
            return Err(KineticError::PatternMismatch {
                expected: self.coef_list.len(),
                got,
            });
        }
        Ok(())
    }

    /// Advance the states of a kinetic scheme by one implicit step.
    ///
    /// `state[i]` and `deriv[i]` index the value and derivative of variable
    /// `i` in `data`. During the solve `data[deriv[i]]` holds the state at
    /// the start of the step, so the callback can form `(s - s_old) / dt`;
    /// on return it holds `(s_new - s_old) / dt`.
    ///
    /// With `linflag` the system is treated as linear and solved once.
    /// Otherwise passes repeat until `Σ|Δs|` drops to the convergence
    /// tolerance, clamping negative states to zero after each pass.
    #[allow(clippy::too_many_arguments)]
    pub fn sparse<S: Scheme + ?Sized>(
        &mut self,
        n: usize,
        state: &[usize],
        deriv: &[usize],
        data: &mut [f64],
        step: Step,
        scheme: &mut S,
        linflag: bool,
    ) -> Result<()> {
        check_time_step(step.dt)?;
        check_slots("state", n, state, data.len())?;
        check_slots("derivative", n, deriv, data.len())?;
        self.prepare(n, scheme, data, step)?;

        for i in 0..n {
            data[deriv[i]] = data[state[i]];
        }

        let mut err = 1.0;
        let mut j = 0;
        while err > self.config.converge {
            self.assemble(scheme, data, step)?;
            self.matrix.matsol()?;

            err = 0.0;
            for (i, &dx) in self.matrix.rhs().iter().enumerate() {
                let s = &mut data[state[i]];
                *s += dx;
                if !linflag && *s < 0.0 {
                    *s = 0.0;
                }
                err += dx.abs();
            }
            trace!("sparse pass {}: err = {:e}", j, err);

            if j > self.config.max_steps {
                return Err(KineticError::ExceedIters { iterations: j + 1 });
            }
            if linflag {
                break;
            }
            j += 1;
        }

        // Leave the callback's side of the system consistent with the result
        self.assemble(scheme, data, step)?;
        for i in 0..n {
            data[deriv[i]] = (data[state[i]] - data[deriv[i]]) / step.dt;
        }
        Ok(())
    }

    /// Solve the linear system `A x = b` assembled by `scheme` once and
    /// store `x[i]` into `data[x[i]]`.
    pub fn solve_linear<S: Scheme + ?Sized>(
        &mut self,
        n: usize,
        x: &[usize],
        data: &mut [f64],
        scheme: &mut S,
    ) -> Result<()> {
        check_slots("solution", n, x, data.len())?;
        let step = Step::default();
        self.prepare(n, scheme, data, step)?;
        self.assemble(scheme, data, step)?;
        self.matrix.matsol()?;
        for (i, &v) in self.matrix.rhs().iter().enumerate() {
            data[x[i]] = v;
        }
        Ok(())
    }
}

impl fmt::Display for SparseObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.matrix)
    }
}

pub(super) fn check_time_step(dt: f64) -> Result<()> {
    if dt > 0.0 && dt.is_finite() {
        Ok(())
    } else {
        Err(KineticError::InvalidTimeStep { dt })
    }
}

fn check_slots(what: &str, n: usize, slots: &[usize], len: usize) -> Result<()> {
    if slots.len() < n {
        return Err(KineticError::dimension(format!(
            "{} index has {} entries for {} equations",
            what,
            slots.len(),
            n
        )));
    }
    if let Some(&bad) = slots[..n].iter().find(|&&s| s >= len) {
        return Err(KineticError::dimension(format!(
            "{} slot {} outside data of length {}",
            what, bad, len
        )));
    }
    Ok(())
}
