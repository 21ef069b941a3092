//! Newton-Raphson iteration for nonlinear systems.
//!
//! The Jacobian is built by central finite differences and factored with
//! [`crout`]; it is rebuilt only while the solution still moves by more than
//! the configured relative change, so the tail of a solve runs as a chord
//! iteration on the last factorization.

use log::{debug, trace};

use super::config::SolverConfig;
use super::crout::{crout, solve, DenseMatrix};
use crate::error::{KineticError, Result};

/// Reusable Newton-Raphson workspace.
///
/// One per thread. Buffers are sized on construction and regrown if a
/// larger system is passed to [`newton`](NewtonSpace::newton).
#[derive(Debug, Clone)]
pub struct NewtonSpace {
    delta_x: Vec<f64>,
    jacobian: DenseMatrix,
    perm: Vec<usize>,
    high_value: Vec<f64>,
    low_value: Vec<f64>,
    rowmax: Vec<f64>,
    config: SolverConfig,
}

impl NewtonSpace {
    /// Workspace for `n` equations with default configuration.
    pub fn new(n: usize) -> Self {
        Self::with_config(n, SolverConfig::default())
    }

    /// Workspace for `n` equations with the given configuration.
    pub fn with_config(n: usize, config: SolverConfig) -> Self {
        Self {
            delta_x: vec![0.0; n],
            jacobian: DenseMatrix::new(n),
            perm: vec![0; n],
            high_value: vec![0.0; n],
            low_value: vec![0.0; n],
            rowmax: vec![0.0; n],
            config,
        }
    }

    /// Number of equations the buffers are sized for.
    pub fn size(&self) -> usize {
        self.jacobian.size()
    }

    /// Solver configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// The last factored Jacobian.
    pub fn jacobian(&self) -> &DenseMatrix {
        &self.jacobian
    }

    fn resize(&mut self, n: usize) {
        if self.size() != n {
            *self = Self::with_config(n, self.config);
        }
    }

    /// Variable `i`'s slot in `data`.
    fn slot(index: Option<&[usize]>, i: usize) -> usize {
        index.map_or(i, |idx| idx[i])
    }

    /// Fill the Jacobian by central differences around the current `data`.
    ///
    /// The increment for variable `j` is `max(|0.02 x_j|, step)`. The
    /// variable is restored and the residual re-evaluated afterwards, so
    /// `value` ends consistent with `data`.
    fn buildjacobian<F>(
        &mut self,
        n: usize,
        index: Option<&[usize]>,
        data: &mut [f64],
        residual: &mut F,
        value: &mut [f64],
    ) where
        F: FnMut(&mut [f64], &mut [f64]),
    {
        for j in 0..n {
            let x = Self::slot(index, j);
            let increment = (0.02 * data[x]).abs().max(self.config.step);

            data[x] += increment;
            residual(data, value);
            self.high_value[..n].copy_from_slice(&value[..n]);

            data[x] -= 2.0 * increment;
            residual(data, value);
            self.low_value[..n].copy_from_slice(&value[..n]);

            for i in 0..n {
                self.jacobian[(i, j)] = (self.high_value[i] - self.low_value[i]) / (2.0 * increment);
            }

            data[x] += increment;
            residual(data, value);
        }
    }

    /// Solve `f(x) = 0`.
    ///
    /// `residual(data, value)` writes `f_i` into `value[i]`, reading the
    /// unknowns from `data` (at `index[i]`, or at `i` when `index` is
    /// `None`). On success `data` holds the root. On failure it holds the
    /// last iterate.
    ///
    /// # Errors
    ///
    /// `Singular` if the Jacobian cannot be factored, `ExceedIters` if the
    /// iteration cap is reached without convergence.
    pub fn newton<F>(
        &mut self,
        n: usize,
        index: Option<&[usize]>,
        data: &mut [f64],
        mut residual: F,
        value: &mut [f64],
    ) -> Result<()>
    where
        F: FnMut(&mut [f64], &mut [f64]),
    {
        if value.len() < n || index.map_or(data.len() < n, |idx| idx.len() < n) {
            return Err(KineticError::dimension(format!(
                "newton buffers too small for {} equations",
                n
            )));
        }
        if let Some(&bad) = index.and_then(|idx| idx[..n].iter().find(|&&s| s >= data.len())) {
            return Err(KineticError::dimension(format!(
                "newton index {} outside data of length {}",
                bad,
                data.len()
            )));
        }
        self.resize(n);

        let config = self.config;
        // Forces a factorization on the first iteration
        let mut change = f64::INFINITY;
        for count in 1..=config.max_iters {
            if change > config.max_change {
                debug!("newton iteration {}: rebuilding jacobian (change {:e})", count, change);
                self.buildjacobian(n, index, data, &mut residual, value);
                for v in value[..n].iter_mut() {
                    *v = -*v;
                }
                crout(&mut self.jacobian, &mut self.perm, &mut self.rowmax)?;
            }
            solve(&self.jacobian, value, &self.perm, &mut self.delta_x, None);

            change = 0.0;
            for i in 0..n {
                let x = &mut data[Self::slot(index, i)];
                let dx = self.delta_x[i];
                if x.abs() > config.zero {
                    change = f64::max(change, (dx / *x).abs());
                }
                *x += dx;
            }

            residual(data, value);
            let mut max_dev: f64 = 0.0;
            for v in value[..n].iter_mut() {
                *v = -*v;
                max_dev = max_dev.max(v.abs());
            }
            trace!(
                "newton iteration {}: change = {:e}, max deviation = {:e}",
                count,
                change,
                max_dev
            );

            if change <= config.converge && max_dev <= config.zero {
                return Ok(());
            }
        }

        Err(KineticError::ExceedIters {
            iterations: config.max_iters,
        })
    }
}
