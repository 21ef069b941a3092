//! Solver configuration.

use super::{CONVERGE, MAXCHANGE, MAXITERS, MAXSTEPS, NEGATIVE_TOLERANCE, NIT, SS_DT, STEP, ZERO};

/// Tolerances and iteration caps shared by the sparse, Newton and
/// steady-state drivers.
///
/// The defaults reproduce the classic constants exported from
/// [`crate::solver`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Maximum passes of the sparse fixed-point loop.
    pub max_steps: usize,
    /// Convergence tolerance on the state change.
    pub converge: f64,
    /// Maximum Newton-Raphson iterations.
    pub max_iters: usize,
    /// Relative change that triggers a new Jacobian.
    pub max_change: f64,
    /// Residual norm regarded as zero.
    pub zero: f64,
    /// Minimum finite-difference increment.
    pub step: f64,
    /// Time step used for steady-state solves.
    pub ss_dt: f64,
    /// Clamp-and-resolve passes of the steady-state wrapper.
    pub ss_passes: usize,
    /// Threshold below which a state counts as negative.
    pub negative_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_steps: MAXSTEPS,
            converge: CONVERGE,
            max_iters: MAXITERS,
            max_change: MAXCHANGE,
            zero: ZERO,
            step: STEP,
            ss_dt: SS_DT,
            ss_passes: NIT,
            negative_tolerance: NEGATIVE_TOLERANCE,
        }
    }
}

impl SolverConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of sparse fixed-point passes.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set the convergence tolerance.
    ///
    /// Applies both to `Σ|Δs|` in the sparse loop and to the relative
    /// Newton step.
    pub fn with_converge(mut self, converge: f64) -> Self {
        self.converge = converge;
        self
    }

    /// Set the maximum Newton-Raphson iterations.
    pub fn with_max_iters(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Set the relative change that forces a Jacobian rebuild.
    ///
    /// `0.0` rebuilds on every iteration (full Newton); large values keep
    /// the first factorization for the whole solve (chord method).
    pub fn with_max_change(mut self, max_change: f64) -> Self {
        self.max_change = max_change;
        self
    }

    /// Set the residual norm regarded as zero.
    pub fn with_zero(mut self, zero: f64) -> Self {
        self.zero = zero;
        self
    }

    /// Set the minimum finite-difference increment.
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Set the steady-state time step.
    pub fn with_ss_dt(mut self, ss_dt: f64) -> Self {
        self.ss_dt = ss_dt;
        self
    }

    /// Set the number of clamp-and-resolve passes.
    pub fn with_ss_passes(mut self, ss_passes: usize) -> Self {
        self.ss_passes = ss_passes;
        self
    }

    /// Set the threshold below which a state is clamped to zero.
    pub fn with_negative_tolerance(mut self, negative_tolerance: f64) -> Self {
        self.negative_tolerance = negative_tolerance;
        self
    }
}
