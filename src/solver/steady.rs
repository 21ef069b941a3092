//! Implicit Euler and steady-state drivers.
//!
//! Steady state is reached by taking one enormous implicit step. A
//! nonlinear scheme can overshoot into negative concentrations on the way,
//! so the nonlinear path first takes single linearized steps, clamps any
//! state that went negative and retries, and only runs the full iteration
//! once a step comes back clean.

use log::{debug, warn};

use super::newton::NewtonSpace;
use super::sparse::{check_time_step, Scheme, SparseObj, Step};
use crate::error::{KineticError, Result};

/// Clamp states below `tolerance` to zero. Returns how many were clamped.
fn check_state(n: usize, state: &[usize], data: &mut [f64], tolerance: f64) -> usize {
    let mut clamped = 0;
    for &s in &state[..n] {
        if data[s] < tolerance {
            data[s] = 0.0;
            clamped += 1;
        }
    }
    clamped
}

/// Drive a kinetic scheme to steady state with the sparse solver.
///
/// With `linflag` the scheme is linear and a single iterated solve at the
/// steady-state time step suffices. Otherwise up to `ss_passes` linearized
/// steps are taken, clamping negative states after each; the first step
/// that needs no clamping is followed by the full nonlinear iteration.
///
/// # Errors
///
/// Solver errors propagate. `ExceedIters` if every pass needed clamping.
#[allow(clippy::too_many_arguments)]
pub fn ss_sparse<S: Scheme + ?Sized>(
    so: &mut SparseObj,
    n: usize,
    state: &[usize],
    deriv: &[usize],
    data: &mut [f64],
    t: f64,
    scheme: &mut S,
    linflag: bool,
) -> Result<()> {
    let config = *so.config();
    let step = Step::new(t, config.ss_dt);

    if linflag {
        return so.sparse(n, state, deriv, data, step, scheme, false);
    }

    for pass in 0..config.ss_passes {
        so.sparse(n, state, deriv, data, step, scheme, true)?;
        let clamped = check_state(n, state, data, config.negative_tolerance);
        if clamped == 0 {
            debug!("steady state: clean linear step after {} passes", pass + 1);
            return so.sparse(n, state, deriv, data, step, scheme, false);
        }
        warn!(
            "steady state pass {}: clamped {} negative states to zero",
            pass + 1,
            clamped
        );
    }

    Err(KineticError::ExceedIters {
        iterations: config.ss_passes,
    })
}

/// One implicit Euler step solved by Newton-Raphson.
///
/// `derivs(data)` must write `ds_i/dt` into `data[deriv[i]]` from the
/// states at `data[state[i]]`. The step solves
/// `f(s) - (s - s_old) / dt = 0`; on return the states hold `s_new` and the
/// derivative slots hold `f(s_new)`.
#[allow(clippy::too_many_arguments)]
pub fn derivimplicit<F>(
    ns: &mut NewtonSpace,
    n: usize,
    state: &[usize],
    deriv: &[usize],
    data: &mut [f64],
    dt: f64,
    mut derivs: F,
) -> Result<()>
where
    F: FnMut(&mut [f64]),
{
    check_time_step(dt)?;
    if state.len() < n || deriv.len() < n {
        return Err(KineticError::dimension(format!(
            "state/derivative index shorter than {} equations",
            n
        )));
    }
    if let Some(&bad) = state[..n].iter().chain(&deriv[..n]).find(|&&s| s >= data.len()) {
        return Err(KineticError::dimension(format!(
            "slot {} outside data of length {}",
            bad,
            data.len()
        )));
    }

    let saved: Vec<f64> = state[..n].iter().map(|&s| data[s]).collect();
    let mut value = vec![0.0; n];
    let residual = |d: &mut [f64], v: &mut [f64]| {
        derivs(d);
        for i in 0..n {
            v[i] = d[deriv[i]] - (d[state[i]] - saved[i]) / dt;
        }
    };
    ns.newton(n, Some(state), data, residual, &mut value)
}

/// Drive an ODE system to steady state with implicit Euler.
///
/// Same clamp-and-retry policy as [`ss_sparse`] around [`derivimplicit`]
/// at the steady-state time step.
pub fn ss_derivimplicit<F>(
    ns: &mut NewtonSpace,
    n: usize,
    state: &[usize],
    deriv: &[usize],
    data: &mut [f64],
    mut derivs: F,
) -> Result<()>
where
    F: FnMut(&mut [f64]),
{
    let config = *ns.config();

    for pass in 0..config.ss_passes {
        derivimplicit(ns, n, state, deriv, data, config.ss_dt, &mut derivs)?;
        let clamped = check_state(n, state, data, config.negative_tolerance);
        if clamped == 0 {
            debug!("steady state: implicit step clean after {} passes", pass + 1);
            return Ok(());
        }
        warn!(
            "steady state pass {}: clamped {} negative states to zero",
            pass + 1,
            clamped
        );
    }

    Err(KineticError::ExceedIters {
        iterations: config.ss_passes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{Equations, SolverConfig};
    use approx::assert_abs_diff_eq;

    /// A <-> B, kf = 0.1, kb = 0.2
    fn two_state(eq: &mut Equations<'_>, data: &[f64], step: Step) {
        let (a, b) = (data[0], data[1]);
        let flux = 0.1 * a - 0.2 * b;
        *eq.rhs(0) = -(a - data[2]) / step.dt - flux;
        *eq.rhs(1) = -(b - data[3]) / step.dt + flux;
        *eq.elm(0, 0) += 1.0 / step.dt + 0.1;
        *eq.elm(0, 1) -= 0.2;
        *eq.elm(1, 0) -= 0.1;
        *eq.elm(1, 1) += 1.0 / step.dt + 0.2;
    }

    /// ds/dt = s (1 - s)
    fn logistic(eq: &mut Equations<'_>, data: &[f64], step: Step) {
        let s = data[0];
        *eq.rhs(0) = -(s - data[1]) / step.dt + s * (1.0 - s);
        *eq.elm(0, 0) += 1.0 / step.dt - (1.0 - 2.0 * s);
    }

    /// ds/dt = -1
    fn drain(eq: &mut Equations<'_>, data: &[f64], step: Step) {
        *eq.rhs(0) = -(data[0] - data[1]) / step.dt - 1.0;
        *eq.elm(0, 0) += 1.0 / step.dt;
    }

    #[test]
    fn test_check_state_clamps_below_tolerance() {
        let mut data = vec![-0.5, -1e-9, 0.3, -2.0];
        let clamped = check_state(3, &[0, 1, 2], &mut data, -1e-6);
        assert_eq!(clamped, 1);
        assert_eq!(data, vec![0.0, -1e-9, 0.3, -2.0]);
    }

    #[test]
    fn test_ss_sparse_linear_equilibrium() {
        let mut so = SparseObj::new();
        let mut data = vec![1.0, 0.0, 0.0, 0.0];
        let mut scheme = two_state;
        ss_sparse(&mut so, 2, &[0, 1], &[2, 3], &mut data, 0.0, &mut scheme, true).unwrap();
        assert_abs_diff_eq!(data[0], 2.0 / 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(data[1], 1.0 / 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(data[1] / data[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_ss_sparse_nonlinear_reaches_stable_root() {
        let mut so = SparseObj::new();
        let mut data = vec![0.6, 0.0];
        let mut scheme = logistic;
        ss_sparse(&mut so, 1, &[0], &[1], &mut data, 0.0, &mut scheme, false).unwrap();
        assert_abs_diff_eq!(data[0], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_ss_sparse_clamps_overshoot() {
        // The first linearized step lands at -0.0125
        let mut so = SparseObj::new();
        let mut data = vec![0.1, 0.0];
        let mut scheme = logistic;
        ss_sparse(&mut so, 1, &[0], &[1], &mut data, 0.0, &mut scheme, false).unwrap();
        assert_eq!(data[0], 0.0);
    }

    #[test]
    fn test_ss_sparse_gives_up_after_all_passes_clamp() {
        let mut so = SparseObj::with_config(SolverConfig::new().with_ss_passes(3));
        let mut data = vec![0.5, 0.0];
        let mut scheme = drain;
        let err = ss_sparse(&mut so, 1, &[0], &[1], &mut data, 0.0, &mut scheme, false).unwrap_err();
        assert!(matches!(err, KineticError::ExceedIters { iterations: 3 }));
    }

    #[test]
    fn test_derivimplicit_decay() {
        let mut ns = NewtonSpace::new(1);
        let mut data = vec![1.0, 0.0];
        derivimplicit(&mut ns, 1, &[0], &[1], &mut data, 0.1, |d: &mut [f64]| {
            d[1] = -2.0 * d[0];
        })
        .unwrap();
        assert_abs_diff_eq!(data[0], 1.0 / 1.2, epsilon = 1e-7);
        assert_abs_diff_eq!(data[1], -2.0 * data[0], epsilon = 1e-12);
    }

    #[test]
    fn test_derivimplicit_rejects_zero_step() {
        let mut ns = NewtonSpace::new(1);
        let mut data = vec![1.0, 0.0];
        let err = derivimplicit(&mut ns, 1, &[0], &[1], &mut data, 0.0, |d: &mut [f64]| {
            d[1] = -d[0];
        })
        .unwrap_err();
        assert!(matches!(err, KineticError::InvalidTimeStep { .. }));
    }

    #[test]
    fn test_ss_sparse_rejects_bad_steady_step() {
        let mut so = SparseObj::with_config(SolverConfig::new().with_ss_dt(f64::INFINITY));
        let mut data = vec![1.0, 0.0, 0.0, 0.0];
        let mut scheme = two_state;
        let err = ss_sparse(&mut so, 2, &[0, 1], &[2, 3], &mut data, 0.0, &mut scheme, true).unwrap_err();
        assert!(matches!(err, KineticError::InvalidTimeStep { .. }));
    }

    #[test]
    fn test_ss_derivimplicit_source_and_decay() {
        let mut ns = NewtonSpace::new(1);
        let mut data = vec![0.0, 0.0];
        ss_derivimplicit(&mut ns, 1, &[0], &[1], &mut data, |d: &mut [f64]| {
            d[1] = 1.0 - 2.0 * d[0];
        })
        .unwrap();
        assert_abs_diff_eq!(data[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_ss_derivimplicit_negative_fixed_point() {
        let mut ns = NewtonSpace::new(1);
        let mut data = vec![0.0, 0.0];
        let err = ss_derivimplicit(&mut ns, 1, &[0], &[1], &mut data, |d: &mut [f64]| {
            d[1] = -1.0 - d[0];
        })
        .unwrap_err();
        assert!(matches!(err, KineticError::ExceedIters { .. }));
        assert_eq!(data[0], 0.0);
    }
}
