//! Sparse, dense and Newton-Raphson solvers for kinetic schemes.
//!
//! This module provides the numerical engine behind every kinetic-scheme
//! integration step.
//!
//! ## Two-phase sparse solve
//!
//! A kinetic scheme reduces, at each time step, to a linear system
//! `A Δs = b` whose sparsity pattern never changes. The engine splits the
//! work in two:
//!
//! - the **symbolic phase** runs once per scheme: the equation callback is
//!   invoked to discover the pattern, a minimum-degree ordering is computed
//!   and all fill-in is pre-created, and the address of every coefficient the
//!   callback touches is recorded in call order;
//! - the **numeric phase** runs every step: coefficients are zeroed, the
//!   callback refills them through the recorded slots, and the ordered graph
//!   is factored and back-substituted with no searching.
//!
//! ```text
//!   first call                 every call
//!   ----------                 ----------
//!   count getelm calls         zero coefficients
//!   minimum-degree order       callback -> coef_list slots
//!   record coefficient slots   matsol (subrow + bksub)
//!                              state += rhs
//! ```
//!
//! The Newton driver wraps the same idea one level up for fully nonlinear
//! systems, re-factoring its finite-difference Jacobian only when the
//! solution moves by more than [`MAXCHANGE`].

mod config;
mod crout;
mod matrix;
mod matsol;
mod minorder;
mod newton;
mod simulator;
mod sparse;
mod steady;

pub use config::SolverConfig;
pub use crout::{crout, solve, DenseMatrix};
pub use matrix::{Elm, ElmId, SparseMatrix};
pub use newton::NewtonSpace;
pub use simulator::{Simulator, TimeCourse};
pub use sparse::{Equations, Phase, Scheme, SchemeKey, SparseObj, Step};
pub use steady::{derivimplicit, ss_derivimplicit, ss_sparse};

/// Minimal pivot magnitude before a matrix is considered singular.
pub const ROUNDOFF: f64 = 1e-20;

/// Convergence tolerance for the sparse fixed-point loop and Newton steps.
pub const CONVERGE: f64 = 1e-6;

/// Maximum passes of the sparse fixed-point loop.
pub const MAXSTEPS: usize = 20;

/// Maximum Newton-Raphson iterations.
pub const MAXITERS: usize = 50;

/// Relative change in the solution that forces a new Jacobian.
pub const MAXCHANGE: f64 = 0.05;

/// Residual norm regarded as zero by Newton-Raphson.
pub const ZERO: f64 = 1e-8;

/// Minimum finite-difference increment.
pub const STEP: f64 = 1e-6;

/// Time step used to drive a scheme to steady state.
pub const SS_DT: f64 = 1e9;

/// Maximum clamp-and-resolve passes of the steady-state wrapper.
pub const NIT: usize = 7;

/// States below this value are clamped to zero by the steady-state wrapper.
pub const NEGATIVE_TOLERANCE: f64 = -1e-6;
