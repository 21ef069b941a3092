//! # Kinetic Core
//!
//! Sparse and Newton-Raphson solvers for integrating kinetic schemes.
//!
//! This library provides:
//! - A sparse matrix with incremental, order-preserving element insertion
//!   and a one-time minimum-degree ordering
//! - A two-phase sparse driver that discovers an equation pattern once and
//!   refills it every step through cached coefficient slots
//! - A Newton-Raphson solver with finite-difference Jacobians
//! - Steady-state drivers that keep concentrations non-negative
//! - Mass-action reaction schemes and a small language to describe them
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`dsl`] - Parser for the scheme description language
//! - [`scheme`] - Reaction network representation and validation
//! - [`solver`] - Sparse, dense and Newton solvers and the simulator
//! - [`report`] - Tab-separated output (CLI only)
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! kinetic channel.kin --steady
//! ```
//!
//! ### Library
//!
//! ```
//! use kinetic_core::{dsl, scheme::KineticScheme, Simulator};
//!
//! let ast = dsl::parse(".state C O\n.init C = 1\n~ C <-> O (0.1, 0.2)\n.conserve C + O = 1\n")?;
//! let mut sim = Simulator::new(KineticScheme::from_ast(ast)?);
//! sim.steady_state()?;
//! assert!((sim.states()[1] / sim.states()[0] - 0.5).abs() < 1e-6);
//! # Ok::<(), kinetic_core::KineticError>(())
//! ```
//!
//! Any other equation system can be solved by implementing
//! [`solver::Scheme`] or passing a closure to [`solver::SparseObj::sparse`].
//!
//! ## Integration Method
//!
//! For each time step dt:
//!
//! 1. The scheme fills `A Δs = b` with the backward Euler residual and its
//!    Jacobian
//! 2. The ordered sparse matrix is factored and solved for `Δs`
//! 3. Nonlinear schemes repeat until the change falls below tolerance
//!
//! Steady state is a single step with a very large dt, retried with
//! negative concentrations clamped to zero when a step overshoots.

pub mod dsl;
pub mod error;
pub mod scheme;
pub mod solver;

#[cfg(feature = "cli")]
pub mod report;

// Re-export main types for convenience
pub use error::{KineticError, Result};
pub use scheme::KineticScheme;
pub use solver::{NewtonSpace, Simulator, SparseObj};
