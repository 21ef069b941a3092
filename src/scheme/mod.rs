//! Kinetic scheme representation and validation.
//!
//! This module provides the internal representation of a reaction scheme
//! after parsing. A [`KineticScheme`] holds the species, the mass-action
//! reactions and the conservation laws, and implements
//! [`Scheme`](crate::solver::Scheme) so the sparse solver can integrate it.

mod network;
mod reaction;
mod types;
mod validate;

pub use network::{Conservation, KineticScheme};
pub use reaction::{Reaction, MAX_COEFF};
pub use types::*;
pub use validate::validate_scheme;
