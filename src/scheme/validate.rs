//! Scheme validation.

use log::warn;

use super::KineticScheme;
use crate::error::{KineticError, Result};

/// Validate a scheme for simulation.
///
/// Checks:
/// - There is at least one species and one reaction
/// - Every reaction changes some species
/// - Initial concentrations are finite and not negative
///
/// Species that take part in nothing and conservation totals that
/// disagree with the initial state only produce warnings.
pub fn validate_scheme(scheme: &KineticScheme) -> Result<()> {
    if scheme.num_species() == 0 {
        return Err(KineticError::topology("scheme declares no species"));
    }

    if scheme.reactions.is_empty() {
        return Err(KineticError::topology("scheme has no reactions"));
    }

    for r in &scheme.reactions {
        if r.net_change().is_empty() {
            return Err(KineticError::topology(format!(
                "reaction at line {} changes no species",
                r.line
            )));
        }
    }

    for (name, &value) in scheme.species_names.iter().zip(&scheme.init) {
        if !value.is_finite() || value < 0.0 {
            return Err(KineticError::topology(format!(
                "initial value of {} must be a non-negative number, got {}",
                name, value
            )));
        }
    }

    scheme.warn_unused_species();

    for (c, err) in scheme
        .conserves
        .iter()
        .zip(scheme.conservation_error(&scheme.init))
    {
        if err.abs() > 1e-9 * c.total.abs().max(1.0) {
            warn!(
                "initial state violates conservation law at line {} by {:e}",
                c.line, err
            );
        }
    }

    Ok(())
}
