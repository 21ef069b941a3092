//! Mass-action reactions.

use std::fmt;

use super::types::{SpeciesId, Stoich};
use crate::error::{KineticError, Result};

/// One reaction step `Σ ν_r R -> Σ ν_p P` (or `<->`).
///
/// The net flux follows the mass-action law:
///
/// ```text
/// flux = kf Π s_r^ν_r - kb Π s_p^ν_p
/// ```
///
/// Species repeated on one side are merged into a single term.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub reactants: Vec<Stoich>,
    pub products: Vec<Stoich>,
    /// Forward rate constant
    pub kf: f64,
    /// Backward rate constant, `None` for an irreversible reaction
    pub kb: Option<f64>,
    /// Source line
    pub line: usize,
}

/// Largest stoichiometric coefficient; powers are taken with `powi`.
pub const MAX_COEFF: u32 = i32::MAX as u32;

/// Merge repeated species on one side, keeping first-appearance order.
///
/// `None` when a merged coefficient exceeds [`MAX_COEFF`].
pub(super) fn merge_terms(terms: impl IntoIterator<Item = Stoich>) -> Option<Vec<Stoich>> {
    let mut out: Vec<Stoich> = Vec::new();
    for term in terms {
        match out.iter_mut().find(|t| t.species == term.species) {
            Some(t) => t.coeff = t.coeff.checked_add(term.coeff)?,
            None => out.push(term),
        }
    }
    out.iter().all(|t| t.coeff <= MAX_COEFF).then_some(out)
}

fn mass_action(side: &[Stoich], s: &[f64]) -> f64 {
    side.iter()
        .map(|t| s[t.species.0].powi(t.coeff as i32))
        .product()
}

fn mass_action_partial(side: &[Stoich], s: &[f64], wrt: SpeciesId) -> f64 {
    let Some(term) = side.iter().find(|t| t.species == wrt) else {
        return 0.0;
    };
    let own = term.coeff as f64 * s[wrt.0].powi(term.coeff as i32 - 1);
    let rest: f64 = side
        .iter()
        .filter(|t| t.species != wrt)
        .map(|t| s[t.species.0].powi(t.coeff as i32))
        .product();
    own * rest
}

impl Reaction {
    /// Build a reaction, merging repeated species on each side.
    ///
    /// Fails with a parse error at `line` when a merged coefficient
    /// exceeds [`MAX_COEFF`].
    pub fn new(
        reactants: Vec<Stoich>,
        products: Vec<Stoich>,
        kf: f64,
        kb: Option<f64>,
        line: usize,
    ) -> Result<Self> {
        let overflow = || {
            KineticError::parse(
                line,
                format!("stoichiometric coefficient exceeds {}", MAX_COEFF),
            )
        };
        Ok(Self {
            reactants: merge_terms(reactants).ok_or_else(overflow)?,
            products: merge_terms(products).ok_or_else(overflow)?,
            kf,
            kb,
            line,
        })
    }

    pub fn is_reversible(&self) -> bool {
        self.kb.is_some()
    }

    /// Species the flux depends on: the reactants, then the products of a
    /// reversible reaction, without repeats.
    pub fn dependencies(&self) -> Vec<SpeciesId> {
        let mut deps: Vec<SpeciesId> = Vec::new();
        let backward = if self.is_reversible() {
            &self.products[..]
        } else {
            &[]
        };
        for t in self.reactants.iter().chain(backward) {
            if !deps.contains(&t.species) {
                deps.push(t.species);
            }
        }
        deps
    }

    /// Net change in each species per unit flux, zero entries dropped.
    pub fn net_change(&self) -> Vec<(SpeciesId, f64)> {
        let mut change: Vec<(SpeciesId, f64)> = Vec::new();
        let terms = self
            .reactants
            .iter()
            .map(|t| (t.species, -(t.coeff as f64)))
            .chain(self.products.iter().map(|t| (t.species, t.coeff as f64)));
        for (species, nu) in terms {
            match change.iter_mut().find(|(s, _)| *s == species) {
                Some((_, v)) => *v += nu,
                None => change.push((species, nu)),
            }
        }
        change.retain(|&(_, nu)| nu != 0.0);
        change
    }

    /// Net reaction flux at state `s`.
    pub fn flux(&self, s: &[f64]) -> f64 {
        let forward = self.kf * mass_action(&self.reactants, s);
        match self.kb {
            Some(kb) => forward - kb * mass_action(&self.products, s),
            None => forward,
        }
    }

    /// `∂flux/∂s_wrt` at state `s`.
    pub fn flux_partial(&self, s: &[f64], wrt: SpeciesId) -> f64 {
        let forward = self.kf * mass_action_partial(&self.reactants, s, wrt);
        match self.kb {
            Some(kb) => forward - kb * mass_action_partial(&self.products, s, wrt),
            None => forward,
        }
    }

    /// The flux is linear in the states.
    pub fn is_first_order(&self) -> bool {
        let order = |side: &[Stoich]| side.iter().map(|t| t.coeff).sum::<u32>();
        order(&self.reactants) == 1 && (!self.is_reversible() || order(&self.products) == 1)
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |terms: &[Stoich]| {
            terms
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(" + ")
        };
        match self.kb {
            Some(kb) => write!(
                f,
                "{} <-> {} ({}, {})",
                side(&self.reactants),
                side(&self.products),
                self.kf,
                kb
            ),
            None => write!(f, "{} -> {} ({})", side(&self.reactants), side(&self.products), self.kf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn st(species: usize, coeff: u32) -> Stoich {
        Stoich {
            species: SpeciesId(species),
            coeff,
        }
    }

    #[test]
    fn test_flux_and_partials() {
        // 2 A + B <-> C (0.5, 0.25)
        let r = Reaction::new(vec![st(0, 2), st(1, 1)], vec![st(2, 1)], 0.5, Some(0.25), 1).unwrap();
        let s = [3.0, 2.0, 4.0];
        assert_abs_diff_eq!(r.flux(&s), 0.5 * 9.0 * 2.0 - 0.25 * 4.0);
        assert_abs_diff_eq!(r.flux_partial(&s, SpeciesId(0)), 0.5 * 2.0 * 3.0 * 2.0);
        assert_abs_diff_eq!(r.flux_partial(&s, SpeciesId(1)), 0.5 * 9.0);
        assert_abs_diff_eq!(r.flux_partial(&s, SpeciesId(2)), -0.25);
        assert!(!r.is_first_order());
    }

    #[test]
    fn test_partials_match_finite_difference() {
        let r = Reaction::new(vec![st(0, 1), st(1, 2)], vec![st(2, 2)], 1.3, Some(0.7), 1).unwrap();
        let s = [0.4, 1.1, 0.9];
        for j in 0..3 {
            let h = 1e-6;
            let mut hi = s;
            let mut lo = s;
            hi[j] += h;
            lo[j] -= h;
            let fd = (r.flux(&hi) - r.flux(&lo)) / (2.0 * h);
            assert_abs_diff_eq!(r.flux_partial(&s, SpeciesId(j)), fd, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_repeated_species_merge() {
        // A + A -> B is 2A -> B
        let r = Reaction::new(vec![st(0, 1), st(0, 1)], vec![st(1, 1)], 1.0, None, 1).unwrap();
        assert_eq!(r.reactants, vec![st(0, 2)]);
        assert_abs_diff_eq!(r.flux(&[3.0, 0.0]), 9.0);
    }

    #[test]
    fn test_merged_coefficient_overflow_rejected() {
        let half = MAX_COEFF / 2 + 1;
        let err = Reaction::new(vec![st(0, half), st(0, half)], vec![st(1, 1)], 1.0, None, 4)
            .unwrap_err();
        assert!(matches!(err, KineticError::ParseError { line: 4, .. }));

        let err = Reaction::new(vec![st(0, 1)], vec![st(1, u32::MAX), st(1, 1)], 1.0, None, 5)
            .unwrap_err();
        assert!(matches!(err, KineticError::ParseError { line: 5, .. }));

        let err = Reaction::new(vec![st(0, MAX_COEFF + 1)], vec![st(1, 1)], 1.0, None, 6)
            .unwrap_err();
        assert!(matches!(err, KineticError::ParseError { line: 6, .. }));

        let r = Reaction::new(vec![st(0, MAX_COEFF)], vec![st(1, 1)], 1.0, None, 7).unwrap();
        assert_eq!(r.reactants, vec![st(0, MAX_COEFF)]);
    }

    #[test]
    fn test_dependencies_and_net_change() {
        // A + B -> 2 B: autocatalytic, B changes by +1
        let r = Reaction::new(vec![st(0, 1), st(1, 1)], vec![st(1, 2)], 1.0, None, 1).unwrap();
        assert_eq!(r.dependencies(), vec![SpeciesId(0), SpeciesId(1)]);
        assert_eq!(r.net_change(), vec![(SpeciesId(0), -1.0), (SpeciesId(1), 1.0)]);

        // Irreversible: products are not dependencies
        let r = Reaction::new(vec![st(2, 1)], vec![st(0, 1)], 1.0, None, 1).unwrap();
        assert_eq!(r.dependencies(), vec![SpeciesId(2)]);
        assert!(r.is_first_order());

        // A catalyst cancels out
        let r = Reaction::new(vec![st(0, 1), st(1, 1)], vec![st(0, 1), st(2, 1)], 1.0, None, 1).unwrap();
        assert_eq!(r.net_change(), vec![(SpeciesId(1), -1.0), (SpeciesId(2), 1.0)]);
    }

    #[test]
    fn test_display() {
        let r = Reaction::new(vec![st(0, 2)], vec![st(1, 1)], 0.5, Some(0.1), 1).unwrap();
        assert_eq!(r.to_string(), "2S0 <-> S1 (0.5, 0.1)");
    }
}
