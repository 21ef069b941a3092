//! Reaction network built from a parsed scheme.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use log::warn;

use super::reaction::{Reaction, MAX_COEFF};
use super::types::{SpeciesId, Stoich};
use crate::dsl::{RateExpr, SchemeAst, Term};
use crate::error::{KineticError, Result};
use crate::solver::{Equations, Scheme, SchemeKey, Step};

/// `Σ c_k s_k = total`, replacing the equation of `row`.
#[derive(Debug, Clone, PartialEq)]
pub struct Conservation {
    pub terms: Vec<(SpeciesId, f64)>,
    pub total: f64,
    /// Species whose equation is replaced by this constraint
    pub row: SpeciesId,
    pub line: usize,
}

/// Jacobian pattern of one reaction, fixed at build time.
#[derive(Debug, Clone)]
struct ReactionRows {
    deps: Vec<SpeciesId>,
    change: Vec<(SpeciesId, f64)>,
}

/// A mass-action kinetic scheme ready for simulation.
///
/// Instance data is laid out as `[s_0 .. s_n-1, d_0 .. d_n-1]`: species
/// concentrations followed by one derivative slot per species.
#[derive(Debug, Clone)]
pub struct KineticScheme {
    /// Species names in declaration order
    pub species_names: Vec<String>,
    /// Name lookup
    pub species_map: HashMap<String, SpeciesId>,
    /// Initial concentrations
    pub init: Vec<f64>,
    pub reactions: Vec<Reaction>,
    pub conserves: Vec<Conservation>,
    rows: Vec<ReactionRows>,
    replaced: Vec<bool>,
    key: SchemeKey,
}

impl KineticScheme {
    /// Build a scheme from its parts.
    ///
    /// Each conservation law takes over the equation of its last species
    /// not already claimed by an earlier law.
    pub fn new(
        species_names: Vec<String>,
        init: Vec<f64>,
        reactions: Vec<Reaction>,
        conserves: Vec<(Vec<(SpeciesId, f64)>, f64, usize)>,
    ) -> Result<Self> {
        let n = species_names.len();
        if init.len() != n {
            return Err(KineticError::dimension(format!(
                "{} initial values for {} species",
                init.len(),
                n
            )));
        }

        let mut species_map = HashMap::new();
        for (i, name) in species_names.iter().enumerate() {
            if species_map.insert(name.clone(), SpeciesId(i)).is_some() {
                return Err(KineticError::topology(format!(
                    "species '{}' listed twice",
                    name
                )));
            }
        }

        let in_range = |s: SpeciesId, line: usize| {
            if s.0 < n {
                Ok(())
            } else {
                Err(KineticError::UnknownSpecies {
                    name: s.to_string(),
                    line,
                })
            }
        };
        for r in &reactions {
            for t in r.reactants.iter().chain(&r.products) {
                in_range(t.species, r.line)?;
            }
        }

        let mut replaced = vec![false; n];
        let mut laws = Vec::with_capacity(conserves.len());
        for (terms, total, line) in conserves {
            for &(s, _) in &terms {
                in_range(s, line)?;
            }
            let row = terms
                .iter()
                .rev()
                .map(|&(s, _)| s)
                .find(|s| !replaced[s.0])
                .ok_or_else(|| {
                    KineticError::topology(format!(
                        "conservation law at line {} has no species left whose equation it can replace",
                        line
                    ))
                })?;
            replaced[row.0] = true;
            laws.push(Conservation {
                terms,
                total,
                row,
                line,
            });
        }

        let rows = reactions
            .iter()
            .map(|r| ReactionRows {
                deps: r.dependencies(),
                change: r.net_change(),
            })
            .collect();

        let mut scheme = Self {
            species_names,
            species_map,
            init,
            reactions,
            conserves: laws,
            rows,
            replaced,
            key: SchemeKey::new(0),
        };
        scheme.key = scheme.structure_key();
        Ok(scheme)
    }

    /// Build a scheme from a parsed AST.
    pub fn from_ast(ast: SchemeAst) -> Result<Self> {
        let mut species_map: HashMap<String, SpeciesId> = HashMap::new();
        let mut species_names = Vec::new();
        for decl in &ast.species {
            if species_map.contains_key(&decl.name) {
                return Err(KineticError::DuplicateSpecies {
                    name: decl.name.clone(),
                    line: decl.line,
                });
            }
            species_map.insert(decl.name.clone(), SpeciesId(species_names.len()));
            species_names.push(decl.name.clone());
        }

        let mut params: HashMap<String, f64> = HashMap::new();
        for p in &ast.params {
            if params.insert(p.name.clone(), p.value).is_some() {
                return Err(KineticError::DuplicateParameter {
                    name: p.name.clone(),
                    line: p.line,
                });
            }
        }

        let lookup = |name: &str, line: usize| {
            species_map
                .get(name)
                .copied()
                .ok_or_else(|| KineticError::UnknownSpecies {
                    name: name.to_string(),
                    line,
                })
        };

        let mut init = vec![0.0; species_names.len()];
        for def in &ast.inits {
            let id = lookup(&def.name, def.line)?;
            init[id.0] = def.value;
        }

        let rate = |expr: &RateExpr, line: usize| -> Result<f64> {
            let value = match expr {
                RateExpr::Value(v) => *v,
                RateExpr::Param(name) => {
                    *params
                        .get(name)
                        .ok_or_else(|| KineticError::UnknownParameter {
                            name: name.clone(),
                            line,
                        })?
                }
            };
            if value.is_finite() && value >= 0.0 {
                Ok(value)
            } else {
                Err(KineticError::InvalidRate { value, line })
            }
        };

        let side = |terms: &[Term], line: usize| -> Result<Vec<Stoich>> {
            terms
                .iter()
                .map(|t| {
                    let species = lookup(&t.species, line)?;
                    if t.coeff < 1.0 || t.coeff.fract() != 0.0 || t.coeff > MAX_COEFF as f64 {
                        return Err(KineticError::parse(
                            line,
                            format!(
                                "stoichiometric coefficient of {} must be a positive integer, got {}",
                                t.species, t.coeff
                            ),
                        ));
                    }
                    Ok(Stoich {
                        species,
                        coeff: t.coeff as u32,
                    })
                })
                .collect()
        };

        let mut reactions = Vec::with_capacity(ast.reactions.len());
        for def in &ast.reactions {
            let kf = rate(&def.forward, def.line)?;
            let kb = def
                .backward
                .as_ref()
                .map(|expr| rate(expr, def.line))
                .transpose()?;
            reactions.push(Reaction::new(
                side(&def.reactants, def.line)?,
                side(&def.products, def.line)?,
                kf,
                kb,
                def.line,
            )?);
        }

        let mut conserves = Vec::with_capacity(ast.conserves.len());
        for def in &ast.conserves {
            let mut terms = Vec::with_capacity(def.terms.len());
            for t in &def.terms {
                if !t.coeff.is_finite() || t.coeff == 0.0 {
                    return Err(KineticError::parse(
                        def.line,
                        format!("invalid conservation coefficient {} for {}", t.coeff, t.species),
                    ));
                }
                terms.push((lookup(&t.species, def.line)?, t.coeff));
            }
            conserves.push((terms, def.total, def.line));
        }

        Self::new(species_names, init, reactions, conserves)
    }

    /// Number of species (equations).
    pub fn num_species(&self) -> usize {
        self.species_names.len()
    }

    /// Length of the instance data.
    pub fn data_len(&self) -> usize {
        2 * self.num_species()
    }

    /// Data slots of the species.
    pub fn state_index(&self) -> Vec<usize> {
        (0..self.num_species()).collect()
    }

    /// Data slots of the derivatives.
    pub fn deriv_index(&self) -> Vec<usize> {
        let n = self.num_species();
        (n..2 * n).collect()
    }

    /// Instance data holding the initial concentrations.
    pub fn initial_data(&self) -> Vec<f64> {
        let mut data = vec![0.0; self.data_len()];
        data[..self.num_species()].copy_from_slice(&self.init);
        data
    }

    pub fn species_id(&self, name: &str) -> Option<SpeciesId> {
        self.species_map.get(name).copied()
    }

    pub fn species_name(&self, id: SpeciesId) -> Option<&str> {
        self.species_names.get(id.0).map(String::as_str)
    }

    /// Whether `id`'s equation is replaced by a conservation law.
    pub fn is_conserved_row(&self, id: SpeciesId) -> bool {
        self.replaced.get(id.0).copied().unwrap_or(false)
    }

    /// Every flux is linear in the states, so one Newton pass is exact.
    pub fn is_linear(&self) -> bool {
        self.reactions.iter().all(Reaction::is_first_order)
    }

    /// `ds/dt` at state `s`, ignoring conservation laws.
    pub fn derivatives(&self, s: &[f64], out: &mut [f64]) {
        out[..self.num_species()].fill(0.0);
        for (r, rows) in self.reactions.iter().zip(&self.rows) {
            let flux = r.flux(s);
            for &(sp, nu) in &rows.change {
                out[sp.0] += nu * flux;
            }
        }
    }

    /// Residual of each conservation law at state `s`.
    pub fn conservation_error(&self, s: &[f64]) -> Vec<f64> {
        self.conserves
            .iter()
            .map(|c| c.terms.iter().map(|&(sp, coeff)| coeff * s[sp.0]).sum::<f64>() - c.total)
            .collect()
    }

    fn structure_key(&self) -> SchemeKey {
        let mut hasher = DefaultHasher::new();
        self.num_species().hash(&mut hasher);
        for r in &self.reactions {
            r.reactants.hash(&mut hasher);
            r.products.hash(&mut hasher);
            r.is_reversible().hash(&mut hasher);
        }
        for c in &self.conserves {
            c.row.hash(&mut hasher);
            for (sp, _) in &c.terms {
                sp.hash(&mut hasher);
            }
        }
        SchemeKey::new(hasher.finish())
    }

    /// Warn about species that take part in nothing.
    pub(super) fn warn_unused_species(&self) {
        for (i, name) in self.species_names.iter().enumerate() {
            let id = SpeciesId(i);
            let used = self
                .reactions
                .iter()
                .any(|r| r.reactants.iter().chain(&r.products).any(|t| t.species == id))
                || self.conserves.iter().any(|c| c.terms.iter().any(|&(s, _)| s == id));
            if !used {
                warn!("species {} takes part in no reaction", name);
            }
        }
    }
}

impl Scheme for KineticScheme {
    fn key(&self) -> SchemeKey {
        self.key
    }

    /// Backward Euler for mass-action kinetics.
    ///
    /// Row `i` carries `-(s_i - s_i_old)/dt + Σ ν_i flux` and its Jacobian
    /// `δ_ij/dt - Σ ν_i ∂flux/∂s_j`, with the previous states read from the
    /// derivative slots. Rows claimed by a conservation law instead carry
    /// `total - Σ c_k s_k` and the coefficients `c_k`.
    fn assemble(&mut self, eq: &mut Equations<'_>, data: &[f64], step: Step) {
        let n = self.num_species();
        let (s, old) = data.split_at(n);
        let inv_dt = 1.0 / step.dt;

        for i in 0..n {
            if !self.replaced[i] {
                *eq.rhs(i) = -(s[i] - old[i]) * inv_dt;
                *eq.elm(i, i) += inv_dt;
            }
        }

        for (r, rows) in self.reactions.iter().zip(&self.rows) {
            let flux = r.flux(s);
            for &(sp, nu) in &rows.change {
                if self.replaced[sp.0] {
                    continue;
                }
                *eq.rhs(sp.0) += nu * flux;
                for &j in &rows.deps {
                    *eq.elm(sp.0, j.0) -= nu * r.flux_partial(s, j);
                }
            }
        }

        for c in &self.conserves {
            let mut rhs = c.total;
            for &(sp, coeff) in &c.terms {
                rhs -= coeff * s[sp.0];
                *eq.elm(c.row.0, sp.0) += coeff;
            }
            *eq.rhs(c.row.0) = rhs;
        }
    }
}
