//! Main simulator interface.

use log::debug;

use crate::error::Result;
use crate::scheme::KineticScheme;

use super::config::SolverConfig;
use super::sparse::{SparseObj, Step};
use super::steady::ss_sparse;

/// Species concentrations sampled over time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeCourse {
    /// Sample times, starting with the initial time
    pub times: Vec<f64>,
    /// One row of concentrations per sample
    pub states: Vec<Vec<f64>>,
}

impl TimeCourse {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Concentrations at the last sample.
    pub fn last(&self) -> Option<&[f64]> {
        self.states.last().map(Vec::as_slice)
    }
}

/// The main kinetic scheme simulator.
///
/// Owns one scheme, its sparse solver context and its instance data.
#[derive(Debug, Clone)]
pub struct Simulator {
    /// The scheme being integrated
    scheme: KineticScheme,
    /// Sparse solver context
    solver: SparseObj,
    /// Instance data: concentrations then derivatives
    data: Vec<f64>,
    state: Vec<usize>,
    deriv: Vec<usize>,
    /// Current time
    time: f64,
    /// One Newton pass is exact
    linear: bool,
}

impl Simulator {
    /// Create a new simulator for the given scheme with default configuration.
    pub fn new(scheme: KineticScheme) -> Self {
        Self::with_config(scheme, SolverConfig::default())
    }

    /// Create a new simulator for the given scheme with custom configuration.
    pub fn with_config(scheme: KineticScheme, config: SolverConfig) -> Self {
        let data = scheme.initial_data();
        let state = scheme.state_index();
        let deriv = scheme.deriv_index();
        let linear = scheme.is_linear();
        Self {
            scheme,
            solver: SparseObj::with_config(config),
            data,
            state,
            deriv,
            time: 0.0,
            linear,
        }
    }

    /// Advance by one implicit Euler step of length `dt`.
    ///
    /// `dt` must be positive and finite; otherwise nothing changes and
    /// `InvalidTimeStep` is returned.
    pub fn step(&mut self, dt: f64) -> Result<()> {
        let n = self.scheme.num_species();
        let step = Step::new(self.time, dt);
        self.solver.sparse(
            n,
            &self.state,
            &self.deriv,
            &mut self.data,
            step,
            &mut self.scheme,
            self.linear,
        )?;
        self.time += dt;
        Ok(())
    }

    /// Take `steps` steps of length `dt`, recording the state before the
    /// first step and after each one.
    pub fn run(&mut self, steps: usize, dt: f64) -> Result<TimeCourse> {
        let mut course = TimeCourse::default();
        course.times.push(self.time);
        course.states.push(self.states().to_vec());
        for _ in 0..steps {
            self.step(dt)?;
            course.times.push(self.time);
            course.states.push(self.states().to_vec());
        }
        Ok(course)
    }

    /// Relax the scheme to steady state.
    ///
    /// The time does not advance.
    pub fn steady_state(&mut self) -> Result<()> {
        let n = self.scheme.num_species();
        ss_sparse(
            &mut self.solver,
            n,
            &self.state,
            &self.deriv,
            &mut self.data,
            self.time,
            &mut self.scheme,
            self.linear,
        )?;

        let mut rates = vec![0.0; n];
        self.scheme.derivatives(self.states(), &mut rates);
        let residual = rates.iter().fold(0.0f64, |m, r| m.max(r.abs()));
        debug!("steady state reached, max |ds/dt| = {:e}", residual);
        Ok(())
    }

    /// Current concentrations in species order.
    pub fn states(&self) -> &[f64] {
        &self.data[..self.scheme.num_species()]
    }

    /// Derivatives left by the last step.
    pub fn derivs(&self) -> &[f64] {
        &self.data[self.scheme.num_species()..]
    }

    /// Concentration of a species by name.
    pub fn concentration(&self, name: &str) -> Option<f64> {
        self.scheme
            .species_id(name)
            .map(|id| self.data[id.index()])
    }

    /// Restore the initial concentrations and time zero.
    ///
    /// The sparse structure is kept.
    pub fn reset(&mut self) {
        self.data = self.scheme.initial_data();
        self.time = 0.0;
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn scheme(&self) -> &KineticScheme {
        &self.scheme
    }

    pub fn solver(&self) -> &SparseObj {
        &self.solver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse;
    use crate::error::KineticError;
    use approx::assert_abs_diff_eq;

    fn simulator(input: &str) -> Simulator {
        Simulator::new(KineticScheme::from_ast(parse(input).unwrap()).unwrap())
    }

    const TWO_STATE: &str = "\
.state A B
.init A = 1
~ A <-> B (0.1, 0.2)
.conserve A + B = 1
";

    #[test]
    fn test_two_state_steady_state() {
        let mut sim = simulator(TWO_STATE);
        sim.steady_state().unwrap();
        let a = sim.concentration("A").unwrap();
        let b = sim.concentration("B").unwrap();
        assert_abs_diff_eq!(b / a, 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(a + b, 1.0, epsilon = 1e-9);
        assert_eq!(sim.time(), 0.0);
    }

    #[test]
    fn test_two_state_step_matches_implicit_euler() {
        let mut sim = simulator(TWO_STATE);
        let dt = 0.5;
        sim.step(dt).unwrap();

        // (1 + kf dt) a - kb dt b = a0 with a + b = 1
        let a = (1.0 + 0.2 * dt) / (1.0 + 0.3 * dt);
        assert_abs_diff_eq!(sim.states()[0], a, epsilon = 1e-12);
        assert_abs_diff_eq!(sim.states()[1], 1.0 - a, epsilon = 1e-12);
        assert_abs_diff_eq!(sim.derivs()[0], (a - 1.0) / dt, epsilon = 1e-12);
        assert_abs_diff_eq!(sim.time(), dt);
    }

    #[test]
    fn test_resolve_at_fixed_point_is_idempotent() {
        let mut sim = simulator(TWO_STATE);
        sim.steady_state().unwrap();
        let before = sim.states().to_vec();
        sim.step(0.1).unwrap();
        for (x, y) in before.iter().zip(sim.states()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-9);
        }
        for d in sim.derivs() {
            assert_abs_diff_eq!(*d, 0.0, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_run_records_time_course() {
        let mut sim = simulator(TWO_STATE);
        let course = sim.run(100, 1.0).unwrap();
        assert_eq!(course.len(), 101);
        assert_eq!(course.states[0], vec![1.0, 0.0]);
        assert_abs_diff_eq!(course.times[100], 100.0, epsilon = 1e-9);
        let last = course.last().unwrap();
        assert_abs_diff_eq!(last[1] / last[0], 0.5, epsilon = 1e-6);

        sim.reset();
        assert_eq!(sim.states(), &[1.0, 0.0]);
        assert_eq!(sim.time(), 0.0);
    }

    #[test]
    fn test_dimerization_conserves_mass() {
        // 2 M <-> D, total monomer 1
        let mut sim = simulator(
            ".state M D\n.init M = 1\n~ 2 M <-> D (1, 0.5)\n.conserve M + 2 D = 1\n",
        );
        for _ in 0..50 {
            sim.step(0.2).unwrap();
            let s = sim.states();
            assert_abs_diff_eq!(s[0] + 2.0 * s[1], 1.0, epsilon = 1e-9);
        }
        sim.steady_state().unwrap();
        let (m, d) = (sim.states()[0], sim.states()[1]);
        // Equilibrium: kf m^2 = kb d
        assert_abs_diff_eq!(m * m, 0.5 * d, epsilon = 1e-6);
        assert!(m >= 0.0 && d >= 0.0);
    }

    #[test]
    fn test_nonlinear_steady_state_non_negative() {
        // A + B -> C drains the limiting reactant exactly to zero
        let mut sim = simulator(
            ".state A B C\n.init A = 1\n.init B = 0.5\n~ A + B -> C (2)\n.conserve A + C = 1\n",
        );
        sim.steady_state().unwrap();
        for &s in sim.states() {
            assert!(s >= -1e-6);
        }
        assert_abs_diff_eq!(sim.concentration("C").unwrap(), 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_invalid_time_step_leaves_state_untouched() {
        let mut sim = simulator(TWO_STATE);
        for dt in [0.0, -1.0, f64::NAN] {
            assert!(matches!(
                sim.step(dt),
                Err(KineticError::InvalidTimeStep { .. })
            ));
        }
        assert!(sim.run(10, 0.0).is_err());
        assert_eq!(sim.states(), &[1.0, 0.0]);
        assert_eq!(sim.time(), 0.0);
    }

    #[test]
    fn test_step_error_propagates() {
        let scheme = KineticScheme::from_ast(parse(TWO_STATE).unwrap()).unwrap();
        let mut sim = Simulator::with_config(scheme, SolverConfig::new().with_max_steps(0));
        let dimer = simulator(".state M D\n.init M = 1\n~ 2 M -> D (1)\n");
        let mut dimer = Simulator::with_config(dimer.scheme().clone(), SolverConfig::new().with_max_steps(0));
        // Linear schemes take a single pass regardless of the cap
        sim.step(0.1).unwrap();
        assert!(matches!(
            dimer.step(1.0),
            Err(KineticError::ExceedIters { .. })
        ));
    }
}
