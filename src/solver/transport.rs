//! Reactive transport algorithm.

use log::{debug, info, warn};

use super::assembly::LinearSystemBuilder;
use super::boundary::{BoundaryCondition, BoundaryConditions, RateSpec};
use super::linear::{BandedLu, LinearSolver};
use super::matrix::LinearSystem;
use super::result::{SolverState, TerminationStatus, TransportResult};
use super::settings::TransportSettings;
use super::source::{SourceModel, SourceTermLinearizer, SourceTerms};
use crate::error::{PnflowError, Result};
use crate::network::{Element, NetworkView};
use crate::properties::{fetch, PropertyProvider};

/// Steady transport with (possibly nonlinear) source terms on a network.
///
/// Boundary conditions and sources are registered first; every registration
/// checks for overlap immediately, so a malformed setup never reaches
/// [`run`](Self::run). Each iteration then rebuilds the system from the
/// conductance, linearizes the sources at the current estimate, applies the
/// boundary conditions, solves and under-relaxes.
pub struct ReactiveTransport<'a, N: NetworkView + ?Sized> {
    /// The network being solved on
    network: &'a N,
    settings: TransportSettings,
    bcs: BoundaryConditions,
    sources: SourceTerms,
    linearizer: SourceTermLinearizer,
    solver: Box<dyn LinearSolver>,
    state: SolverState,
}

impl<'a, N: NetworkView + ?Sized> ReactiveTransport<'a, N> {
    /// Create an algorithm on a network. Settings are validated here.
    pub fn new(network: &'a N, settings: TransportSettings) -> Result<Self> {
        settings.validate()?;
        let num_pores = network.num_pores();
        Ok(Self {
            network,
            settings,
            bcs: BoundaryConditions::new(num_pores),
            sources: SourceTerms::new(num_pores),
            linearizer: SourceTermLinearizer::default(),
            solver: Box::new(BandedLu::new()),
            state: SolverState::Initialized,
        })
    }

    /// Replace the linear solver.
    pub fn with_solver(mut self, solver: Box<dyn LinearSolver>) -> Self {
        self.solver = solver;
        self
    }

    /// Replace the source linearizer.
    pub fn with_linearizer(mut self, linearizer: SourceTermLinearizer) -> Self {
        self.linearizer = linearizer;
        self
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    pub fn boundary_conditions(&self) -> &BoundaryConditions {
        &self.bcs
    }

    pub fn sources(&self) -> &SourceTerms {
        &self.sources
    }

    /// Fix the quantity in the given pores.
    pub fn set_value_bc(&mut self, pores: &[usize], value: f64) -> Result<()> {
        self.check_no_source(pores, "a value boundary condition")?;
        self.bcs.set_value(pores, value)
    }

    /// Impose a rate on the given pores.
    pub fn set_rate_bc(&mut self, pores: &[usize], rate: RateSpec) -> Result<()> {
        self.check_no_source(pores, "a rate boundary condition")?;
        self.bcs.set_rate(pores, rate)
    }

    /// Drop boundary conditions on the given pores.
    pub fn remove_bc(&mut self, pores: &[usize]) {
        self.bcs.remove(pores);
    }

    /// Register a source term on the given pores.
    ///
    /// `propname` names the source; its rate is published as
    /// `"{propname}.rate"` after a run.
    pub fn set_source<M>(&mut self, pores: &[usize], propname: &str, model: M) -> Result<()>
    where
        M: SourceModel + 'static,
    {
        if Element::from_propname(propname)? != Element::Pore {
            return Err(PnflowError::InvalidPropname {
                propname: propname.to_string(),
            });
        }
        let requested = format!("source term '{propname}'");
        for &p in pores {
            if let Some(bc) = self.bcs.get(p) {
                return Err(PnflowError::conflict(p, bc.kind(), requested));
            }
        }
        self.sources.add(propname, pores, Box::new(model))
    }

    /// Unregister a source term. Returns whether it existed.
    pub fn remove_source(&mut self, propname: &str) -> bool {
        self.sources.remove(propname)
    }

    /// Drop all boundary conditions and sources.
    pub fn reset(&mut self) {
        self.bcs.clear();
        self.sources.clear();
        self.state = SolverState::Initialized;
    }

    /// Solve for the quantity.
    ///
    /// The conductance is read from `provider` (regenerated if missing); the
    /// solution and every source's rate are written back to it. Without an
    /// initial guess the iteration starts from zero.
    pub fn run<P>(&mut self, provider: &mut P, initial_guess: Option<&[f64]>) -> Result<TransportResult>
    where
        P: PropertyProvider + ?Sized,
    {
        let num_pores = self.network.num_pores();
        if self.bcs.value_pores().next().is_none() && self.sources.is_empty() {
            return Err(PnflowError::Unconstrained);
        }

        let conductance = fetch(provider, &self.settings.conductance)?;
        let builder = LinearSystemBuilder::new(self.network);
        let base = builder.build(&conductance)?;
        builder.check_isolated(&conductance, |p| self.bcs.contains(p))?;

        let mut x = match initial_guess {
            Some(guess) => {
                if guess.len() != num_pores {
                    return Err(PnflowError::length_mismatch(
                        "initial guess",
                        num_pores,
                        guess.len(),
                    ));
                }
                if let Some(index) = guess.iter().position(|v| !v.is_finite()) {
                    return Err(PnflowError::NonFiniteValue {
                        name: "initial guess".to_string(),
                        index,
                    });
                }
                guess.to_vec()
            }
            None => vec![0.0; num_pores],
        };
        impose_values(&self.bcs, &mut x);
        self.sources.reset();

        info!(
            "Solving for '{}' on {} pores ({} boundary pores, {} source terms)",
            self.settings.quantity,
            num_pores,
            self.bcs.len(),
            self.sources.len()
        );

        self.state = SolverState::Iterating;
        let result = match self.iterate(&base, x) {
            Ok(result) => result,
            Err(err) => {
                self.state = if err.is_convergence() {
                    SolverState::Diverged
                } else {
                    SolverState::Initialized
                };
                return Err(err);
            }
        };
        self.state = result.status.into();

        self.publish(provider, &result)?;
        Ok(result)
    }

    fn iterate(&mut self, base: &LinearSystem, mut x: Vec<f64>) -> Result<TransportResult> {
        let tolerance = self.settings.rxn_tolerance;
        let max_iter = self.settings.max_iter;
        let relax_source = self.settings.relaxation_source;
        let relax_quantity = self.settings.relaxation_quantity;

        // Purely linear - solve directly
        if self.sources.is_empty() {
            let mut system = base.clone();
            self.bcs.apply(&mut system);
            let mut solution = self.solver.solve(&system)?;
            impose_values(&self.bcs, &mut solution);
            check_finite(&solution, 1)?;
            let residual = system.residual(&solution);
            info!("Linear system solved directly (residual: {residual:.3e})");
            return Ok(TransportResult {
                solution,
                iterations: 1,
                residual,
                status: TerminationStatus::Converged,
            });
        }

        let mut previous: Option<f64> = None;
        let mut growth = 0;
        let mut residual = f64::INFINITY;

        for iteration in 1..=max_iter {
            // Rebuild, linearize sources, then constrain
            let mut system = base.clone();
            for term in self.sources.iter_mut() {
                term.linearize_into(&self.linearizer, &mut system, &x, relax_source, iteration)?;
            }
            self.bcs.apply(&mut system);

            let x_new = self.solver.solve(&system)?;

            let mut next: Vec<f64> = x
                .iter()
                .zip(&x_new)
                .map(|(old, new)| old + relax_quantity * (new - old))
                .collect();
            impose_values(&self.bcs, &mut next);
            check_finite(&next, iteration)?;

            for term in self.sources.iter_mut() {
                term.update_rate(&next, relax_source);
            }

            residual = next
                .iter()
                .zip(&x)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            x = next;

            debug!("Iteration {iteration}/{max_iter}: residual {residual:.3e}");

            if residual < tolerance {
                info!("Converged after {iteration} iterations (residual: {residual:.3e})");
                return Ok(TransportResult {
                    solution: x,
                    iterations: iteration,
                    residual,
                    status: TerminationStatus::Converged,
                });
            }

            match previous {
                Some(prev) if residual > prev => growth += 1,
                _ => growth = 0,
            }
            if growth >= self.settings.divergence_window {
                warn!(
                    "Residual grew for {growth} consecutive iterations, aborting at iteration {iteration}"
                );
                return Err(PnflowError::diverged(iteration, residual));
            }
            previous = Some(residual);
        }

        warn!("Reached max_iter = {max_iter} without converging (residual: {residual:.3e})");
        Ok(TransportResult {
            solution: x,
            iterations: max_iter,
            residual,
            status: TerminationStatus::MaxIterReached,
        })
    }

    /// Write the solution and source rates to the provider.
    fn publish<P>(&self, provider: &mut P, result: &TransportResult) -> Result<()>
    where
        P: PropertyProvider + ?Sized,
    {
        provider.set(&self.settings.quantity, result.solution.clone())?;
        for term in self.sources.iter() {
            let mut rate = vec![0.0; self.network.num_pores()];
            for (&pore, &r) in term.pores.iter().zip(term.rate()) {
                rate[pore] = r;
            }
            provider.set(&format!("{}.rate", term.propname), rate)?;
        }
        Ok(())
    }

    fn check_no_source(&self, pores: &[usize], requested: &str) -> Result<()> {
        for &p in pores {
            if let Some(term) = self.sources.source_at(p) {
                return Err(PnflowError::conflict(
                    p,
                    format!("source term '{}'", term.propname),
                    requested,
                ));
            }
        }
        Ok(())
    }
}

/// Set value-BC pores exactly to their value.
fn impose_values(bcs: &BoundaryConditions, x: &mut [f64]) {
    for (pore, bc) in bcs.iter() {
        if let BoundaryCondition::Value(value) = bc {
            x[pore] = value;
        }
    }
}

fn check_finite(x: &[f64], iteration: usize) -> Result<()> {
    match x.iter().position(|v| !v.is_finite()) {
        Some(pore) => Err(PnflowError::NonFiniteSolution {
            iteration,
            pore,
            what: "solution".to_string(),
        }),
        None => Ok(()),
    }
}
