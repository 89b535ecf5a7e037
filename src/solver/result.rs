//! Run results and diagnostics.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{PnflowError, Result};
use crate::network::NetworkView;

/// Where the iteration state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    /// Configured, not yet run
    Initialized,
    /// Inside the iteration loop
    Iterating,
    /// Residual dropped below the tolerance
    Converged,
    /// Iteration cap hit before convergence
    MaxIterReached,
    /// Residual kept growing or became non-finite
    Diverged,
}

impl fmt::Display for SolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverState::Initialized => "initialized",
            SolverState::Iterating => "iterating",
            SolverState::Converged => "converged",
            SolverState::MaxIterReached => "max iterations reached",
            SolverState::Diverged => "diverged",
        };
        write!(f, "{name}")
    }
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    Converged,
    /// Non-fatal: the last iterate is returned, the caller decides whether
    /// to trust it.
    MaxIterReached,
}

impl From<TerminationStatus> for SolverState {
    fn from(status: TerminationStatus) -> Self {
        match status {
            TerminationStatus::Converged => SolverState::Converged,
            TerminationStatus::MaxIterReached => SolverState::MaxIterReached,
        }
    }
}

/// Output of a transport run.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResult {
    /// Quantity per pore
    pub solution: Vec<f64>,
    /// Iterations performed
    pub iterations: usize,
    /// Residual of the last iteration
    pub residual: f64,
    pub status: TerminationStatus,
}

impl TransportResult {
    pub fn is_converged(&self) -> bool {
        self.status == TerminationStatus::Converged
    }

    /// Arithmetic mean of the solution.
    pub fn mean(&self) -> f64 {
        if self.solution.is_empty() {
            return 0.0;
        }
        self.solution.iter().sum::<f64>() / self.solution.len() as f64
    }
}

/// Net rate leaving a pore set into the rest of the network.
///
/// Sums `g·(x_in − x_out)` over throats with exactly one endpoint in the
/// set. For value boundary pores this is the rate the boundary supplies.
pub fn net_rate<N: NetworkView + ?Sized>(
    network: &N,
    conductance: &[f64],
    solution: &[f64],
    pores: &[usize],
) -> Result<f64> {
    if conductance.len() != network.num_throats() {
        return Err(PnflowError::length_mismatch(
            "conductance",
            network.num_throats(),
            conductance.len(),
        ));
    }
    if solution.len() != network.num_pores() {
        return Err(PnflowError::length_mismatch(
            "solution",
            network.num_pores(),
            solution.len(),
        ));
    }

    let set: BTreeSet<usize> = pores.iter().copied().collect();
    let mut total = 0.0;
    for (&[i, j], &g) in network.conns().iter().zip(conductance) {
        match (set.contains(&i), set.contains(&j)) {
            (true, false) => total += g * (solution[i] - solution[j]),
            (false, true) => total += g * (solution[j] - solution[i]),
            _ => {}
        }
    }
    Ok(total)
}
