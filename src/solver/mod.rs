//! Reactive transport solver.
//!
//! This module provides the numerical engine for steady transport on a pore
//! network.
//!
//! ## Governing system
//!
//! Conservation in every pore gives a linear system Ax = b where:
//! - A is the weighted graph Laplacian of the throat conductances
//! - x is the transported quantity per pore
//! - b collects imposed rates and source contributions
//!
//! Every throat (i, j) with conductance g adds the stamp:
//! ```text
//!        i    j
//! i [  +g   -g ]
//! j [  -g   +g ]
//! ```
//!
//! Value boundary pores get identity rows, rate boundary pores add to b,
//! and nonlinear sources are linearized around the current estimate and
//! re-solved until the quantity stops changing.

mod assembly;
mod boundary;
mod linear;
mod matrix;
mod result;
mod settings;
mod source;
mod transport;

pub use assembly::LinearSystemBuilder;
pub use boundary::{BoundaryCondition, BoundaryConditions, RateSpec};
pub use linear::{BandedLu, LinearSolver};
pub use matrix::{LinearSystem, SparseMatrix};
pub use result::{net_rate, SolverState, TerminationStatus, TransportResult};
pub use settings::TransportSettings;
pub use source::{
    ExponentialKinetics, FnSource, LinearKinetics, Linearization, Param, PowerLaw, SourceModel,
    SourceTerm, SourceTermLinearizer, SourceTerms, StandardKinetics,
};
pub use transport::ReactiveTransport;

/// Default convergence tolerance on the max change of the quantity.
pub const DEFAULT_TOLERANCE: f64 = 1e-8;

/// Default iteration cap.
pub const DEFAULT_MAX_ITERATIONS: usize = 5000;

/// Default relaxation factor (no relaxation).
pub const DEFAULT_RELAXATION: f64 = 1.0;

/// Default number of consecutive residual increases treated as divergence.
pub const DEFAULT_DIVERGENCE_WINDOW: usize = 10;

/// Pivots below this magnitude (after row scaling) are singular.
pub const SINGULAR_PIVOT: f64 = 1e-12;

/// Relative step for numeric source derivatives, about the cube root of
/// machine epsilon.
pub const FD_RELATIVE_STEP: f64 = 6.055e-6;
