//! # Pnflow
//!
//! A steady reactive transport solver for pore network models.
//!
//! This library provides:
//! - Pore network topology with labels and a cubic lattice generator
//! - Named pore and throat property arrays with model-based regeneration
//! - Conductance matrix assembly with value (Dirichlet) and rate (Neumann)
//!   boundary conditions
//! - Nonlinear source terms linearized and iterated with under-relaxation
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`network`] - Pore/throat graph, labels and validation
//! - [`properties`] - Property arrays, domains and the provider capability
//! - [`solver`] - System assembly, linear solving and the reactive transport loop
//! - [`error`] - Unified error type
//!
//! ## Usage
//!
//! ```no_run
//! use pnflow::{Network, PropertyProvider, PropertyStore, ReactiveTransport, TransportSettings};
//! use pnflow::solver::StandardKinetics;
//! use pnflow::network::NetworkView;
//!
//! # fn main() -> pnflow::Result<()> {
//! let net = Network::cubic([9, 9, 9])?;
//! let mut phase = PropertyStore::for_network(&net);
//! phase.set("throat.diffusive_conductance", vec![1e-15; net.num_throats()])?;
//!
//! let mut alg = ReactiveTransport::new(&net, TransportSettings::default())?;
//! alg.set_value_bc(&net.pores("top")?, 1.0)?;
//! alg.set_source(&net.pores("bottom")?, "pore.reaction", StandardKinetics::new(-1e-15, 2.0))?;
//! let result = alg.run(&mut phase, None)?;
//! println!("mean = {}", result.mean());
//! # Ok(())
//! # }
//! ```
//!
//! ## Solution Method
//!
//! Each iteration:
//!
//! 1. Rebuild A from the throat conductances
//! 2. Linearize every source around the current estimate and add it to A and b
//! 3. Impose the boundary conditions
//! 4. Solve Ax = b, under-relax, and compare with the previous estimate
//!
//! A run without sources is linear and solved directly.

pub mod error;
pub mod network;
pub mod properties;
pub mod solver;

// Re-export main types for convenience
pub use error::{PnflowError, Result};
pub use network::Network;
pub use properties::{PropertyProvider, PropertyStore};
pub use solver::{ReactiveTransport, TransportResult, TransportSettings};
