//! Network topology and validation.
//!
//! This module provides the pore network graph consumed by the transport
//! engine. The engine only sees the [`NetworkView`] trait; [`Network`] is the
//! in-crate implementation with label storage and a cubic lattice generator.

mod topology;
mod types;
mod validate;

pub use topology::Network;
pub use types::*;
pub use validate::{validate_conns, validate_pores};
