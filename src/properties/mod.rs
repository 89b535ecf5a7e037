//! Property arrays and their providers.
//!
//! Conductance, source parameters and results are named arrays keyed by a
//! `pore.` or `throat.` propname. The solver reads them through the
//! [`PropertyProvider`] capability and falls back to regeneration when an
//! array is missing. [`PropertyStore`] is the in-crate provider.

mod provider;
mod store;

pub use provider::{fetch, PropertyProvider};
pub use store::{DomainId, ModelInputs, PropertyModel, PropertyStore};
