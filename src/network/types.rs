//! Core types for network representation.

use std::fmt;

use crate::error::{PnflowError, Result};

/// Kind of network element a property array is indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    /// Void spaces (graph nodes)
    Pore,
    /// Connections between two pores (graph edges)
    Throat,
}

impl Element {
    /// Resolve the element kind from a propname prefix.
    ///
    /// `"pore.concentration"` maps to [`Element::Pore`],
    /// `"throat.diffusive_conductance"` to [`Element::Throat`].
    pub fn from_propname(propname: &str) -> Result<Self> {
        match propname.split_once('.') {
            Some(("pore", rest)) if !rest.is_empty() => Ok(Element::Pore),
            Some(("throat", rest)) if !rest.is_empty() => Ok(Element::Throat),
            _ => Err(PnflowError::InvalidPropname {
                propname: propname.to_string(),
            }),
        }
    }

    /// The propname prefix for this element.
    pub fn prefix(&self) -> &'static str {
        match self {
            Element::Pore => "pore",
            Element::Throat => "throat",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Pore => write!(f, "Pore"),
            Element::Throat => write!(f, "Throat"),
        }
    }
}

/// Read-only access to network topology.
///
/// This is everything the transport engine needs from a network: element
/// counts, throat endpoints, and label lookups used to select pore sets for
/// boundary conditions and sources.
pub trait NetworkView {
    /// Number of pores.
    fn num_pores(&self) -> usize;

    /// Throat endpoints, indexed by throat.
    fn conns(&self) -> &[[usize; 2]];

    /// Number of throats.
    fn num_throats(&self) -> usize {
        self.conns().len()
    }

    /// Pore indices carrying a label, sorted ascending.
    fn pores(&self, label: &str) -> Result<Vec<usize>>;

    /// Throat indices carrying a label, sorted ascending.
    fn throats(&self, label: &str) -> Result<Vec<usize>>;

    /// Number of elements of the given kind.
    fn count(&self, element: Element) -> usize {
        match element {
            Element::Pore => self.num_pores(),
            Element::Throat => self.num_throats(),
        }
    }
}
