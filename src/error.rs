//! Error types for the pnflow transport solver.
//!
//! This module provides a unified error type [`PnflowError`] that covers
//! all error conditions that can occur during network validation, boundary
//! condition and source registration, system assembly, and iteration.

use thiserror::Error;

/// Result type alias using [`PnflowError`].
pub type Result<T> = std::result::Result<T, PnflowError>;

/// Unified error type for all pnflow operations.
#[derive(Error, Debug)]
pub enum PnflowError {
    // ============ Registration Conflicts ============
    /// A boundary condition or source overlaps an existing registration
    #[error("Conflict at pore {pore}: cannot register {requested}, pore already holds {existing}")]
    Conflict {
        pore: usize,
        existing: String,
        requested: String,
    },

    /// A source term name is registered twice
    #[error("Source term '{propname}' is already registered")]
    DuplicateSource { propname: String },

    // ============ Assembly Errors ============
    /// Throat references a pore outside [0, Np)
    #[error("Throat {throat} references pore {pore}, but the network has {num_pores} pores")]
    PoreOutOfRange {
        throat: usize,
        pore: usize,
        num_pores: usize,
    },

    /// Throat connects a pore to itself
    #[error("Throat {throat} connects pore {pore} to itself")]
    SelfLoop { throat: usize, pore: usize },

    /// Pore with zero total conductance and no boundary condition
    #[error("Pore {pore} has zero total conductance and no boundary condition")]
    IsolatedPore { pore: usize },

    /// Array length does not match the element count
    #[error("Array '{name}' has length {actual}, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// NaN or infinite value in an input array
    #[error("Array '{name}' holds a non-finite value at index {index}")]
    NonFiniteValue { name: String, index: usize },

    /// Matrix is singular and cannot be solved
    #[error("Singular matrix at row {row} - system may be unconstrained or disconnected")]
    SingularMatrix { row: usize },

    /// No value boundary condition and no source term
    #[error("System is unconstrained: set at least one value boundary condition or source term")]
    Unconstrained,

    // ============ Convergence Errors ============
    /// Residual grew for too many consecutive iterations
    #[error("Iteration diverged after {iterations} iterations (residual: {residual:.2e})")]
    Diverged { iterations: usize, residual: f64 },

    /// Solution or source values became NaN or infinite
    #[error("Non-finite {what} at pore {pore} in iteration {iteration}")]
    NonFiniteSolution {
        iteration: usize,
        pore: usize,
        what: String,
    },

    // ============ Configuration Errors ============
    /// Invalid transport setting
    #[error("Invalid setting '{name}': {message}")]
    InvalidSetting { name: String, message: String },

    /// Propname without a 'pore.' or 'throat.' prefix
    #[error("Invalid property name '{propname}': expected a 'pore.' or 'throat.' prefix")]
    InvalidPropname { propname: String },

    /// Label not defined on the network
    #[error("Label '{label}' not found on the network")]
    UnknownLabel { label: String },

    /// Registration with no pores
    #[error("No pores given for {what}")]
    EmptyPoreSet { what: String },

    /// Pore index passed to a registration is out of range
    #[error("Pore {pore} is out of range for a network with {num_pores} pores")]
    InvalidPore { pore: usize, num_pores: usize },

    /// Property not available and no model to regenerate it
    #[error("Property '{propname}' not found and no model can regenerate it")]
    MissingProperty { propname: String },

    /// Source or property model rejected its inputs
    #[error("Invalid model '{name}': {message}")]
    InvalidModel { name: String, message: String },

    /// Index already owned by another domain
    #[error("{element} {index} is already owned by domain '{owner}'")]
    DomainOverlap {
        element: String,
        index: usize,
        owner: String,
    },
}

impl PnflowError {
    /// Create a conflict error
    pub fn conflict(pore: usize, existing: impl Into<String>, requested: impl Into<String>) -> Self {
        Self::Conflict {
            pore,
            existing: existing.into(),
            requested: requested.into(),
        }
    }

    /// Create an invalid setting error
    pub fn invalid_setting(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSetting {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an invalid model error
    pub fn invalid_model(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidModel {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a length mismatch error
    pub fn length_mismatch(name: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            name: name.into(),
            expected,
            actual,
        }
    }

    /// Create a divergence error
    pub fn diverged(iterations: usize, residual: f64) -> Self {
        Self::Diverged {
            iterations,
            residual,
        }
    }

    /// Registration overlap (boundary condition or source).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::DuplicateSource { .. })
    }

    /// Malformed topology or an ill-posed linear system.
    pub fn is_assembly(&self) -> bool {
        matches!(
            self,
            Self::PoreOutOfRange { .. }
                | Self::SelfLoop { .. }
                | Self::IsolatedPore { .. }
                | Self::LengthMismatch { .. }
                | Self::NonFiniteValue { .. }
                | Self::SingularMatrix { .. }
                | Self::Unconstrained
        )
    }

    /// Fatal iteration failure; no partial answer is returned.
    pub fn is_convergence(&self) -> bool {
        matches!(self, Self::Diverged { .. } | Self::NonFiniteSolution { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert!(PnflowError::conflict(3, "a value BC", "a source").is_conflict());
        assert!(PnflowError::SingularMatrix { row: 0 }.is_assembly());
        assert!(PnflowError::Unconstrained.is_assembly());
        assert!(PnflowError::diverged(10, 1.0).is_convergence());
        assert!(!PnflowError::diverged(10, 1.0).is_assembly());
    }

    #[test]
    fn test_conflict_message() {
        let err = PnflowError::conflict(7, "a source term", "a value boundary condition");
        assert_eq!(
            err.to_string(),
            "Conflict at pore 7: cannot register a value boundary condition, pore already holds a source term"
        );
    }
}
