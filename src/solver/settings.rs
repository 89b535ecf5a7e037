//! Transport algorithm settings.

use super::{
    DEFAULT_DIVERGENCE_WINDOW, DEFAULT_MAX_ITERATIONS, DEFAULT_RELAXATION, DEFAULT_TOLERANCE,
};
use crate::error::{PnflowError, Result};
use crate::network::Element;

/// Configuration for a reactive transport run.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSettings {
    /// Pore property being solved for (e.g. `pore.concentration`).
    pub quantity: String,
    /// Throat property holding the conductance.
    pub conductance: String,
    /// Convergence tolerance on the max change of the quantity between
    /// iterations.
    pub rxn_tolerance: f64,
    /// Maximum number of iterations.
    pub max_iter: usize,
    /// Under-relaxation of the source linearization, in (0, 1].
    pub relaxation_source: f64,
    /// Under-relaxation of the quantity update, in (0, 1].
    pub relaxation_quantity: f64,
    /// Consecutive residual increases that count as divergence.
    pub divergence_window: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            quantity: "pore.concentration".to_string(),
            conductance: "throat.diffusive_conductance".to_string(),
            rxn_tolerance: DEFAULT_TOLERANCE,
            max_iter: DEFAULT_MAX_ITERATIONS,
            relaxation_source: DEFAULT_RELAXATION,
            relaxation_quantity: DEFAULT_RELAXATION,
            divergence_window: DEFAULT_DIVERGENCE_WINDOW,
        }
    }
}

impl TransportSettings {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the solved-for pore property.
    pub fn with_quantity(mut self, quantity: impl Into<String>) -> Self {
        self.quantity = quantity.into();
        self
    }

    /// Set the throat conductance property.
    pub fn with_conductance(mut self, conductance: impl Into<String>) -> Self {
        self.conductance = conductance.into();
        self
    }

    /// Set the convergence tolerance.
    ///
    /// Zero is allowed and never converges, so the run stops at `max_iter`.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.rxn_tolerance = tolerance;
        self
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set both relaxation factors.
    pub fn with_relaxation(mut self, source: f64, quantity: f64) -> Self {
        self.relaxation_source = source;
        self.relaxation_quantity = quantity;
        self
    }

    /// Set the divergence window.
    pub fn with_divergence_window(mut self, window: usize) -> Self {
        self.divergence_window = window;
        self
    }

    /// Reject out-of-range values. Nothing is clamped.
    pub fn validate(&self) -> Result<()> {
        check_propname("quantity", &self.quantity, Element::Pore)?;
        check_propname("conductance", &self.conductance, Element::Throat)?;

        if !self.rxn_tolerance.is_finite() || self.rxn_tolerance < 0.0 {
            return Err(PnflowError::invalid_setting(
                "rxn_tolerance",
                format!("must be finite and non-negative, got {}", self.rxn_tolerance),
            ));
        }
        if self.max_iter == 0 {
            return Err(PnflowError::invalid_setting("max_iter", "must be at least 1"));
        }
        for (name, value) in [
            ("relaxation_source", self.relaxation_source),
            ("relaxation_quantity", self.relaxation_quantity),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(PnflowError::invalid_setting(
                    name,
                    format!("must be in (0, 1], got {value}"),
                ));
            }
        }
        if self.divergence_window == 0 {
            return Err(PnflowError::invalid_setting(
                "divergence_window",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

fn check_propname(setting: &str, propname: &str, expected: Element) -> Result<()> {
    let element = Element::from_propname(propname)?;
    if element != expected {
        return Err(PnflowError::invalid_setting(
            setting,
            format!("'{propname}' must be a {} property", expected.prefix()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = TransportSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.relaxation_source, 1.0);
        assert_eq!(settings.relaxation_quantity, 1.0);
    }

    #[test]
    fn test_builder() {
        let settings = TransportSettings::new()
            .with_quantity("pore.mole_fraction")
            .with_conductance("throat.conductance")
            .with_tolerance(1e-10)
            .with_max_iter(10)
            .with_relaxation(0.5, 0.8)
            .with_divergence_window(3);
        assert!(settings.validate().is_ok());
        assert_eq!(settings.quantity, "pore.mole_fraction");
        assert_eq!(settings.max_iter, 10);
        assert_eq!(settings.relaxation_quantity, 0.8);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = TransportSettings::default();
        assert!(base.clone().with_tolerance(-1e-6).validate().is_err());
        assert!(base.clone().with_tolerance(f64::NAN).validate().is_err());
        assert!(base.clone().with_tolerance(0.0).validate().is_ok());
        assert!(base.clone().with_max_iter(0).validate().is_err());
        assert!(base.clone().with_relaxation(0.0, 1.0).validate().is_err());
        assert!(base.clone().with_relaxation(1.0, 1.5).validate().is_err());
        assert!(base.clone().with_divergence_window(0).validate().is_err());
    }

    #[test]
    fn test_propname_elements_checked() {
        let base = TransportSettings::default();
        assert!(base.clone().with_quantity("throat.x").validate().is_err());
        assert!(base.clone().with_conductance("pore.g").validate().is_err());
        assert!(base.clone().with_quantity("concentration").validate().is_err());
    }
}
