//! Boundary condition registry and application.

use std::collections::{BTreeMap, BTreeSet};

use super::matrix::LinearSystem;
use crate::error::{PnflowError, Result};
use crate::network::validate_pores;

/// A boundary condition on a single pore.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryCondition {
    /// Dirichlet: the quantity is fixed to this value
    Value(f64),
    /// Neumann: this rate enters the pore
    Rate(f64),
}

impl BoundaryCondition {
    /// Human-readable kind, used in conflict messages.
    pub fn kind(&self) -> &'static str {
        match self {
            BoundaryCondition::Value(_) => "a value boundary condition",
            BoundaryCondition::Rate(_) => "a rate boundary condition",
        }
    }
}

/// How a rate boundary condition is spread over its pores.
#[derive(Debug, Clone, PartialEq)]
pub enum RateSpec {
    /// Total rate split evenly: each pore gets `total / |pores|`
    Total(f64),
    /// One rate per pore, aligned with the pore list
    PerPore(Vec<f64>),
}

/// Boundary conditions keyed by pore.
#[derive(Debug, Clone, Default)]
pub struct BoundaryConditions {
    num_pores: usize,
    conditions: BTreeMap<usize, BoundaryCondition>,
}

impl BoundaryConditions {
    /// Create an empty registry for a network of `num_pores` pores.
    pub fn new(num_pores: usize) -> Self {
        Self {
            num_pores,
            conditions: BTreeMap::new(),
        }
    }

    /// Condition on a pore, if any.
    pub fn get(&self, pore: usize) -> Option<BoundaryCondition> {
        self.conditions.get(&pore).copied()
    }

    /// Whether a pore carries any boundary condition.
    pub fn contains(&self, pore: usize) -> bool {
        self.conditions.contains_key(&pore)
    }

    /// All conditions, ordered by pore.
    pub fn iter(&self) -> impl Iterator<Item = (usize, BoundaryCondition)> + '_ {
        self.conditions.iter().map(|(&p, &bc)| (p, bc))
    }

    /// Pores with a value condition.
    pub fn value_pores(&self) -> impl Iterator<Item = usize> + '_ {
        self.iter()
            .filter(|(_, bc)| matches!(bc, BoundaryCondition::Value(_)))
            .map(|(p, _)| p)
    }

    /// Number of constrained pores.
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Whether no condition is registered.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Fix the quantity in each pore to `value`.
    ///
    /// Overwrites earlier value conditions on the same pores; fails with a
    /// conflict if a pore holds a rate condition. Nothing is registered when
    /// any pore is rejected.
    pub fn set_value(&mut self, pores: &[usize], value: f64) -> Result<()> {
        validate_pores(pores, self.num_pores, "a value boundary condition")?;
        if !value.is_finite() {
            return Err(PnflowError::invalid_setting(
                "value",
                format!("boundary value must be finite, got {value}"),
            ));
        }
        let bc = BoundaryCondition::Value(value);
        self.check_kind(pores, &bc)?;
        for &p in pores {
            self.conditions.insert(p, bc);
        }
        Ok(())
    }

    /// Impose a rate on each pore.
    ///
    /// Overwrites earlier rate conditions on the same pores (last write
    /// wins); fails with a conflict if a pore holds a value condition.
    /// A total rate is split over the distinct pores; per-pore rates must
    /// not list a pore twice.
    pub fn set_rate(&mut self, pores: &[usize], rate: RateSpec) -> Result<()> {
        validate_pores(pores, self.num_pores, "a rate boundary condition")?;
        let (pores, rates) = match rate {
            RateSpec::Total(total) => {
                let mut distinct = pores.to_vec();
                distinct.sort_unstable();
                distinct.dedup();
                let share = total / distinct.len() as f64;
                let rates = vec![share; distinct.len()];
                (distinct, rates)
            }
            RateSpec::PerPore(rates) => {
                if rates.len() != pores.len() {
                    return Err(PnflowError::length_mismatch("rates", pores.len(), rates.len()));
                }
                let mut seen = BTreeSet::new();
                if let Some(&pore) = pores.iter().find(|&&p| !seen.insert(p)) {
                    return Err(PnflowError::invalid_setting(
                        "rates",
                        format!("pore {pore} is listed more than once"),
                    ));
                }
                (pores.to_vec(), rates)
            }
        };
        if let Some(index) = rates.iter().position(|r| !r.is_finite()) {
            return Err(PnflowError::NonFiniteValue {
                name: "rates".to_string(),
                index,
            });
        }
        self.check_kind(&pores, &BoundaryCondition::Rate(0.0))?;
        for (&p, &r) in pores.iter().zip(&rates) {
            self.conditions.insert(p, BoundaryCondition::Rate(r));
        }
        Ok(())
    }

    /// Drop any condition on the given pores.
    pub fn remove(&mut self, pores: &[usize]) {
        for p in pores {
            self.conditions.remove(p);
        }
    }

    /// Drop every condition.
    pub fn clear(&mut self) {
        self.conditions.clear();
    }

    /// Impose all conditions on the system.
    ///
    /// A value pore's row becomes the identity row with `b` equal to the
    /// value, whatever the row held before, so applying twice is the same as
    /// applying once. A rate pore only adds its rate to `b`.
    pub fn apply(&self, system: &mut LinearSystem) {
        for (&pore, bc) in &self.conditions {
            match *bc {
                BoundaryCondition::Value(value) => {
                    system.a.set_identity_row(pore);
                    system.b[pore] = value;
                }
                BoundaryCondition::Rate(rate) => {
                    system.add_source(pore, rate);
                }
            }
        }
    }

    /// Reject pores already holding a different kind of condition.
    fn check_kind(&self, pores: &[usize], requested: &BoundaryCondition) -> Result<()> {
        for &p in pores {
            if let Some(existing) = self.conditions.get(&p) {
                if std::mem::discriminant(existing) != std::mem::discriminant(requested) {
                    return Err(PnflowError::conflict(p, existing.kind(), requested.kind()));
                }
            }
        }
        Ok(())
    }
}
