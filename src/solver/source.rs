//! Source term models and their linearization.
//!
//! A source model gives the generation rate in a pore as a function of the
//! local quantity, `r(x)`. Each iteration linearizes it around the current
//! estimate x₀:
//!
//!   r(x) ≈ S1·x + S2,   S1 = dr/dx(x₀),   S2 = r(x₀) − S1·x₀
//!
//! and folds it into the system as `A[i,i] -= S1`, `b[i] += S2`.

use std::collections::BTreeMap;
use std::fmt;

use super::matrix::LinearSystem;
use super::FD_RELATIVE_STEP;
use crate::error::{PnflowError, Result};
use crate::network::validate_pores;
use crate::properties::{fetch, PropertyProvider};

/// A model parameter, uniform or given per pore.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// Same value in every pore
    Uniform(f64),
    /// One value per network pore, indexed by pore
    PerPore(Vec<f64>),
}

impl Param {
    /// Read a per-pore parameter array from a property provider.
    ///
    /// A missing array is regenerated from its model.
    pub fn from_provider<P: PropertyProvider + ?Sized>(provider: &mut P, propname: &str) -> Result<Self> {
        Ok(Param::PerPore(fetch(provider, propname)?))
    }

    /// Value at a pore.
    pub fn at(&self, pore: usize) -> f64 {
        match self {
            Param::Uniform(v) => *v,
            Param::PerPore(values) => values[pore],
        }
    }

    fn validate(&self, name: &str, num_pores: usize) -> Result<()> {
        match self {
            Param::Uniform(v) if !v.is_finite() => Err(PnflowError::invalid_model(
                name,
                format!("parameter must be finite, got {v}"),
            )),
            Param::PerPore(values) if values.len() != num_pores => {
                Err(PnflowError::length_mismatch(name, num_pores, values.len()))
            }
            Param::PerPore(values) => match values.iter().position(|v| !v.is_finite()) {
                Some(index) => Err(PnflowError::NonFiniteValue {
                    name: name.to_string(),
                    index,
                }),
                None => Ok(()),
            },
            Param::Uniform(_) => Ok(()),
        }
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Uniform(value)
    }
}

impl From<Vec<f64>> for Param {
    fn from(values: Vec<f64>) -> Self {
        Param::PerPore(values)
    }
}

/// A (possibly nonlinear) generation rate as a function of the quantity.
pub trait SourceModel {
    /// Rate in `pore` when the quantity there is `x`.
    fn rate(&self, pore: usize, x: f64) -> f64;

    /// Analytic d(rate)/dx, if the model has one.
    ///
    /// Models returning `None` are differentiated numerically.
    fn derivative(&self, _pore: usize, _x: f64) -> Option<f64> {
        None
    }

    /// Check the model's parameters against the network size.
    fn validate(&self, _num_pores: usize) -> Result<()> {
        Ok(())
    }
}

/// Standard kinetics: r = A·x^b.
#[derive(Debug, Clone)]
pub struct StandardKinetics {
    pub prefactor: Param,
    pub exponent: Param,
}

impl StandardKinetics {
    pub fn new(prefactor: impl Into<Param>, exponent: impl Into<Param>) -> Self {
        Self {
            prefactor: prefactor.into(),
            exponent: exponent.into(),
        }
    }
}

impl SourceModel for StandardKinetics {
    fn rate(&self, pore: usize, x: f64) -> f64 {
        self.prefactor.at(pore) * x.powf(self.exponent.at(pore))
    }

    fn derivative(&self, pore: usize, x: f64) -> Option<f64> {
        let b = self.exponent.at(pore);
        Some(self.prefactor.at(pore) * b * x.powf(b - 1.0))
    }

    fn validate(&self, num_pores: usize) -> Result<()> {
        self.prefactor.validate("prefactor", num_pores)?;
        self.exponent.validate("exponent", num_pores)
    }
}

/// Linear kinetics: r = A1·x + A2.
#[derive(Debug, Clone)]
pub struct LinearKinetics {
    pub a1: Param,
    pub a2: Param,
}

impl LinearKinetics {
    pub fn new(a1: impl Into<Param>, a2: impl Into<Param>) -> Self {
        Self {
            a1: a1.into(),
            a2: a2.into(),
        }
    }
}

impl SourceModel for LinearKinetics {
    fn rate(&self, pore: usize, x: f64) -> f64 {
        self.a1.at(pore) * x + self.a2.at(pore)
    }

    fn derivative(&self, pore: usize, _x: f64) -> Option<f64> {
        Some(self.a1.at(pore))
    }

    fn validate(&self, num_pores: usize) -> Result<()> {
        self.a1.validate("a1", num_pores)?;
        self.a2.validate("a2", num_pores)
    }
}

/// Power law: r = A1·x^A2 + A3.
#[derive(Debug, Clone)]
pub struct PowerLaw {
    pub a1: Param,
    pub a2: Param,
    pub a3: Param,
}

impl PowerLaw {
    pub fn new(a1: impl Into<Param>, a2: impl Into<Param>, a3: impl Into<Param>) -> Self {
        Self {
            a1: a1.into(),
            a2: a2.into(),
            a3: a3.into(),
        }
    }
}

impl SourceModel for PowerLaw {
    fn rate(&self, pore: usize, x: f64) -> f64 {
        self.a1.at(pore) * x.powf(self.a2.at(pore)) + self.a3.at(pore)
    }

    fn derivative(&self, pore: usize, x: f64) -> Option<f64> {
        let a2 = self.a2.at(pore);
        Some(self.a1.at(pore) * a2 * x.powf(a2 - 1.0))
    }

    fn validate(&self, num_pores: usize) -> Result<()> {
        self.a1.validate("a1", num_pores)?;
        self.a2.validate("a2", num_pores)?;
        self.a3.validate("a3", num_pores)
    }
}

/// Exponential kinetics: r = A1·exp(A2·x) + A3.
#[derive(Debug, Clone)]
pub struct ExponentialKinetics {
    pub a1: Param,
    pub a2: Param,
    pub a3: Param,
}

impl ExponentialKinetics {
    pub fn new(a1: impl Into<Param>, a2: impl Into<Param>, a3: impl Into<Param>) -> Self {
        Self {
            a1: a1.into(),
            a2: a2.into(),
            a3: a3.into(),
        }
    }
}

impl SourceModel for ExponentialKinetics {
    fn rate(&self, pore: usize, x: f64) -> f64 {
        self.a1.at(pore) * (self.a2.at(pore) * x).exp() + self.a3.at(pore)
    }

    fn derivative(&self, pore: usize, x: f64) -> Option<f64> {
        let a2 = self.a2.at(pore);
        Some(self.a1.at(pore) * a2 * (a2 * x).exp())
    }

    fn validate(&self, num_pores: usize) -> Result<()> {
        self.a1.validate("a1", num_pores)?;
        self.a2.validate("a2", num_pores)?;
        self.a3.validate("a3", num_pores)
    }
}

type RateFn = Box<dyn Fn(usize, f64) -> f64>;

/// A source model built from closures.
///
/// Without a derivative closure the model is differentiated numerically.
pub struct FnSource {
    rate: RateFn,
    derivative: Option<RateFn>,
}

impl FnSource {
    pub fn new<F>(rate: F) -> Self
    where
        F: Fn(usize, f64) -> f64 + 'static,
    {
        Self {
            rate: Box::new(rate),
            derivative: None,
        }
    }

    /// Attach an analytic derivative.
    pub fn with_derivative<F>(mut self, derivative: F) -> Self
    where
        F: Fn(usize, f64) -> f64 + 'static,
    {
        self.derivative = Some(Box::new(derivative));
        self
    }
}

impl SourceModel for FnSource {
    fn rate(&self, pore: usize, x: f64) -> f64 {
        (self.rate)(pore, x)
    }

    fn derivative(&self, pore: usize, x: f64) -> Option<f64> {
        self.derivative.as_ref().map(|d| d(pore, x))
    }
}

impl fmt::Debug for FnSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSource")
            .field("analytic_derivative", &self.derivative.is_some())
            .finish()
    }
}

/// Affine approximation `S1·x + S2` of a source, aligned with its pores.
#[derive(Debug, Clone, PartialEq)]
pub struct Linearization {
    pub s1: Vec<f64>,
    pub s2: Vec<f64>,
}

/// Turns source models into affine system contributions.
#[derive(Debug, Clone, Copy)]
pub struct SourceTermLinearizer {
    /// Finite-difference step relative to |x| (absolute at x = 0)
    pub fd_step: f64,
}

impl Default for SourceTermLinearizer {
    fn default() -> Self {
        Self {
            fd_step: FD_RELATIVE_STEP,
        }
    }
}

impl SourceTermLinearizer {
    /// Linearize `model` over `pores` around the quantity field `x0`.
    pub fn linearize(&self, model: &dyn SourceModel, pores: &[usize], x0: &[f64]) -> Linearization {
        let mut s1 = Vec::with_capacity(pores.len());
        let mut s2 = Vec::with_capacity(pores.len());
        for &pore in pores {
            let x = x0[pore];
            let rate = model.rate(pore, x);
            let slope = model
                .derivative(pore, x)
                .unwrap_or_else(|| self.central_difference(model, pore, x));
            s1.push(slope);
            s2.push(rate - slope * x);
        }
        Linearization { s1, s2 }
    }

    /// Fold a linearization into the system: `A[i,i] -= S1`, `b[i] += S2`.
    pub fn inject(&self, system: &mut LinearSystem, pores: &[usize], lin: &Linearization) {
        for (k, &pore) in pores.iter().enumerate() {
            system.a.add(pore, pore, -lin.s1[k]);
            system.add_source(pore, lin.s2[k]);
        }
    }

    fn central_difference(&self, model: &dyn SourceModel, pore: usize, x: f64) -> f64 {
        let h = if x == 0.0 { self.fd_step } else { self.fd_step * x.abs() };
        (model.rate(pore, x + h) - model.rate(pore, x - h)) / (2.0 * h)
    }
}

/// A registered source: a model acting on a pore set.
pub struct SourceTerm {
    /// Name the rate array is published under
    pub propname: String,
    /// Sorted target pores
    pub pores: Vec<usize>,
    model: Box<dyn SourceModel>,
    /// Relaxed linearization from the previous iteration
    linearization: Option<Linearization>,
    /// Relaxed rate per target pore
    rate: Vec<f64>,
}

impl SourceTerm {
    /// The model driving this source.
    pub fn model(&self) -> &dyn SourceModel {
        self.model.as_ref()
    }

    /// Current linearization, if the term has been linearized this run.
    pub fn linearization(&self) -> Option<&Linearization> {
        self.linearization.as_ref()
    }

    /// Relaxed rate per target pore, aligned with `pores`.
    pub fn rate(&self) -> &[f64] {
        &self.rate
    }

    /// Linearize at `x`, blending with the previous iteration's coefficients
    /// by `relax`, and inject the result into the system.
    ///
    /// Fails with a convergence error if a coefficient is not finite.
    pub fn linearize_into(
        &mut self,
        linearizer: &SourceTermLinearizer,
        system: &mut LinearSystem,
        x: &[f64],
        relax: f64,
        iteration: usize,
    ) -> Result<()> {
        let mut lin = linearizer.linearize(self.model.as_ref(), &self.pores, x);
        if let Some(prev) = &self.linearization {
            blend(&mut lin.s1, &prev.s1, relax);
            blend(&mut lin.s2, &prev.s2, relax);
        }
        for (k, (s1, s2)) in lin.s1.iter().zip(&lin.s2).enumerate() {
            if !s1.is_finite() || !s2.is_finite() {
                return Err(PnflowError::NonFiniteSolution {
                    iteration,
                    pore: self.pores[k],
                    what: format!("linearization of source '{}'", self.propname),
                });
            }
        }
        linearizer.inject(system, &self.pores, &lin);
        self.linearization = Some(lin);
        Ok(())
    }

    /// Recompute the raw rate at `x` and relax the stored rate by `relax`.
    pub fn update_rate(&mut self, x: &[f64], relax: f64) {
        let mut fresh: Vec<f64> = self
            .pores
            .iter()
            .map(|&pore| self.model.rate(pore, x[pore]))
            .collect();
        if self.rate.len() == fresh.len() {
            blend(&mut fresh, &self.rate, relax);
        }
        self.rate = fresh;
    }

    /// Forget relaxation history before a new run.
    fn reset(&mut self) {
        self.linearization = None;
        self.rate.clear();
    }
}

impl fmt::Debug for SourceTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceTerm")
            .field("propname", &self.propname)
            .field("pores", &self.pores.len())
            .finish()
    }
}

/// `fresh = relax·fresh + (1 − relax)·old`
fn blend(fresh: &mut [f64], old: &[f64], relax: f64) {
    for (f, o) in fresh.iter_mut().zip(old) {
        *f = relax * *f + (1.0 - relax) * o;
    }
}

/// Registered source terms, each pore targeted by at most one.
#[derive(Debug, Default)]
pub struct SourceTerms {
    num_pores: usize,
    terms: Vec<SourceTerm>,
    /// Pore -> index into `terms`
    owner: BTreeMap<usize, usize>,
}

impl SourceTerms {
    /// Create an empty registry for a network of `num_pores` pores.
    pub fn new(num_pores: usize) -> Self {
        Self {
            num_pores,
            terms: Vec::new(),
            owner: BTreeMap::new(),
        }
    }

    /// Register a model on a pore set.
    ///
    /// Fails with a conflict if the propname is taken or any pore already
    /// has a source; the model is validated before anything is stored.
    pub fn add(&mut self, propname: &str, pores: &[usize], model: Box<dyn SourceModel>) -> Result<()> {
        validate_pores(pores, self.num_pores, "a source term")?;
        if self.terms.iter().any(|t| t.propname == propname) {
            return Err(PnflowError::DuplicateSource {
                propname: propname.to_string(),
            });
        }
        for &p in pores {
            if let Some(term) = self.source_at(p) {
                return Err(PnflowError::conflict(
                    p,
                    format!("source term '{}'", term.propname),
                    format!("source term '{propname}'"),
                ));
            }
        }
        model.validate(self.num_pores)?;

        let mut pores = pores.to_vec();
        pores.sort_unstable();
        pores.dedup();

        let index = self.terms.len();
        for &p in &pores {
            self.owner.insert(p, index);
        }
        self.terms.push(SourceTerm {
            propname: propname.to_string(),
            pores,
            model,
            linearization: None,
            rate: Vec::new(),
        });
        Ok(())
    }

    /// Unregister a source by name. Returns whether it existed.
    pub fn remove(&mut self, propname: &str) -> bool {
        let Some(index) = self.terms.iter().position(|t| t.propname == propname) else {
            return false;
        };
        self.terms.remove(index);
        self.owner.clear();
        for (i, term) in self.terms.iter().enumerate() {
            for &p in &term.pores {
                self.owner.insert(p, i);
            }
        }
        true
    }

    /// The source acting on a pore, if any.
    pub fn source_at(&self, pore: usize) -> Option<&SourceTerm> {
        self.owner.get(&pore).map(|&i| &self.terms[i])
    }

    /// Look up a source by name.
    pub fn get(&self, propname: &str) -> Option<&SourceTerm> {
        self.terms.iter().find(|t| t.propname == propname)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceTerm> {
        self.terms.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SourceTerm> {
        self.terms.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn clear(&mut self) {
        self.terms.clear();
        self.owner.clear();
    }

    /// Forget all relaxation history.
    pub fn reset(&mut self) {
        for term in &mut self.terms {
            term.reset();
        }
    }
}
