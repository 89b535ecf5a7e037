//! Conductance matrix assembly.

use super::matrix::LinearSystem;
use crate::error::{PnflowError, Result};
use crate::network::{validate_conns, NetworkView};

/// Builds the Laplacian-like system A₀·x = 0 from throat conductances.
///
/// The matrix is symmetric, diagonally dominant and singular (every row sums
/// to zero) until at least one value boundary condition replaces a row.
pub struct LinearSystemBuilder<'a, N: NetworkView + ?Sized> {
    network: &'a N,
}

impl<'a, N: NetworkView + ?Sized> LinearSystemBuilder<'a, N> {
    /// Create a builder over a network.
    pub fn new(network: &'a N) -> Self {
        Self { network }
    }

    /// Check the network's throat endpoints.
    pub fn validate(&self) -> Result<()> {
        validate_conns(self.network.num_pores(), self.network.conns())
    }

    /// Check that every pore is either connected or constrained.
    ///
    /// A pore with zero total conductance and no boundary condition leaves an
    /// empty row in the matrix.
    pub fn check_isolated<F>(&self, conductance: &[f64], constrained: F) -> Result<()>
    where
        F: Fn(usize) -> bool,
    {
        let mut total = vec![0.0; self.network.num_pores()];
        for (&[i, j], &g) in self.network.conns().iter().zip(conductance) {
            total[i] += g.abs();
            total[j] += g.abs();
        }
        match total
            .iter()
            .enumerate()
            .find(|&(pore, &g)| g == 0.0 && !constrained(pore))
        {
            Some((pore, _)) => Err(PnflowError::IsolatedPore { pore }),
            None => Ok(()),
        }
    }

    /// Assemble A₀ and a zero b from a conductance array indexed by throat.
    pub fn build(&self, conductance: &[f64]) -> Result<LinearSystem> {
        let num_throats = self.network.num_throats();
        if conductance.len() != num_throats {
            return Err(PnflowError::length_mismatch(
                "conductance",
                num_throats,
                conductance.len(),
            ));
        }
        if let Some(index) = conductance.iter().position(|g| !g.is_finite()) {
            return Err(PnflowError::NonFiniteValue {
                name: "conductance".to_string(),
                index,
            });
        }
        self.validate()?;

        let mut system = LinearSystem::new(self.network.num_pores());
        for (&[i, j], &g) in self.network.conns().iter().zip(conductance) {
            system.a.stamp_conductance(i, j, g);
        }
        Ok(system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;

    /// A view that skips construction-time validation.
    struct RawView {
        num_pores: usize,
        conns: Vec<[usize; 2]>,
    }

    impl NetworkView for RawView {
        fn num_pores(&self) -> usize {
            self.num_pores
        }
        fn conns(&self) -> &[[usize; 2]] {
            &self.conns
        }
        fn pores(&self, label: &str) -> Result<Vec<usize>> {
            Err(PnflowError::UnknownLabel {
                label: label.to_string(),
            })
        }
        fn throats(&self, label: &str) -> Result<Vec<usize>> {
            self.pores(label)
        }
    }

    #[test]
    fn test_build_laplacian() {
        let net = Network::new(3, vec![[0, 1], [1, 2]]).unwrap();
        let sys = LinearSystemBuilder::new(&net).build(&[2.0, 3.0]).unwrap();
        assert_eq!(sys.a.get(0, 0), 2.0);
        assert_eq!(sys.a.get(1, 1), 5.0);
        assert_eq!(sys.a.get(1, 2), -3.0);
        assert_eq!(sys.a.get(2, 1), -3.0);
        assert_eq!(sys.b, vec![0.0; 3]);
    }

    #[test]
    fn test_build_is_order_independent() {
        let a = Network::new(3, vec![[0, 1], [1, 2], [0, 2]]).unwrap();
        let b = Network::new(3, vec![[2, 0], [2, 1], [1, 0]]).unwrap();
        let sa = LinearSystemBuilder::new(&a).build(&[1.0, 2.0, 4.0]).unwrap();
        let sb = LinearSystemBuilder::new(&b).build(&[4.0, 2.0, 1.0]).unwrap();
        assert_eq!(sa, sb);
    }

    #[test]
    fn test_out_of_range_throat() {
        let view = RawView {
            num_pores: 2,
            conns: vec![[0, 1], [1, 5]],
        };
        let err = LinearSystemBuilder::new(&view).build(&[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, PnflowError::PoreOutOfRange { pore: 5, .. }));
        assert!(err.is_assembly());
    }

    #[test]
    fn test_conductance_length_mismatch() {
        let net = Network::new(3, vec![[0, 1], [1, 2]]).unwrap();
        let err = LinearSystemBuilder::new(&net).build(&[1.0]).unwrap_err();
        assert!(matches!(err, PnflowError::LengthMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_non_finite_conductance() {
        let net = Network::new(2, vec![[0, 1]]).unwrap();
        let err = LinearSystemBuilder::new(&net).build(&[f64::NAN]).unwrap_err();
        assert!(matches!(err, PnflowError::NonFiniteValue { index: 0, .. }));
    }

    #[test]
    fn test_isolated_pore() {
        // Pore 2 has no throats at all, pore 3 only a zero-conductance throat
        let net = Network::new(4, vec![[0, 1], [1, 3]]).unwrap();
        let builder = LinearSystemBuilder::new(&net);
        let g = [1.0, 0.0];
        assert!(matches!(
            builder.check_isolated(&g, |_| false),
            Err(PnflowError::IsolatedPore { pore: 2 })
        ));
        assert!(matches!(
            builder.check_isolated(&g, |p| p == 2),
            Err(PnflowError::IsolatedPore { pore: 3 })
        ));
        assert!(builder.check_isolated(&g, |p| p >= 2).is_ok());
    }
}
