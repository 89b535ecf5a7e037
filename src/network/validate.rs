//! Topology validation.

use crate::error::{PnflowError, Result};

/// Validate throat endpoints against the pore count.
///
/// Checks:
/// - Every endpoint lies in [0, Np)
/// - No throat connects a pore to itself
pub fn validate_conns(num_pores: usize, conns: &[[usize; 2]]) -> Result<()> {
    for (throat, &[p1, p2]) in conns.iter().enumerate() {
        for pore in [p1, p2] {
            if pore >= num_pores {
                return Err(PnflowError::PoreOutOfRange {
                    throat,
                    pore,
                    num_pores,
                });
            }
        }
        if p1 == p2 {
            return Err(PnflowError::SelfLoop { throat, pore: p1 });
        }
    }
    Ok(())
}

/// Validate a pore list used for a registration.
///
/// The list must be non-empty and every index must be in range.
pub fn validate_pores(pores: &[usize], num_pores: usize, what: &str) -> Result<()> {
    if pores.is_empty() {
        return Err(PnflowError::EmptyPoreSet {
            what: what.to_string(),
        });
    }
    if let Some(&pore) = pores.iter().find(|&&p| p >= num_pores) {
        return Err(PnflowError::InvalidPore { pore, num_pores });
    }
    Ok(())
}
