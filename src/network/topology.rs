//! Network graph structure.

use std::collections::{BTreeMap, BTreeSet};

use super::types::NetworkView;
use super::validate::validate_conns;
use crate::error::{PnflowError, Result};

/// A pore network: pores joined by throats, with named labels.
#[derive(Debug, Clone)]
pub struct Network {
    /// Number of pores
    num_pores: usize,

    /// Throat endpoints, indexed by throat
    conns: Vec<[usize; 2]>,

    /// Pore labels (label name -> sorted pore indices)
    pore_labels: BTreeMap<String, Vec<usize>>,

    /// Throat labels (label name -> sorted throat indices)
    throat_labels: BTreeMap<String, Vec<usize>>,
}

impl Network {
    /// Build a network from a pore count and throat endpoint pairs.
    ///
    /// Both elements get an `all` label.
    pub fn new(num_pores: usize, conns: Vec<[usize; 2]>) -> Result<Self> {
        validate_conns(num_pores, &conns)?;

        let mut pore_labels = BTreeMap::new();
        pore_labels.insert("all".to_string(), (0..num_pores).collect());
        let mut throat_labels = BTreeMap::new();
        throat_labels.insert("all".to_string(), (0..conns.len()).collect());

        Ok(Self {
            num_pores,
            conns,
            pore_labels,
            throat_labels,
        })
    }

    /// Generate a simple cubic lattice with 6-connectivity.
    ///
    /// Pore `(i, j, k)` has index `i*ny*nz + j*nz + k`. Face labels follow
    /// the axes: `front`/`back` on x, `left`/`right` on y and
    /// `bottom`/`top` on z. Pores on any face are also labelled `surface`,
    /// the rest `internal`.
    pub fn cubic(shape: [usize; 3]) -> Result<Self> {
        let [nx, ny, nz] = shape;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(PnflowError::invalid_setting(
                "shape",
                format!("every dimension must be at least 1, got {nx}x{ny}x{nz}"),
            ));
        }

        let index = |i: usize, j: usize, k: usize| i * ny * nz + j * nz + k;
        let num_pores = nx * ny * nz;

        let mut conns = Vec::with_capacity(3 * num_pores);
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let p = index(i, j, k);
                    if i + 1 < nx {
                        conns.push([p, index(i + 1, j, k)]);
                    }
                    if j + 1 < ny {
                        conns.push([p, index(i, j + 1, k)]);
                    }
                    if k + 1 < nz {
                        conns.push([p, index(i, j, k + 1)]);
                    }
                }
            }
        }

        let mut network = Self::new(num_pores, conns)?;

        let [lx, ly, lz] = [nx - 1, ny - 1, nz - 1];
        let faces: [(&str, usize, usize); 6] = [
            ("front", 0, 0),
            ("back", 0, lx),
            ("left", 1, 0),
            ("right", 1, ly),
            ("bottom", 2, 0),
            ("top", 2, lz),
        ];

        let mut surface = BTreeSet::new();
        for (name, axis, at) in faces {
            let mut pores = Vec::new();
            for i in 0..nx {
                for j in 0..ny {
                    for k in 0..nz {
                        if [i, j, k][axis] == at {
                            pores.push(index(i, j, k));
                        }
                    }
                }
            }
            surface.extend(pores.iter().copied());
            network.set_pore_label(name, pores)?;
        }

        let internal: Vec<usize> = (0..num_pores).filter(|p| !surface.contains(p)).collect();
        network.set_pore_label("surface", surface.into_iter().collect())?;
        network.set_pore_label("internal", internal)?;

        Ok(network)
    }

    /// Attach a pore label, replacing any existing label of that name.
    pub fn set_pore_label(&mut self, label: &str, pores: Vec<usize>) -> Result<()> {
        let pores = normalize(pores, self.num_pores)?;
        self.pore_labels.insert(label.to_string(), pores);
        Ok(())
    }

    /// Attach a throat label, replacing any existing label of that name.
    pub fn set_throat_label(&mut self, label: &str, throats: Vec<usize>) -> Result<()> {
        let throats = normalize(throats, self.conns.len()).map_err(|_| {
            PnflowError::invalid_setting(label, "throat index out of range")
        })?;
        self.throat_labels.insert(label.to_string(), throats);
        Ok(())
    }

    /// Sorted union of the pores carrying any of the given labels.
    pub fn pores_any(&self, labels: &[&str]) -> Result<Vec<usize>> {
        let mut union = BTreeSet::new();
        for label in labels {
            union.extend(self.pores(label)?);
        }
        Ok(union.into_iter().collect())
    }

    /// All pore label names.
    pub fn pore_labels(&self) -> impl Iterator<Item = &str> {
        self.pore_labels.keys().map(String::as_str)
    }

    /// Pores adjacent to `pore` through a throat.
    pub fn neighbors(&self, pore: usize) -> Vec<usize> {
        let mut neighbors: Vec<usize> = self
            .conns
            .iter()
            .filter_map(|&[a, b]| {
                if a == pore {
                    Some(b)
                } else if b == pore {
                    Some(a)
                } else {
                    None
                }
            })
            .collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }
}

impl NetworkView for Network {
    fn num_pores(&self) -> usize {
        self.num_pores
    }

    fn conns(&self) -> &[[usize; 2]] {
        &self.conns
    }

    fn pores(&self, label: &str) -> Result<Vec<usize>> {
        self.pore_labels
            .get(label)
            .cloned()
            .ok_or_else(|| PnflowError::UnknownLabel {
                label: label.to_string(),
            })
    }

    fn throats(&self, label: &str) -> Result<Vec<usize>> {
        self.throat_labels
            .get(label)
            .cloned()
            .ok_or_else(|| PnflowError::UnknownLabel {
                label: label.to_string(),
            })
    }
}

/// Sort, deduplicate and range-check an index list.
fn normalize(mut indices: Vec<usize>, count: usize) -> Result<Vec<usize>> {
    indices.sort_unstable();
    indices.dedup();
    if let Some(&last) = indices.last() {
        if last >= count {
            return Err(PnflowError::InvalidPore {
                pore: last,
                num_pores: count,
            });
        }
    }
    Ok(indices)
}
