//! Property store with explicit index-set ownership.

use std::collections::HashMap;
use std::fmt;

use super::provider::PropertyProvider;
use crate::error::{PnflowError, Result};
use crate::network::{Element, NetworkView};

/// Identifier of a domain within a [`PropertyStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainId(pub usize);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D{}", self.0)
    }
}

/// A property model: computes values for a domain's indices.
pub type PropertyModel = Box<dyn Fn(&ModelInputs<'_>) -> Result<Vec<f64>>>;

/// What a property model sees when it runs.
pub struct ModelInputs<'a> {
    store: &'a PropertyStore,
    domain: &'a str,
    element: Element,
    indices: &'a [usize],
}

impl ModelInputs<'_> {
    /// Global indices the model must produce values for, in order.
    pub fn indices(&self) -> &[usize] {
        self.indices
    }

    /// Name of the domain the model belongs to.
    pub fn domain(&self) -> &str {
        self.domain
    }

    /// Element kind the model produces values for.
    pub fn element(&self) -> Element {
        self.element
    }

    /// Another property restricted to this model's indices.
    ///
    /// The dependency must already be available; it is not regenerated, and
    /// it must live on the same element kind as the model.
    pub fn lookup(&self, propname: &str) -> Result<Vec<f64>> {
        let element = Element::from_propname(propname)?;
        if element != self.element {
            return Err(PnflowError::invalid_model(
                propname,
                format!(
                    "a {} model in domain '{}' cannot read a {} property",
                    self.element, self.domain, element
                ),
            ));
        }
        let global = self
            .store
            .get(propname)
            .ok_or_else(|| PnflowError::MissingProperty {
                propname: propname.to_string(),
            })?;
        Ok(self.indices.iter().map(|&i| global[i]).collect())
    }
}

/// A subset of pores and throats governed by one set of arrays and models.
struct Domain {
    name: String,
    /// Sorted pore indices owned by this domain
    pores: Vec<usize>,
    /// Sorted throat indices owned by this domain
    throats: Vec<usize>,
    /// Local arrays, aligned with `pores` or `throats`
    arrays: HashMap<String, Vec<f64>>,
    models: Vec<(String, PropertyModel)>,
}

impl Domain {
    fn indices(&self, element: Element) -> &[usize] {
        match element {
            Element::Pore => &self.pores,
            Element::Throat => &self.throats,
        }
    }
}

/// Property arrays for one phase on one network.
///
/// Arrays live either at phase level (full length, set through
/// [`PropertyProvider::set`]) or inside domains. Each pore and throat is
/// owned by at most one domain; a global array is resolved by reading every
/// index from its owning domain.
pub struct PropertyStore {
    num_pores: usize,
    num_throats: usize,
    arrays: HashMap<String, Vec<f64>>,
    domains: Vec<Domain>,
    pore_owner: Vec<Option<usize>>,
    throat_owner: Vec<Option<usize>>,
}

impl PropertyStore {
    /// Create an empty store for the given element counts.
    pub fn new(num_pores: usize, num_throats: usize) -> Self {
        Self {
            num_pores,
            num_throats,
            arrays: HashMap::new(),
            domains: Vec::new(),
            pore_owner: vec![None; num_pores],
            throat_owner: vec![None; num_throats],
        }
    }

    /// Create an empty store sized for a network.
    pub fn for_network<N: NetworkView + ?Sized>(network: &N) -> Self {
        Self::new(network.num_pores(), network.num_throats())
    }

    /// Number of elements of the given kind.
    pub fn count(&self, element: Element) -> usize {
        match element {
            Element::Pore => self.num_pores,
            Element::Throat => self.num_throats,
        }
    }

    /// Register a domain owning the given pores and throats.
    pub fn add_domain(
        &mut self,
        name: &str,
        mut pores: Vec<usize>,
        mut throats: Vec<usize>,
    ) -> Result<DomainId> {
        pores.sort_unstable();
        pores.dedup();
        throats.sort_unstable();
        throats.dedup();

        let id = self.domains.len();
        for (element, indices, owners) in [
            (Element::Pore, &pores, &self.pore_owner),
            (Element::Throat, &throats, &self.throat_owner),
        ] {
            for &index in indices {
                match owners.get(index) {
                    None => {
                        return Err(PnflowError::InvalidPore {
                            pore: index,
                            num_pores: owners.len(),
                        })
                    }
                    Some(Some(owner)) => {
                        return Err(PnflowError::DomainOverlap {
                            element: element.to_string(),
                            index,
                            owner: self.domains[*owner].name.clone(),
                        })
                    }
                    Some(None) => {}
                }
            }
        }

        for &p in &pores {
            self.pore_owner[p] = Some(id);
        }
        for &t in &throats {
            self.throat_owner[t] = Some(id);
        }
        self.domains.push(Domain {
            name: name.to_string(),
            pores,
            throats,
            arrays: HashMap::new(),
            models: Vec::new(),
        });
        Ok(DomainId(id))
    }

    /// Find a domain by name.
    pub fn domain(&self, name: &str) -> Option<DomainId> {
        self.domains.iter().position(|d| d.name == name).map(DomainId)
    }

    /// Set a domain-local array, aligned with the domain's sorted indices.
    pub fn set_domain_values(&mut self, domain: DomainId, propname: &str, values: Vec<f64>) -> Result<()> {
        let element = Element::from_propname(propname)?;
        let d = self.domain_mut(domain)?;
        let expected = d.indices(element).len();
        if values.len() != expected {
            return Err(PnflowError::length_mismatch(propname, expected, values.len()));
        }
        d.arrays.insert(propname.to_string(), values);
        Ok(())
    }

    /// Set the same value on every index a domain owns.
    pub fn set_domain_uniform(&mut self, domain: DomainId, propname: &str, value: f64) -> Result<()> {
        let element = Element::from_propname(propname)?;
        let len = self.domain_mut(domain)?.indices(element).len();
        self.set_domain_values(domain, propname, vec![value; len])
    }

    /// Attach a model that derives `propname` for a domain.
    ///
    /// The model runs on the next [`regenerate`](PropertyProvider::regenerate)
    /// of that propname or [`regenerate_models`](Self::regenerate_models).
    pub fn add_model<F>(&mut self, domain: DomainId, propname: &str, model: F) -> Result<()>
    where
        F: Fn(&ModelInputs<'_>) -> Result<Vec<f64>> + 'static,
    {
        Element::from_propname(propname)?;
        let d = self.domain_mut(domain)?;
        d.models.retain(|(name, _)| name != propname);
        d.models.push((propname.to_string(), Box::new(model)));
        Ok(())
    }

    /// Run every model in every domain, in registration order.
    pub fn regenerate_models(&mut self) -> Result<()> {
        for d in 0..self.domains.len() {
            for m in 0..self.domains[d].models.len() {
                let propname = self.domains[d].models[m].0.clone();
                self.run_model(d, m, &propname)?;
            }
        }
        Ok(())
    }

    /// Remove a property from phase level and every domain.
    pub fn remove(&mut self, propname: &str) {
        self.arrays.remove(propname);
        for d in &mut self.domains {
            d.arrays.remove(propname);
        }
    }

    fn domain_mut(&mut self, domain: DomainId) -> Result<&mut Domain> {
        self.domains
            .get_mut(domain.0)
            .ok_or_else(|| PnflowError::invalid_setting("domain", format!("unknown domain {domain}")))
    }

    fn run_model(&mut self, d: usize, m: usize, propname: &str) -> Result<()> {
        let element = Element::from_propname(propname)?;
        let values = {
            let domain = &self.domains[d];
            let inputs = ModelInputs {
                store: &*self,
                domain: &domain.name,
                element,
                indices: domain.indices(element),
            };
            (domain.models[m].1)(&inputs)?
        };

        let expected = self.domains[d].indices(element).len();
        if values.len() != expected {
            return Err(PnflowError::invalid_model(
                propname,
                format!("produced {} values for {} indices", values.len(), expected),
            ));
        }
        self.domains[d].arrays.insert(propname.to_string(), values);
        Ok(())
    }

    /// Resolve a global array through domain ownership.
    fn assemble(&self, propname: &str, element: Element) -> Option<Vec<f64>> {
        let owners = match element {
            Element::Pore => &self.pore_owner,
            Element::Throat => &self.throat_owner,
        };
        if owners.is_empty() {
            return None;
        }

        let mut values = Vec::with_capacity(owners.len());
        for (index, owner) in owners.iter().enumerate() {
            let domain = &self.domains[(*owner)?];
            let local = domain.arrays.get(propname)?;
            let position = domain.indices(element).binary_search(&index).ok()?;
            values.push(local[position]);
        }
        Some(values)
    }
}

impl PropertyProvider for PropertyStore {
    fn get(&self, propname: &str) -> Option<Vec<f64>> {
        let element = Element::from_propname(propname).ok()?;
        self.assemble(propname, element)
            .or_else(|| self.arrays.get(propname).cloned())
    }

    fn regenerate(&mut self, propname: &str) -> Result<Vec<f64>> {
        let mut ran = false;
        for d in 0..self.domains.len() {
            if let Some(m) = self.domains[d].models.iter().position(|(name, _)| name == propname) {
                self.run_model(d, m, propname)?;
                ran = true;
            }
        }
        let missing = || PnflowError::MissingProperty {
            propname: propname.to_string(),
        };
        if !ran {
            return Err(missing());
        }
        self.get(propname).ok_or_else(missing)
    }

    fn set(&mut self, propname: &str, values: Vec<f64>) -> Result<()> {
        let element = Element::from_propname(propname)?;
        let expected = self.count(element);
        if values.len() != expected {
            return Err(PnflowError::length_mismatch(propname, expected, values.len()));
        }
        self.arrays.insert(propname.to_string(), values);
        Ok(())
    }
}

impl fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let domains: Vec<&str> = self.domains.iter().map(|d| d.name.as_str()).collect();
        let mut arrays: Vec<&str> = self.arrays.keys().map(String::as_str).collect();
        arrays.sort_unstable();
        f.debug_struct("PropertyStore")
            .field("num_pores", &self.num_pores)
            .field("num_throats", &self.num_throats)
            .field("arrays", &arrays)
            .field("domains", &domains)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::fetch;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_phase_level_set_and_get() {
        let mut store = PropertyStore::new(3, 2);
        store.set("pore.concentration", vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(store.get("pore.concentration"), Some(vec![1.0, 2.0, 3.0]));
        assert!(store.get("pore.temperature").is_none());
        assert!(store.set("throat.conductance", vec![1.0]).is_err());
        assert!(store.set("conductance", vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_domains_resolve_by_owner() {
        let mut store = PropertyStore::new(4, 3);
        let a = store.add_domain("a", vec![0, 1], vec![0]).unwrap();
        let b = store.add_domain("b", vec![3, 2], vec![1, 2]).unwrap();
        store.set_domain_uniform(a, "throat.conductance", 1.0).unwrap();
        // Incomplete until every throat is covered
        assert!(store.get("throat.conductance").is_none());
        store.set_domain_values(b, "throat.conductance", vec![2.0, 3.0]).unwrap();
        assert_eq!(store.get("throat.conductance"), Some(vec![1.0, 2.0, 3.0]));

        store.set_domain_values(b, "pore.k", vec![20.0, 30.0]).unwrap();
        store.set_domain_values(a, "pore.k", vec![0.0, 10.0]).unwrap();
        assert_eq!(store.get("pore.k"), Some(vec![0.0, 10.0, 20.0, 30.0]));
        assert_eq!(store.domain("b"), Some(b));
    }

    #[test]
    fn test_domain_overlap_rejected() {
        let mut store = PropertyStore::new(4, 3);
        store.add_domain("a", vec![0, 1], vec![]).unwrap();
        let err = store.add_domain("b", vec![1, 2], vec![]).unwrap_err();
        assert!(matches!(err, PnflowError::DomainOverlap { index: 1, .. }));
        assert!(store.add_domain("c", vec![7], vec![]).is_err());
    }

    #[test]
    fn test_fetch_regenerates_missing_property() {
        let mut store = PropertyStore::new(2, 1);
        let all = store.add_domain("all", vec![0, 1], vec![0]).unwrap();
        store.set_domain_uniform(all, "throat.diameter", 2.0).unwrap();

        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        store
            .add_model(all, "throat.conductance", move |inputs| {
                counter.set(counter.get() + 1);
                Ok(inputs.lookup("throat.diameter")?.iter().map(|d| d * d).collect())
            })
            .unwrap();

        assert!(store.get("throat.conductance").is_none());
        assert_eq!(fetch(&mut store, "throat.conductance").unwrap(), vec![4.0]);
        assert_eq!(calls.get(), 1);
        // Cached after the first regeneration
        assert_eq!(fetch(&mut store, "throat.conductance").unwrap(), vec![4.0]);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_regenerate_without_model_fails() {
        let mut store = PropertyStore::new(2, 1);
        let err = fetch(&mut store, "throat.conductance").unwrap_err();
        assert!(matches!(err, PnflowError::MissingProperty { .. }));
    }

    #[test]
    fn test_lookup_rejects_other_element() {
        // More throats than pores: a pore array cannot be indexed by throat
        let mut store = PropertyStore::new(2, 3);
        let all = store.add_domain("all", vec![0, 1], vec![0, 1, 2]).unwrap();
        store.set_domain_uniform(all, "pore.diameter", 2.0).unwrap();
        store
            .add_model(all, "throat.g", |inputs| inputs.lookup("pore.diameter"))
            .unwrap();
        assert!(matches!(
            store.regenerate("throat.g"),
            Err(PnflowError::InvalidModel { .. })
        ));

        // Fewer throats than pores: the values must not leak through either
        let mut store = PropertyStore::new(2, 1);
        let all = store.add_domain("all", vec![0, 1], vec![0]).unwrap();
        store.set_domain_uniform(all, "pore.diameter", 2.0).unwrap();
        store
            .add_model(all, "throat.g", |inputs| inputs.lookup("pore.diameter"))
            .unwrap();
        assert!(store.regenerate("throat.g").is_err());
        assert!(store.get("throat.g").is_none());
    }

    #[test]
    fn test_remove_drops_every_level() {
        let mut store = PropertyStore::new(2, 1);
        let all = store.add_domain("all", vec![0, 1], vec![0]).unwrap();
        store.set_domain_uniform(all, "pore.k", 1.0).unwrap();
        store.set("pore.x", vec![1.0, 2.0]).unwrap();
        store.remove("pore.k");
        store.remove("pore.x");
        assert!(store.get("pore.k").is_none());
        assert!(store.get("pore.x").is_none());
        assert_eq!(store.count(Element::Throat), 1);
    }

    #[test]
    fn test_model_wrong_length_rejected() {
        let mut store = PropertyStore::new(2, 1);
        let all = store.add_domain("all", vec![0, 1], vec![0]).unwrap();
        store
            .add_model(all, "pore.volume", |_| Ok(vec![1.0]))
            .unwrap();
        assert!(matches!(
            store.regenerate_models(),
            Err(PnflowError::InvalidModel { .. })
        ));
    }
}
