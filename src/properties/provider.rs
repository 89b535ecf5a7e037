//! Property provider capability.

use log::debug;

use crate::error::Result;

/// Named property arrays with lazy regeneration.
///
/// The solver asks for an array with [`get`](PropertyProvider::get) and, on a
/// miss, calls [`regenerate`](PropertyProvider::regenerate) to derive it from
/// whatever model the provider has registered under that name. Use [`fetch`]
/// to get that fallback in one call.
pub trait PropertyProvider {
    /// A full array (one value per pore or throat), if currently available.
    fn get(&self, propname: &str) -> Option<Vec<f64>>;

    /// Re-derive an array from its registered model(s) and return it.
    fn regenerate(&mut self, propname: &str) -> Result<Vec<f64>>;

    /// Store a full array.
    fn set(&mut self, propname: &str, values: Vec<f64>) -> Result<()>;
}

/// Get a property array, regenerating it when it is missing.
pub fn fetch<P: PropertyProvider + ?Sized>(provider: &mut P, propname: &str) -> Result<Vec<f64>> {
    match provider.get(propname) {
        Some(values) => Ok(values),
        None => {
            debug!("Property '{propname}' missing, regenerating from its model");
            provider.regenerate(propname)
        }
    }
}
