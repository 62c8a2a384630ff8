//! Population abstraction
//!
//! The engine never owns neuron state. It reads spikes from and writes
//! linked variables into anything implementing [`Population`], so the
//! connectivity store composes with external neuron models. [`NeuronGroup`]
//! is the vec-backed implementation used in tests and small simulations.

use std::collections::HashMap;

use crate::error::{CoreError, Result};

/// A group of neurons the engine can attach to.
///
/// Implementations expose their size, named state variables as dense
/// per-neuron arrays, and the set of neurons that fired during the current
/// step.
pub trait Population {
    /// Number of neurons in the group
    fn size(&self) -> usize;

    /// Read access to a named per-neuron variable, if it exists
    fn variable(&self, name: &str) -> Option<&[f32]>;

    /// Write access to a named per-neuron variable, if it exists
    fn variable_mut(&mut self, name: &str) -> Option<&mut [f32]>;

    /// Names of the variables this group exposes
    fn variable_names(&self) -> Vec<String>;

    /// Indices of neurons that fired this step
    fn fired(&self) -> &[u32];
}

/// Vec-backed population with named state variables and an explicit
/// fired-set, suitable for driving the engine directly
#[derive(Debug, Clone)]
pub struct NeuronGroup {
    size: usize,
    variables: Vec<(String, Vec<f32>)>,
    fired: Vec<u32>,
}

impl NeuronGroup {
    /// Create a group of `size` neurons with no variables
    pub fn new(size: usize) -> Self {
        Self {
            size,
            variables: Vec::new(),
            fired: Vec::new(),
        }
    }

    /// Add a named variable, every neuron starting at `default`
    pub fn with_variable(mut self, name: impl Into<String>, default: f32) -> Self {
        self.variables.push((name.into(), vec![default; self.size]));
        self
    }

    /// Mark a set of neurons as having fired this step
    pub fn set_fired(&mut self, indices: &[u32]) -> Result<()> {
        for &idx in indices {
            if idx as usize >= self.size {
                return Err(CoreError::index_out_of_range(idx, self.size));
            }
        }
        self.fired.clear();
        self.fired.extend_from_slice(indices);
        Ok(())
    }

    /// Clear the fired-set
    pub fn clear_fired(&mut self) {
        self.fired.clear();
    }

    /// Snapshot of all variables as name -> values
    pub fn snapshot(&self) -> HashMap<String, Vec<f32>> {
        self.variables
            .iter()
            .map(|(name, values)| (name.clone(), values.clone()))
            .collect()
    }
}

impl Population for NeuronGroup {
    fn size(&self) -> usize {
        self.size
    }

    fn variable(&self, name: &str) -> Option<&[f32]> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    fn variable_mut(&mut self, name: &str) -> Option<&mut [f32]> {
        self.variables
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_mut_slice())
    }

    fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|(n, _)| n.clone()).collect()
    }

    fn fired(&self) -> &[u32] {
        &self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_variables() {
        let mut group = NeuronGroup::new(4).with_variable("v", -70.0);
        assert_eq!(group.size(), 4);
        assert_eq!(group.variable("v").unwrap(), &[-70.0; 4]);
        assert!(group.variable("missing").is_none());

        group.variable_mut("v").unwrap()[2] = -50.0;
        assert_eq!(group.variable("v").unwrap()[2], -50.0);
    }

    #[test]
    fn test_fired_set() {
        let mut group = NeuronGroup::new(3);
        group.set_fired(&[0, 2]).unwrap();
        assert_eq!(group.fired(), &[0, 2]);
        group.clear_fired();
        assert!(group.fired().is_empty());
    }

    #[test]
    fn test_fired_bounds_checked() {
        let mut group = NeuronGroup::new(3);
        let result = group.set_fired(&[3]);
        assert!(matches!(
            result,
            Err(CoreError::IndexOutOfRange { index: 3, bound: 3 })
        ));
        // rejected batch leaves the fired-set untouched
        assert!(group.fired().is_empty());
    }
}
