//! The unit-model seam: resource costs, state serialization and binaries.
//!
//! The mapping pipeline never interprets what a unit computes. It asks the
//! unit's [`UnitModel`] how much a slice of a given size costs, for the bytes
//! describing a slice's initial state, and for the name of the executable
//! image that runs it.

use crate::atoms::AtomRange;
use crate::error::GraphError;
use std::collections::BTreeMap;
use std::fmt;
use tessera_common::ResourceCost;

/// Behaviour of a unit as seen by the mapper.
///
/// `resource_cost` must be non-decreasing in `n_atoms`; the partitioner
/// relies on this to binary-search the slice size.
pub trait UnitModel: fmt::Debug + Send + Sync {
    /// Cost of running `n_atoms` atoms on one core.
    fn resource_cost(&self, n_atoms: u32) -> ResourceCost;

    /// Initial state for the atoms in `atoms`, in the model's own layout.
    fn serialize_state(&self, atoms: AtomRange) -> Result<Vec<u8>, GraphError>;

    /// Name of the executable image that runs this model.
    fn executable_image(&self) -> &str;
}

/// A fixed cost plus a per-atom cost.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinearModel {
    image: String,
    fixed: ResourceCost,
    per_atom: ResourceCost,
    state_bytes_per_atom: u32,
}

impl LinearModel {
    /// Creates a model costing `fixed + n * per_atom`.
    pub fn new(image: impl Into<String>, fixed: ResourceCost, per_atom: ResourceCost) -> Self {
        Self {
            image: image.into(),
            fixed,
            per_atom,
            state_bytes_per_atom: 4,
        }
    }

    /// Sets the bytes of state written per atom (at least 4).
    pub fn with_state_bytes(mut self, bytes: u32) -> Self {
        self.state_bytes_per_atom = bytes.max(4);
        self
    }
}

impl UnitModel for LinearModel {
    fn resource_cost(&self, n_atoms: u32) -> ResourceCost {
        self.fixed + self.per_atom.scaled(u64::from(n_atoms))
    }

    /// Each atom contributes its little-endian index, zero padded.
    fn serialize_state(&self, atoms: AtomRange) -> Result<Vec<u8>, GraphError> {
        let stride = self.state_bytes_per_atom as usize;
        let mut out = Vec::with_capacity(atoms.len() as usize * stride);
        for atom in atoms.iter() {
            out.extend_from_slice(&atom.to_le_bytes());
            out.resize(out.len() + stride - 4, 0);
        }
        Ok(out)
    }

    fn executable_image(&self) -> &str {
        &self.image
    }
}

/// One named part of a [`ComposedModel`] (e.g. the membrane, synapse, or
/// threshold part of a neuron).
pub trait ModelComponent: fmt::Debug + Send + Sync {
    /// Name used in error messages.
    fn name(&self) -> &str;

    /// Cost of this component for `n_atoms` atoms.
    fn resource_cost(&self, n_atoms: u32) -> ResourceCost;

    /// Names of the parameters this component owns.
    fn parameter_names(&self) -> Vec<String>;

    /// Current value of an owned parameter.
    fn parameter(&self, name: &str) -> Option<f64>;

    /// Updates an owned parameter. Returns `false` if the name is not owned.
    fn set_parameter(&mut self, name: &str, value: f64) -> bool;

    /// Appends this component's state for `atoms` to `out`.
    fn write_state(&self, atoms: AtomRange, out: &mut Vec<u8>);
}

/// A component holding named `f64` parameters shared by every atom.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterBlock {
    name: String,
    fixed: ResourceCost,
    per_atom: ResourceCost,
    params: BTreeMap<String, f64>,
}

impl ParameterBlock {
    /// Creates an empty block with the given costs.
    pub fn new(name: impl Into<String>, fixed: ResourceCost, per_atom: ResourceCost) -> Self {
        Self {
            name: name.into(),
            fixed,
            per_atom,
            params: BTreeMap::new(),
        }
    }

    /// Adds a parameter with its initial value.
    pub fn with_parameter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.insert(name.into(), value);
        self
    }
}

impl ModelComponent for ParameterBlock {
    fn name(&self) -> &str {
        &self.name
    }

    fn resource_cost(&self, n_atoms: u32) -> ResourceCost {
        self.fixed + self.per_atom.scaled(u64::from(n_atoms))
    }

    fn parameter_names(&self) -> Vec<String> {
        self.params.keys().cloned().collect()
    }

    fn parameter(&self, name: &str) -> Option<f64> {
        self.params.get(name).copied()
    }

    fn set_parameter(&mut self, name: &str, value: f64) -> bool {
        match self.params.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    // Per atom, every parameter in name order as little-endian f64.
    fn write_state(&self, atoms: AtomRange, out: &mut Vec<u8>) {
        for _ in atoms.iter() {
            for value in self.params.values() {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
    }
}

/// A unit model assembled from independent components.
///
/// Costs are the sum of the components' costs and state is their
/// concatenation in component order. Every parameter name maps to exactly
/// one owning component; the index is built once in [`ComposedModel::new`].
#[derive(Debug)]
pub struct ComposedModel {
    name: String,
    image: String,
    components: Vec<Box<dyn ModelComponent>>,
    owners: BTreeMap<String, usize>,
}

impl ComposedModel {
    /// Assembles a model, rejecting parameter names declared twice.
    pub fn new(
        name: impl Into<String>,
        image: impl Into<String>,
        components: Vec<Box<dyn ModelComponent>>,
    ) -> Result<Self, GraphError> {
        let name = name.into();
        if components.is_empty() {
            return Err(GraphError::EmptyModel(name));
        }
        let mut owners: BTreeMap<String, usize> = BTreeMap::new();
        for (index, component) in components.iter().enumerate() {
            for param in component.parameter_names() {
                if let Some(&first) = owners.get(&param) {
                    return Err(GraphError::DuplicateParameter {
                        name: param,
                        first: components[first].name().to_string(),
                        second: component.name().to_string(),
                    });
                }
                owners.insert(param, index);
            }
        }
        Ok(Self {
            name,
            image: image.into(),
            components,
            owners,
        })
    }

    /// The model's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn owner_index(&self, param: &str) -> Result<usize, GraphError> {
        self.owners
            .get(param)
            .copied()
            .ok_or_else(|| GraphError::UnknownParameter(param.to_string()))
    }

    /// Name of the component owning `param`.
    pub fn owner(&self, param: &str) -> Result<&str, GraphError> {
        Ok(self.components[self.owner_index(param)?].name())
    }

    /// Reads a parameter.
    pub fn parameter(&self, param: &str) -> Result<f64, GraphError> {
        let index = self.owner_index(param)?;
        self.components[index]
            .parameter(param)
            .ok_or_else(|| GraphError::UnknownParameter(param.to_string()))
    }

    /// Writes a parameter.
    pub fn set_parameter(&mut self, param: &str, value: f64) -> Result<(), GraphError> {
        let index = self.owner_index(param)?;
        if self.components[index].set_parameter(param, value) {
            Ok(())
        } else {
            Err(GraphError::UnknownParameter(param.to_string()))
        }
    }
}

impl UnitModel for ComposedModel {
    fn resource_cost(&self, n_atoms: u32) -> ResourceCost {
        self.components
            .iter()
            .map(|c| c.resource_cost(n_atoms))
            .sum()
    }

    fn serialize_state(&self, atoms: AtomRange) -> Result<Vec<u8>, GraphError> {
        let mut out = Vec::new();
        for component in &self.components {
            component.write_state(atoms, &mut out);
        }
        Ok(out)
    }

    fn executable_image(&self) -> &str {
        &self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neuron() -> ComposedModel {
        let membrane = ParameterBlock::new(
            "membrane",
            ResourceCost::new(100, 64, 0),
            ResourceCost::new(10, 16, 0),
        )
        .with_parameter("tau_m", 20.0)
        .with_parameter("v_rest", -65.0);
        let synapse = ParameterBlock::new(
            "synapse",
            ResourceCost::new(50, 0, 1024),
            ResourceCost::new(5, 8, 0),
        )
        .with_parameter("tau_syn_e", 5.0);
        ComposedModel::new(
            "lif",
            "lif_neuron.aplx",
            vec![Box::new(membrane), Box::new(synapse)],
        )
        .unwrap()
    }

    #[test]
    fn linear_cost() {
        let m = LinearModel::new("img", ResourceCost::new(1, 2, 3), ResourceCost::new(10, 10, 0));
        assert_eq!(m.resource_cost(0), ResourceCost::new(1, 2, 3));
        assert_eq!(m.resource_cost(5), ResourceCost::new(51, 52, 3));
        assert_eq!(m.executable_image(), "img");
    }

    #[test]
    fn linear_state_layout() {
        let m = LinearModel::new("img", ResourceCost::ZERO, ResourceCost::ZERO).with_state_bytes(8);
        let state = m.serialize_state(AtomRange::new(3, 5)).unwrap();
        assert_eq!(state, vec![3, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn composed_cost_sums_components() {
        let m = neuron();
        assert_eq!(m.resource_cost(10), ResourceCost::new(300, 304, 1024));
    }

    #[test]
    fn parameters_resolve_to_owner() {
        let mut m = neuron();
        assert_eq!(m.owner("tau_syn_e").unwrap(), "synapse");
        assert_eq!(m.parameter("v_rest").unwrap(), -65.0);
        m.set_parameter("tau_m", 10.0).unwrap();
        assert_eq!(m.parameter("tau_m").unwrap(), 10.0);
    }

    #[test]
    fn unknown_parameter_is_checked() {
        let mut m = neuron();
        assert_eq!(
            m.parameter("i_offset"),
            Err(GraphError::UnknownParameter("i_offset".into()))
        );
        assert!(m.set_parameter("i_offset", 1.0).is_err());
    }

    #[test]
    fn duplicate_parameter_rejected_at_assembly() {
        let a = ParameterBlock::new("a", ResourceCost::ZERO, ResourceCost::ZERO)
            .with_parameter("tau", 1.0);
        let b = ParameterBlock::new("b", ResourceCost::ZERO, ResourceCost::ZERO)
            .with_parameter("tau", 2.0);
        let err = ComposedModel::new("m", "img", vec![Box::new(a), Box::new(b)]).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateParameter { ref first, .. } if first == "a"));
    }

    #[test]
    fn empty_model_rejected() {
        assert_eq!(
            ComposedModel::new("m", "img", Vec::new()).unwrap_err(),
            GraphError::EmptyModel("m".into())
        );
    }

    #[test]
    fn composed_state_concatenates() {
        let m = neuron();
        let state = m.serialize_state(AtomRange::new(0, 2)).unwrap();
        // two atoms: 2 membrane params then 1 synapse param, 8 bytes each
        assert_eq!(state.len(), 2 * 2 * 8 + 2 * 8);
        assert_eq!(&state[0..8], &20.0f64.to_le_bytes());
    }
}
