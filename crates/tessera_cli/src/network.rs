//! TOML network descriptions.
//!
//! A network file lists units and the connections between them:
//!
//! ```toml
//! [[unit]]
//! label = "stimulus"
//! atoms = 100
//! image = "spike_source.aplx"
//! per_atom = { cpu_cycles = 10, local_memory = 64 }
//! reverse_tag = { port = 12345 }
//!
//! [[unit]]
//! label = "excitatory"
//! atoms = 400
//! image = "neuron.aplx"
//! fixed = { cpu_cycles = 2000, local_memory = 1024 }
//! per_atom = { cpu_cycles = 150, local_memory = 128 }
//! record = true
//!
//! [[connection]]
//! label = "drive"
//! from = "stimulus"
//! to = "excitatory"
//! rule = { kind = "fixed_probability", probability = 0.1, seed = 42 }
//! ```
//!
//! Every unit uses a [`LinearModel`].

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tessera_common::{Location, ResourceCost};
use tessera_fabric::VirtualChipSpec;
use tessera_graph::{
    AllToAll, ApplicationGraph, ConnectivityRule, FixedProbability, FromList, LinearModel,
    OneToOne, Unit,
};

/// A parsed network file.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkFile {
    /// Units in declaration order.
    #[serde(default, rename = "unit")]
    pub units: Vec<UnitSpec>,
    /// Connections in declaration order.
    #[serde(default, rename = "connection")]
    pub connections: Vec<ConnectionSpec>,
}

/// One `[[unit]]` table.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitSpec {
    /// Unique label.
    pub label: String,
    /// Number of atoms.
    pub atoms: u32,
    /// Executable image name.
    pub image: String,
    /// Cost paid once per core.
    #[serde(default)]
    pub fixed: CostSpec,
    /// Cost paid per atom.
    #[serde(default)]
    pub per_atom: CostSpec,
    /// Bytes of initial state per atom.
    pub state_bytes: Option<u32>,
    /// Ceiling on atoms per core.
    pub max_atoms_per_core: Option<u32>,
    /// Pins the first slice to `"x,y,core"`.
    pub location: Option<Location>,
    /// Confines the unit to a virtual chip.
    pub virtual_chip: Option<VirtualChipSpec>,
    /// Whether the unit records spikes.
    #[serde(default)]
    pub record: bool,
    /// Inbound tag request.
    pub notification_tag: Option<NotificationTagSpec>,
    /// Outbound tag request.
    pub reverse_tag: Option<ReverseTagSpec>,
}

/// A resource cost with every component optional.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CostSpec {
    /// CPU cycles per time step.
    pub cpu_cycles: u64,
    /// Core-local bytes.
    pub local_memory: u64,
    /// Chip-shared bytes.
    pub shared_memory: u64,
}

impl From<CostSpec> for ResourceCost {
    fn from(c: CostSpec) -> Self {
        ResourceCost::new(c.cpu_cycles, c.local_memory, c.shared_memory)
    }
}

/// `notification_tag = { host = "...", port = ..., tag = ... }`
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationTagSpec {
    /// Explicit tag, or absent for automatic.
    pub tag: Option<u32>,
    /// Receiving host.
    pub host: String,
    /// Receiving port.
    pub port: u16,
}

/// `reverse_tag = { port = ..., tag = ... }`
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReverseTagSpec {
    /// Explicit tag, or absent for automatic.
    pub tag: Option<u32>,
    /// Listening port.
    pub port: u16,
}

/// One `[[connection]]` table.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSpec {
    /// Label; defaults to `"<from>-><to>"`.
    pub label: Option<String>,
    /// Source unit label.
    pub from: String,
    /// Target unit label.
    pub to: String,
    /// Which atom pairs are connected.
    pub rule: RuleSpec,
}

/// Connectivity rule selector.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    /// Every source atom to every target atom.
    AllToAll,
    /// Atom `i` to atom `i`.
    OneToOne,
    /// An explicit list of `[source, target]` pairs.
    FromList {
        /// Atom pairs.
        pairs: Vec<(u32, u32)>,
    },
    /// Each pair independently with `probability`, seeded.
    FixedProbability {
        /// Connection probability in `[0, 1]`.
        probability: f64,
        /// Generator seed.
        #[serde(default)]
        seed: u64,
    },
}

impl RuleSpec {
    fn build(&self) -> Result<Arc<dyn ConnectivityRule>, Box<dyn std::error::Error>> {
        let rule: Arc<dyn ConnectivityRule> = match self {
            RuleSpec::AllToAll => Arc::new(AllToAll),
            RuleSpec::OneToOne => Arc::new(OneToOne),
            RuleSpec::FromList { pairs } => Arc::new(FromList::new(pairs.iter().copied())),
            RuleSpec::FixedProbability { probability, seed } => {
                Arc::new(FixedProbability::new(*probability, *seed)?)
            }
        };
        Ok(rule)
    }
}

/// Parses a network description from TOML text.
pub fn parse_network(content: &str) -> Result<NetworkFile, toml::de::Error> {
    toml::from_str(content)
}

/// Reads and parses a network file.
pub fn load_network(path: &Path) -> Result<NetworkFile, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    parse_network(&content).map_err(|e| format!("invalid network {}: {e}", path.display()).into())
}

impl NetworkFile {
    /// Builds the application graph.
    ///
    /// Connections may only name units declared in the same file.
    pub fn build_graph(&self) -> Result<ApplicationGraph, Box<dyn std::error::Error>> {
        let mut graph = ApplicationGraph::new();
        for spec in &self.units {
            graph.add_unit(spec.to_unit())?;
        }

        let mut labels = BTreeSet::new();
        for spec in &self.connections {
            let label = spec
                .label
                .clone()
                .unwrap_or_else(|| format!("{}->{}", spec.from, spec.to));
            if !labels.insert(label.clone()) {
                return Err(format!("duplicate connection label '{label}'").into());
            }
            let resolve = |name: &str| {
                graph
                    .unit_by_label(name)
                    .map(|u| u.id)
                    .ok_or_else(|| format!("connection '{label}' names unknown unit '{name}'"))
            };
            let source = resolve(&spec.from)?;
            let target = resolve(&spec.to)?;
            graph.add_connection(label.clone(), source, target, spec.rule.build()?)?;
        }
        Ok(graph)
    }
}

impl UnitSpec {
    fn to_unit(&self) -> Unit {
        let mut model = LinearModel::new(&self.image, self.fixed.into(), self.per_atom.into());
        if let Some(bytes) = self.state_bytes {
            model = model.with_state_bytes(bytes);
        }
        let mut unit = Unit::new(&self.label, self.atoms, Arc::new(model));
        if let Some(max) = self.max_atoms_per_core {
            unit = unit.with_max_atoms_per_core(max);
        }
        if let Some(location) = self.location {
            unit = unit.with_fixed_location(location);
        }
        if let Some(spec) = self.virtual_chip {
            unit = unit.with_virtual_chip(spec);
        }
        if self.record {
            unit = unit.with_spike_recording();
        }
        if let Some(ref req) = self.notification_tag {
            unit = unit.with_notification_tag(req.tag, &req.host, req.port);
        }
        if let Some(ref req) = self.reverse_tag {
            unit = unit.with_reverse_tag(req.tag, req.port);
        }
        unit
    }
}
