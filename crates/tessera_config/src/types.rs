//! Configuration types deserialized from `tessera.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tessera_common::{ChipCoord, Location, ResourceCost};

/// The top-level configuration parsed from `tessera.toml`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TesseraConfig {
    /// Target machine description.
    #[serde(default)]
    pub machine: MachineConfig,
    /// Algorithm selection and per-unit overrides for the mapping stages.
    #[serde(default)]
    pub mapping: MappingConfig,
    /// Routing key space settings.
    #[serde(default)]
    pub keys: KeyConfig,
    /// Tag pool bounds.
    #[serde(default)]
    pub tags: TagConfig,
    /// Report and instrumentation switches.
    #[serde(default)]
    pub reports: ReportConfig,
    /// Load/run behaviour of the orchestrator.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// The mesh of chips the application is mapped onto.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Chips along the x axis.
    #[serde(default = "default_dimension")]
    pub width: u32,
    /// Chips along the y axis.
    #[serde(default = "default_dimension")]
    pub height: u32,
    /// Run against the in-memory board instead of real hardware.
    #[serde(default = "default_true")]
    pub virtual_board: bool,
    /// Whether edge links wrap around to form a torus.
    #[serde(default)]
    pub wrap_around: bool,
    /// Cores on every chip, including the monitor core 0.
    #[serde(default = "default_cores_per_chip")]
    pub cores_per_chip: u32,
    /// CPU cycles available to one core per time step.
    #[serde(default = "default_cpu_cycles")]
    pub cpu_cycles_per_core: u64,
    /// Bytes of local memory on one core.
    #[serde(default = "default_local_memory")]
    pub local_memory_per_core: u64,
    /// Bytes of memory shared by all cores of one chip.
    #[serde(default = "default_shared_memory")]
    pub shared_memory_per_chip: u64,
    /// Multicast entries each router can hold.
    #[serde(default = "default_table_capacity")]
    pub router_table_capacity: usize,
    /// Length of one simulation time step in microseconds.
    #[serde(default = "default_time_step_us")]
    pub time_step_us: u64,
    /// Application id used when loading, running and stopping.
    #[serde(default = "default_app_id")]
    pub app_id: u32,
    /// Chips known to be broken, written `"x,y"`.
    #[serde(default)]
    pub down_chips: Vec<ChipCoord>,
    /// Cores known to be broken, written `"x,y,core"`.
    #[serde(default)]
    pub down_cores: Vec<Location>,
}

fn default_dimension() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_cores_per_chip() -> u32 {
    18
}

fn default_cpu_cycles() -> u64 {
    200_000
}

fn default_local_memory() -> u64 {
    65_536
}

fn default_shared_memory() -> u64 {
    123_731_968
}

fn default_table_capacity() -> usize {
    1024
}

fn default_time_step_us() -> u64 {
    1000
}

fn default_app_id() -> u32 {
    30
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            width: default_dimension(),
            height: default_dimension(),
            virtual_board: true,
            wrap_around: false,
            cores_per_chip: default_cores_per_chip(),
            cpu_cycles_per_core: default_cpu_cycles(),
            local_memory_per_core: default_local_memory(),
            shared_memory_per_chip: default_shared_memory(),
            router_table_capacity: default_table_capacity(),
            time_step_us: default_time_step_us(),
            app_id: default_app_id(),
            down_chips: Vec::new(),
            down_cores: Vec::new(),
        }
    }
}

impl MachineConfig {
    /// Returns the per-core budget; the shared component is the whole chip pool.
    pub fn core_budget(&self) -> ResourceCost {
        ResourceCost::new(
            self.cpu_cycles_per_core,
            self.local_memory_per_core,
            self.shared_memory_per_chip,
        )
    }
}

/// The partitioning algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionerKind {
    /// Largest fitting slice size found by binary search over the cost function.
    #[default]
    MonotoneSearch,
}

/// The placement algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacerKind {
    /// Prefer chips already holding connected slices, then scan linearly.
    #[default]
    Locality,
    /// Scan chips in coordinate order only.
    Linear,
}

/// The routing algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterKind {
    /// Shortest paths with every hop costing one.
    #[default]
    ShortestPath,
    /// Shortest paths weighted by inverse link speed.
    LinkSpeed,
}

/// The routing key allocation algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAllocatorKind {
    /// One key per partitioned connection from a flat counter.
    #[default]
    Sequential,
    /// A power-of-two key block per partitioned connection, one key per source atom.
    AtomBlock,
}

/// Mapping stage selection and overrides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Partitioner algorithm.
    #[serde(default)]
    pub partitioner: PartitionerKind,
    /// Placer algorithm.
    #[serde(default)]
    pub placer: PlacerKind,
    /// Router algorithm.
    #[serde(default)]
    pub router: RouterKind,
    /// Key allocator algorithm.
    #[serde(default)]
    pub key_allocator: KeyAllocatorKind,
    /// Whether to validate compiled routing tables after routing.
    #[serde(default)]
    pub validate_routes: bool,
    /// Atoms-per-core ceilings keyed by unit label.
    #[serde(default)]
    pub atoms_per_core: BTreeMap<String, u32>,
}

/// Routing key space settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Width of a routing key in bits (1..=32).
    #[serde(default = "default_width_bits")]
    pub width_bits: u8,
}

fn default_width_bits() -> u8 {
    32
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            width_bits: default_width_bits(),
        }
    }
}

impl KeyConfig {
    /// Number of distinct keys in the space.
    pub fn capacity(&self) -> u64 {
        1u64 << self.width_bits
    }
}

/// Tag pool bounds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagConfig {
    /// First tag handed out by the notification pool.
    #[serde(default)]
    pub notification_min: u32,
    /// First tag handed out by the reverse pool.
    #[serde(default)]
    pub reverse_min: u32,
    /// Largest tag value either pool may hand out.
    #[serde(default = "default_max_tag")]
    pub max_tag: u32,
}

fn default_max_tag() -> u32 {
    7
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            notification_min: 0,
            reverse_min: 0,
            max_tag: default_max_tag(),
        }
    }
}

/// Report and instrumentation switches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report stage notes such as split units and pruned connections.
    #[serde(default)]
    pub enabled: bool,
    /// Record wall time per stage.
    #[serde(default)]
    pub timings: bool,
    /// Retrieve provenance after a run.
    #[serde(default)]
    pub provenance: bool,
}

/// Load and run behaviour.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Generate data and load it after mapping.
    #[serde(default = "default_true")]
    pub load: bool,
    /// Start execution after loading.
    #[serde(default = "default_true")]
    pub run: bool,
    /// Size of the data generation worker pool.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    4
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            load: true,
            run: true,
            workers: default_workers(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    #[test]
    fn selector_variants() {
        let toml = r#"
[mapping]
placer = "linear"
router = "link_speed"
key_allocator = "atom_block"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.mapping.partitioner, PartitionerKind::MonotoneSearch);
        assert_eq!(config.mapping.placer, PlacerKind::Linear);
        assert_eq!(config.mapping.router, RouterKind::LinkSpeed);
        assert_eq!(config.mapping.key_allocator, KeyAllocatorKind::AtomBlock);
    }

    #[test]
    fn unknown_selector_rejected() {
        let toml = r#"
[mapping]
placer = "annealing"
"#;
        assert!(load_config_from_str(toml).is_err());
    }

    #[test]
    fn key_capacity() {
        assert_eq!(KeyConfig { width_bits: 4 }.capacity(), 16);
        assert_eq!(KeyConfig::default().capacity(), 1u64 << 32);
    }

    #[test]
    fn core_budget_from_machine() {
        let m = MachineConfig::default();
        let b = m.core_budget();
        assert_eq!(b.cpu_cycles, 200_000);
        assert_eq!(b.local_memory, 65_536);
        assert_eq!(b.shared_memory, 123_731_968);
    }
}
