//! The mapping pipeline: partition, filter, place, key, route, tag.

use crate::edge_filter::filter_edges;
use crate::keys::{allocator_for, KeyAllocator, KeyAssignments};
use crate::partition::partition;
use crate::placement::{place, Placements};
use crate::routing::{route, validate_routes, RoutingTables};
use crate::tags::{allocate_tags, TagAllocations};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tessera_common::{ContentHash, MapError, MapResult};
use tessera_config::TesseraConfig;
use tessera_diagnostics::DiagnosticSink;
use tessera_fabric::Fabric;
use tessera_graph::{ApplicationGraph, PartitionedGraph};

/// Wall time spent in each pipeline stage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageTimings {
    /// `(stage name, elapsed)` in execution order.
    pub stages: Vec<(&'static str, Duration)>,
}

impl StageTimings {
    /// Sum of every stage.
    pub fn total(&self) -> Duration {
        self.stages.iter().map(|(_, d)| *d).sum()
    }

    /// Elapsed time of the named stage.
    pub fn get(&self, stage: &str) -> Option<Duration> {
        self.stages
            .iter()
            .find(|(name, _)| *name == stage)
            .map(|(_, d)| *d)
    }
}

/// The compiled artifacts of one mapping run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    /// Slices and pruned partitioned connections.
    pub partitioned: PartitionedGraph,
    /// Location of every slice.
    pub placements: Placements,
    /// Key of every partitioned connection.
    pub keys: KeyAssignments,
    /// Per-chip multicast tables.
    pub routing_tables: RoutingTables,
    /// Allocated I/O tags.
    pub tags: TagAllocations,
    /// Stage timings, when requested.
    #[serde(skip)]
    pub timings: Option<StageTimings>,
}

impl Mapping {
    /// Hashes placements, keys, routing tables, and tags.
    ///
    /// Mapping the same graph onto the same fabric with the same
    /// configuration always yields the same fingerprint.
    pub fn fingerprint(&self) -> ContentHash {
        let mut bytes = Vec::new();
        for (slice, location) in self.placements.iter() {
            push_u32(&mut bytes, slice.as_raw());
            push_u32(&mut bytes, location.chip.x);
            push_u32(&mut bytes, location.chip.y);
            push_u32(&mut bytes, location.core);
        }
        bytes.push(0xfe);
        for (pc, key) in self.keys.iter() {
            push_u32(&mut bytes, pc.as_raw());
            push_u32(&mut bytes, key.key);
            push_u32(&mut bytes, key.mask);
        }
        bytes.push(0xfe);
        for (chip, table) in self.routing_tables.iter() {
            push_u32(&mut bytes, chip.x);
            push_u32(&mut bytes, chip.y);
            push_u32(&mut bytes, table.len() as u32);
            for entry in &table.entries {
                push_u32(&mut bytes, entry.key);
                push_u32(&mut bytes, entry.mask);
                let links = entry.links.iter().fold(0u8, |acc, d| acc | 1 << d.index());
                bytes.push(links);
                push_u32(&mut bytes, entry.cores.len() as u32);
                for &core in &entry.cores {
                    push_u32(&mut bytes, core);
                }
            }
        }
        bytes.push(0xfe);
        for tag in &self.tags.notification {
            push_u32(&mut bytes, tag.unit.as_raw());
            push_u32(&mut bytes, tag.tag);
            bytes.extend_from_slice(tag.host.as_bytes());
            bytes.push(0);
            bytes.extend_from_slice(&tag.port.to_le_bytes());
        }
        for tag in &self.tags.reverse {
            push_u32(&mut bytes, tag.unit.as_raw());
            push_u32(&mut bytes, tag.tag);
            bytes.extend_from_slice(&tag.port.to_le_bytes());
            push_u32(&mut bytes, tag.destination.chip.x);
            push_u32(&mut bytes, tag.destination.chip.y);
            push_u32(&mut bytes, tag.destination.core);
        }
        ContentHash::from_bytes(&bytes)
    }
}

fn push_u32(bytes: &mut Vec<u8>, value: u32) {
    bytes.extend_from_slice(&value.to_le_bytes());
}

/// Runs the mapping stages in order against one configuration.
///
/// A mapper is scoped to a single run: the key allocator it owns is
/// consumed by [`Mapper::map`].
pub struct Mapper<'a> {
    config: &'a TesseraConfig,
    key_allocator: Box<dyn KeyAllocator>,
}

impl<'a> Mapper<'a> {
    /// Creates a mapper using the allocator selected in `config`.
    pub fn new(config: &'a TesseraConfig) -> Self {
        Self {
            config,
            key_allocator: allocator_for(config.mapping.key_allocator, config.keys.width_bits),
        }
    }

    /// Replaces the configured key allocator.
    pub fn with_key_allocator(mut self, allocator: Box<dyn KeyAllocator>) -> Self {
        self.key_allocator = allocator;
        self
    }

    /// Maps `graph` onto `fabric`.
    ///
    /// `fabric` gains any virtual chips the graph requests. The first fatal
    /// error aborts the run; nothing partial is returned.
    pub fn map(
        mut self,
        graph: &ApplicationGraph,
        fabric: &mut Fabric,
        sink: &DiagnosticSink,
    ) -> MapResult<Mapping> {
        let config = self.config;
        let mapping = &config.mapping;
        let mut timings = StageTimings::default();
        let record = config.reports.timings;

        let budget = fabric
            .partition_budget()
            .ok_or_else(|| MapError::InvalidConstraint {
                subject: "fabric".into(),
                reason: "no application cores are available".into(),
            })?;

        let mut partitioned = timed(&mut timings, "partition", || {
            partition(graph, &budget, &mapping.atoms_per_core, sink)
        })?;
        tracing::info!(slices = partitioned.slices().len(), "partitioned");

        let pruned = timed(&mut timings, "edge_filter", || {
            Ok(filter_edges(graph, &mut partitioned, sink))
        })?;
        tracing::info!(pruned, remaining = partitioned.connections().len(), "filtered edges");

        let placements = timed(&mut timings, "place", || {
            place(graph, &partitioned, fabric, mapping.placer, sink)
        })?;
        tracing::info!(placed = placements.len(), chips = placements.chips().len(), "placed");

        let keys = timed(&mut timings, "keys", || {
            self.key_allocator.allocate(&partitioned, &placements)
        })?;
        tracing::info!(allocator = self.key_allocator.name(), keys = keys.len(), "allocated keys");

        let fabric_ref: &Fabric = fabric;
        let routing_tables = timed(&mut timings, "route", || {
            route(&partitioned, &placements, &keys, fabric_ref, mapping.router, sink)
        })?;

        if mapping.validate_routes {
            timed(&mut timings, "validate", || {
                validate_routes(&partitioned, &placements, &keys, &routing_tables, fabric_ref)
            })?;
        }

        let tags = timed(&mut timings, "tags", || {
            allocate_tags(graph, &partitioned, &placements, &config.tags)
        })?;

        if record {
            for (stage, elapsed) in &timings.stages {
                tracing::info!(stage = *stage, elapsed_us = elapsed.as_micros() as u64, "stage timing");
            }
        }

        Ok(Mapping {
            partitioned,
            placements,
            keys,
            routing_tables,
            tags,
            timings: record.then_some(timings),
        })
    }
}

fn timed<T>(
    timings: &mut StageTimings,
    stage: &'static str,
    run: impl FnOnce() -> MapResult<T>,
) -> MapResult<T> {
    let start = Instant::now();
    let result = run();
    timings.stages.push((stage, start.elapsed()));
    result
}

/// Maps `graph` onto `fabric` with the stages selected in `config`.
pub fn map_graph(
    graph: &ApplicationGraph,
    fabric: &mut Fabric,
    config: &TesseraConfig,
    sink: &DiagnosticSink,
) -> MapResult<Mapping> {
    Mapper::new(config).map(graph, fabric, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SequentialKeys;
    use std::sync::Arc;
    use tessera_common::ResourceCost;
    use tessera_graph::{AllToAll, LinearModel, Unit};

    fn config() -> TesseraConfig {
        let mut config = TesseraConfig::default();
        config.machine.width = 2;
        config.machine.height = 2;
        config.machine.cores_per_chip = 4;
        config.machine.cpu_cycles_per_core = 1_000;
        config.machine.local_memory_per_core = 1_000;
        config.machine.shared_memory_per_chip = 1_000_000;
        config
    }

    fn graph() -> ApplicationGraph {
        let model = Arc::new(LinearModel::new(
            "unit.aplx",
            ResourceCost::new(100, 100, 0),
            ResourceCost::new(10, 10, 0),
        ));
        let mut g = ApplicationGraph::new();
        let a = g.add_unit(Unit::new("a", 200, model.clone())).unwrap();
        let b = g.add_unit(Unit::new("b", 50, model)).unwrap();
        g.add_connection("a-b", a, b, Arc::new(AllToAll)).unwrap();
        g
    }

    #[test]
    fn maps_small_graph() {
        let config = config();
        let mut fabric = Fabric::from_config(&config.machine).unwrap();
        let sink = DiagnosticSink::new();
        let mapping = map_graph(&graph(), &mut fabric, &config, &sink).unwrap();
        // (1000 - 100) / 10 = 90 atoms per core: a -> 3 slices, b -> 1
        assert_eq!(mapping.partitioned.slices().len(), 4);
        assert_eq!(mapping.placements.len(), 4);
        assert_eq!(mapping.keys.len(), 3);
        assert!(mapping.routing_tables.total_entries() >= 3);
        assert!(mapping.tags.is_empty());
        assert!(mapping.timings.is_none());
    }

    #[test]
    fn timings_recorded_on_request() {
        let mut config = config();
        config.reports.timings = true;
        config.mapping.validate_routes = true;
        let mut fabric = Fabric::from_config(&config.machine).unwrap();
        let mapping = map_graph(&graph(), &mut fabric, &config, &DiagnosticSink::new()).unwrap();
        let timings = mapping.timings.unwrap();
        let names: Vec<_> = timings.stages.iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            ["partition", "edge_filter", "place", "keys", "route", "validate", "tags"]
        );
        assert!(timings.get("route").is_some());
        assert!(timings.total() >= timings.get("place").unwrap());
    }

    #[test]
    fn custom_allocator_and_stable_fingerprint() {
        let config = config();
        let run = || {
            let mut fabric = Fabric::from_config(&config.machine).unwrap();
            Mapper::new(&config)
                .with_key_allocator(Box::new(SequentialKeys::new(8)))
                .map(&graph(), &mut fabric, &DiagnosticSink::new())
                .unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_eq!(first, second);
    }
}
