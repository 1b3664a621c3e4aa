//! Multicast routing: per-connection trees compiled into per-chip tables.
//!
//! # Algorithm
//!
//! For each partitioned connection, a shortest-path tree is grown from the
//! source slice's chip (Dijkstra, cached per source chip). The paths to every
//! destination chip are merged into one [`MulticastTree`], so shared prefixes
//! cost one entry per chip. Each chip of the tree then receives one
//! [`MulticastEntry`] naming its outgoing links and local destination cores.
//! Finally every table is checked against its router's capacity.

pub mod shortest_path;
pub mod table;
pub mod tree;
pub mod validate;

pub use shortest_path::ShortestPathTree;
pub use table::{MulticastEntry, RoutingTable, RoutingTables};
pub use tree::MulticastTree;
pub use validate::validate_routes;

use crate::keys::KeyAssignments;
use crate::placement::Placements;
use std::collections::BTreeMap;
use tessera_common::{ChipCoord, MapError, MapResult};
use tessera_config::RouterKind;
use tessera_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use tessera_fabric::Fabric;
use tessera_graph::PartitionedGraph;

/// Routes every partitioned connection and compiles the routing tables.
pub fn route(
    partitioned: &PartitionedGraph,
    placements: &Placements,
    keys: &KeyAssignments,
    fabric: &Fabric,
    kind: RouterKind,
    sink: &DiagnosticSink,
) -> MapResult<RoutingTables> {
    let mut trees: BTreeMap<ChipCoord, ShortestPathTree> = BTreeMap::new();
    let mut tables = RoutingTables::default();

    for pc in partitioned.connections() {
        let source = placements
            .get(pc.source)
            .ok_or_else(|| MapError::InvalidGraph {
                reason: format!("source slice {} of connection {} is unplaced", pc.source, pc.id),
            })?;
        let key = keys.get(pc.id).ok_or_else(|| MapError::InvalidGraph {
            reason: format!("partitioned connection {} has no routing key", pc.id),
        })?;
        let paths = trees
            .entry(source.chip)
            .or_insert_with(|| ShortestPathTree::compute(fabric, source.chip, kind));

        let mut tree = MulticastTree::new();
        for &target in &pc.targets {
            let destination = placements.get(target).ok_or_else(|| MapError::InvalidGraph {
                reason: format!("target slice {target} of connection {} is unplaced", pc.id),
            })?;
            let hops = paths
                .path_to(destination.chip)
                .ok_or(MapError::RouteUnreachable {
                    key: key.key,
                    from: source.chip,
                    to: destination.chip,
                })?;
            for (chip, direction) in hops {
                tree.add_hop(chip, direction);
            }
            tree.deliver(destination.chip, destination.core);
        }

        tracing::debug!(connection = %pc.id, key = %key, chips = tree.chip_count(), "routed connection");
        for (chip, links, cores) in tree.entries() {
            tables.push(
                chip,
                MulticastEntry {
                    key: key.key,
                    mask: key.mask,
                    links,
                    cores,
                },
            );
        }
    }

    check_capacity(&tables, fabric, sink)?;
    tracing::info!(
        chips = tables.chips_with_entries().count(),
        entries = tables.total_entries(),
        "routing complete"
    );
    Ok(tables)
}

/// Fails on the first chip whose table overflows its router, in coordinate
/// order, and warns about tables at 90% or more of capacity.
fn check_capacity(tables: &RoutingTables, fabric: &Fabric, sink: &DiagnosticSink) -> MapResult<()> {
    for (chip, table) in tables.iter() {
        let capacity = fabric
            .chip(chip)
            .map_or(0, |c| c.router.table_capacity);
        let entries = table.len();
        if entries > capacity {
            return Err(MapError::TableCapacityExceeded {
                chip,
                entries,
                capacity,
                overflow: entries - capacity,
            });
        }
        if entries > 0 && entries >= capacity - capacity / 10 {
            sink.emit(
                Diagnostic::warning(
                    DiagnosticCode::TABLE_NEAR_CAPACITY,
                    format!("routing table {}% full", entries * 100 / capacity),
                )
                .with_subject(format!("chip {chip}"))
                .with_note(format!("{entries} of {capacity} entries used")),
            );
        }
    }
    Ok(())
}
