//! Post-compilation checks over the routing tables.
//!
//! Tables are checked structurally first (every link used exists, no two
//! entries on a chip overlap), then each partitioned connection is replayed
//! through the tables from its source chip. The chips a packet visits form a
//! directed graph; a strongly connected component of more than one chip, or
//! a chip forwarding to itself, is a routing cycle. Finally every target core
//! must have been delivered to.

use super::table::RoutingTables;
use crate::keys::KeyAssignments;
use crate::placement::Placements;
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tessera_common::{ChipCoord, Location, MapError, MapResult};
use tessera_fabric::Fabric;
use tessera_graph::PartitionedGraph;

/// Checks that the compiled tables deliver every connection exactly as
/// placed, without cycles, collisions, or dangling links.
pub fn validate_routes(
    partitioned: &PartitionedGraph,
    placements: &Placements,
    keys: &KeyAssignments,
    tables: &RoutingTables,
    fabric: &Fabric,
) -> MapResult<()> {
    check_links(tables, fabric)?;
    check_collisions(tables)?;

    for pc in partitioned.connections() {
        let (Some(source), Some(key)) = (placements.get(pc.source), keys.get(pc.id)) else {
            return Err(MapError::InvalidGraph {
                reason: format!("partitioned connection {} is unplaced or unkeyed", pc.id),
            });
        };
        let traversal = trace(tables, fabric, source.chip, key.key);
        if let Some(chips) = find_cycle(&traversal.hops) {
            return Err(MapError::RoutingCycleDetected { key: key.key, chips });
        }
        for &target in &pc.targets {
            let Some(destination) = placements.get(target) else {
                continue;
            };
            if !traversal.delivered.contains(&destination) {
                return Err(MapError::RouteUnreachable {
                    key: key.key,
                    from: source.chip,
                    to: destination.chip,
                });
            }
        }
    }
    tracing::debug!(connections = partitioned.connections().len(), "routes validated");
    Ok(())
}

fn check_links(tables: &RoutingTables, fabric: &Fabric) -> MapResult<()> {
    for (chip, table) in tables.iter() {
        for entry in &table.entries {
            for &direction in &entry.links {
                let usable = fabric
                    .link(chip, direction)
                    .is_some_and(|link| fabric.contains(link.destination));
                if !usable {
                    return Err(MapError::NonexistentLink {
                        chip,
                        direction,
                        key: entry.key,
                    });
                }
            }
        }
    }
    Ok(())
}

fn check_collisions(tables: &RoutingTables) -> MapResult<()> {
    for (chip, table) in tables.iter() {
        for (i, a) in table.entries.iter().enumerate() {
            if let Some(b) = table.entries[i + 1..]
                .iter()
                .find(|b| a.key_and_mask().overlaps(&b.key_and_mask()))
            {
                return Err(MapError::KeyCollision {
                    chip,
                    first: a.key,
                    second: b.key,
                });
            }
        }
    }
    Ok(())
}

/// Where one key's packets travel.
struct Traversal {
    hops: DiGraphMap<ChipCoord, ()>,
    delivered: BTreeSet<Location>,
}

fn trace(tables: &RoutingTables, fabric: &Fabric, source: ChipCoord, key: u32) -> Traversal {
    let mut hops = DiGraphMap::new();
    let mut delivered = BTreeSet::new();
    let mut seen = BTreeSet::from([source]);
    let mut queue = VecDeque::from([source]);
    hops.add_node(source);

    while let Some(chip) = queue.pop_front() {
        let Some(entry) = tables.table(chip).and_then(|t| t.lookup(key)) else {
            continue; // dropped
        };
        delivered.extend(entry.cores.iter().map(|&core| Location { chip, core }));
        for &direction in &entry.links {
            let Some(link) = fabric.link(chip, direction) else {
                continue;
            };
            hops.add_edge(chip, link.destination, ());
            if seen.insert(link.destination) {
                queue.push_back(link.destination);
            }
        }
    }
    Traversal { hops, delivered }
}

/// Returns the chips of one cycle in `hops`, starting and ending on its
/// lowest chip, if the graph has any.
fn find_cycle(hops: &DiGraphMap<ChipCoord, ()>) -> Option<Vec<ChipCoord>> {
    if let Some(chip) = hops.nodes().find(|&n| hops.contains_edge(n, n)) {
        return Some(vec![chip, chip]);
    }
    let component = tarjan_scc(hops)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .min_by_key(|scc| scc.iter().min().copied())?;
    let members: BTreeSet<ChipCoord> = component.iter().copied().collect();
    let start = *members.first()?;

    // shortest walk back to `start` inside the component
    let mut parent: BTreeMap<ChipCoord, ChipCoord> = BTreeMap::new();
    let mut queue = VecDeque::from([start]);
    while let Some(chip) = queue.pop_front() {
        for next in hops.neighbors(chip) {
            if !members.contains(&next) {
                continue;
            }
            if next == start {
                let mut chips = vec![start, chip];
                let mut current = chip;
                while let Some(&previous) = parent.get(&current) {
                    chips.push(previous);
                    current = previous;
                }
                chips.reverse();
                return Some(chips);
            }
            if !parent.contains_key(&next) {
                parent.insert(next, chip);
                queue.push_back(next);
            }
        }
    }
    None
}
