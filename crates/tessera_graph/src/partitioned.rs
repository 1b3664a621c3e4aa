//! The partitioned graph: slices and the connections between them.

use crate::atoms::AtomRange;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tessera_common::{ConnectionId, PartitionedConnectionId, ResourceCost, SliceId, UnitId};

/// A contiguous atom range of one unit, sized to fit one core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice {
    /// Position in the partitioned graph's slice list.
    pub id: SliceId,
    /// The unit this slice belongs to.
    pub unit: UnitId,
    /// Position among the unit's slices.
    pub index: u32,
    /// The atoms covered.
    pub atoms: AtomRange,
    /// Cost of the slice, fixed at partitioning time.
    pub cost: ResourceCost,
}

/// Traffic of one connection leaving one source slice.
///
/// Every target slice shares the routing key assigned to this connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionedConnection {
    /// Position in the partitioned graph's connection list.
    pub id: PartitionedConnectionId,
    /// The application connection this was split from.
    pub connection: ConnectionId,
    /// Sending slice.
    pub source: SliceId,
    /// Receiving slices, in ascending order.
    pub targets: Vec<SliceId>,
}

/// Slices and partitioned connections produced by the partitioner.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionedGraph {
    slices: Vec<Slice>,
    connections: Vec<PartitionedConnection>,
    by_unit: BTreeMap<UnitId, Vec<SliceId>>,
}

impl PartitionedGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the next slice of `unit`.
    pub fn add_slice(&mut self, unit: UnitId, atoms: AtomRange, cost: ResourceCost) -> SliceId {
        let id = SliceId::from_raw(self.slices.len() as u32);
        let siblings = self.by_unit.entry(unit).or_default();
        self.slices.push(Slice {
            id,
            unit,
            index: siblings.len() as u32,
            atoms,
            cost,
        });
        siblings.push(id);
        id
    }

    /// Appends a partitioned connection.
    pub fn add_connection(
        &mut self,
        connection: ConnectionId,
        source: SliceId,
        mut targets: Vec<SliceId>,
    ) -> PartitionedConnectionId {
        targets.sort_unstable();
        targets.dedup();
        let id = PartitionedConnectionId::from_raw(self.connections.len() as u32);
        self.connections.push(PartitionedConnection {
            id,
            connection,
            source,
            targets,
        });
        id
    }

    /// Returns the slice with the given ID.
    pub fn slice(&self, id: SliceId) -> Option<&Slice> {
        self.slices.get(id.index())
    }

    /// All slices in creation order.
    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    /// Slice IDs of `unit` in ascending atom order.
    pub fn slices_of(&self, unit: UnitId) -> &[SliceId] {
        self.by_unit.get(&unit).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All partitioned connections.
    pub fn connections(&self) -> &[PartitionedConnection] {
        &self.connections
    }

    /// Mutable access to the partitioned connections, for pruning targets.
    pub fn connections_mut(&mut self) -> &mut [PartitionedConnection] {
        &mut self.connections
    }

    /// Keeps only the connections for which `keep` returns `true`, then
    /// renumbers the survivors densely in their existing order.
    pub fn retain_connections<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&PartitionedConnection) -> bool,
    {
        let before = self.connections.len();
        self.connections.retain(|pc| keep(pc));
        for (i, pc) in self.connections.iter_mut().enumerate() {
            pc.id = PartitionedConnectionId::from_raw(i as u32);
        }
        before - self.connections.len()
    }

    /// For every slice with connections, the other slices it exchanges
    /// traffic with in either direction.
    pub fn adjacency(&self) -> BTreeMap<SliceId, BTreeSet<SliceId>> {
        let mut adj: BTreeMap<SliceId, BTreeSet<SliceId>> = BTreeMap::new();
        for pc in &self.connections {
            for &target in pc.targets.iter().filter(|&&t| t != pc.source) {
                adj.entry(pc.source).or_default().insert(target);
                adj.entry(target).or_default().insert(pc.source);
            }
        }
        adj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_numbered_per_unit() {
        let mut g = PartitionedGraph::new();
        let u0 = UnitId::from_raw(0);
        let u1 = UnitId::from_raw(1);
        let a = g.add_slice(u0, AtomRange::new(0, 60), ResourceCost::ZERO);
        let b = g.add_slice(u1, AtomRange::new(0, 10), ResourceCost::ZERO);
        let c = g.add_slice(u0, AtomRange::new(60, 100), ResourceCost::ZERO);
        assert_eq!(g.slices_of(u0), &[a, c]);
        assert_eq!(g.slice(c).unwrap().index, 1);
        assert_eq!(g.slice(b).unwrap().index, 0);
        assert!(g.slices_of(UnitId::from_raw(9)).is_empty());
    }

    #[test]
    fn retain_renumbers() {
        let mut g = PartitionedGraph::new();
        let s: Vec<SliceId> = (0..3)
            .map(|i| g.add_slice(UnitId::from_raw(i), AtomRange::new(0, 1), ResourceCost::ZERO))
            .collect();
        let c = ConnectionId::from_raw(0);
        g.add_connection(c, s[0], vec![s[1]]);
        g.add_connection(c, s[1], vec![s[2], s[2]]);
        g.add_connection(c, s[2], vec![s[0]]);
        assert_eq!(g.connections()[1].targets, vec![s[2]]);

        let removed = g.retain_connections(|pc| pc.source != s[1]);
        assert_eq!(removed, 1);
        let ids: Vec<u32> = g.connections().iter().map(|pc| pc.id.as_raw()).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(g.connections()[1].source, s[2]);
    }

    #[test]
    fn adjacency_both_directions() {
        let mut g = PartitionedGraph::new();
        let s: Vec<SliceId> = (0..3)
            .map(|i| g.add_slice(UnitId::from_raw(i), AtomRange::new(0, 1), ResourceCost::ZERO))
            .collect();
        let c = ConnectionId::from_raw(0);
        g.add_connection(c, s[0], vec![s[1], s[0]]);
        g.add_connection(c, s[2], vec![s[0]]);
        let adj = g.adjacency();
        assert_eq!(adj[&s[0]].iter().copied().collect::<Vec<_>>(), vec![s[1], s[2]]);
        assert_eq!(adj[&s[1]].iter().copied().collect::<Vec<_>>(), vec![s[0]]);
    }

    #[test]
    fn json_round_trip_keeps_unit_index() {
        let mut g = PartitionedGraph::new();
        let u0 = UnitId::from_raw(0);
        let u1 = UnitId::from_raw(1);
        let a = g.add_slice(u0, AtomRange::new(0, 60), ResourceCost::new(600, 60, 0));
        let b = g.add_slice(u1, AtomRange::new(0, 10), ResourceCost::ZERO);
        let c = g.add_slice(u0, AtomRange::new(60, 100), ResourceCost::new(400, 40, 0));
        g.add_connection(ConnectionId::from_raw(0), a, vec![b]);
        g.add_connection(ConnectionId::from_raw(0), c, vec![b]);

        let json = serde_json::to_string(&g).unwrap();
        let back: PartitionedGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, g);
        assert_eq!(back.slices_of(u0), &[a, c]);
        assert_eq!(back.adjacency(), g.adjacency());
    }
}
