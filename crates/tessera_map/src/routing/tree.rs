//! Multicast trees for single partitioned connections.

use std::collections::{BTreeMap, BTreeSet};
use tessera_common::{ChipCoord, Direction};

/// The chips a connection's packets visit, the links each chip forwards
/// them on, and the cores that consume them.
///
/// Paths to different destinations that share a prefix share its chips, so
/// every chip contributes at most one table entry per connection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MulticastTree {
    hops: BTreeMap<ChipCoord, BTreeSet<Direction>>,
    deliveries: BTreeMap<ChipCoord, BTreeSet<u32>>,
}

impl MulticastTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forwards packets from `chip` along `direction`.
    pub fn add_hop(&mut self, chip: ChipCoord, direction: Direction) {
        self.hops.entry(chip).or_default().insert(direction);
    }

    /// Delivers packets to `core` on `chip`.
    pub fn deliver(&mut self, chip: ChipCoord, core: u32) {
        self.deliveries.entry(chip).or_default().insert(core);
    }

    /// Number of chips that need a table entry.
    pub fn chip_count(&self) -> usize {
        self.entries().count()
    }

    /// Per chip, the outgoing links and local cores, in coordinate order.
    pub fn entries(&self) -> impl Iterator<Item = (ChipCoord, BTreeSet<Direction>, BTreeSet<u32>)> + '_ {
        let chips: BTreeSet<ChipCoord> = self
            .hops
            .keys()
            .chain(self.deliveries.keys())
            .copied()
            .collect();
        chips.into_iter().map(move |chip| {
            (
                chip,
                self.hops.get(&chip).cloned().unwrap_or_default(),
                self.deliveries.get(&chip).cloned().unwrap_or_default(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_prefix_merges() {
        let mut tree = MulticastTree::new();
        let origin = ChipCoord::new(0, 0);
        tree.add_hop(origin, Direction::East);
        tree.add_hop(origin, Direction::East);
        tree.add_hop(origin, Direction::North);
        tree.deliver(ChipCoord::new(1, 0), 3);
        tree.deliver(ChipCoord::new(0, 1), 1);
        tree.deliver(origin, 2);
        let entries: Vec<_> = tree.entries().collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(tree.chip_count(), 3);
        let (chip, links, cores) = &entries[0];
        assert_eq!(*chip, origin);
        assert_eq!(links.len(), 2);
        assert_eq!(cores, &BTreeSet::from([2]));
    }
}
