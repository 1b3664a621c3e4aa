//! Single-source shortest paths over the chip-link graph.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use tessera_common::{ChipCoord, Direction};
use tessera_config::RouterKind;
use tessera_fabric::{Fabric, Link};

/// Cost of a standard-speed link under [`RouterKind::LinkSpeed`].
pub const LINK_COST_SCALE: u64 = 1024;

/// A search state in the Dijkstra priority queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SearchState {
    cost: u64,
    chip: ChipCoord,
}

impl Ord for SearchState {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed for a min-heap; ties pop in coordinate order
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.chip.cmp(&self.chip))
    }
}

impl PartialOrd for SearchState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn link_cost(kind: RouterKind, link: &Link) -> u64 {
    match kind {
        RouterKind::ShortestPath => 1,
        RouterKind::LinkSpeed => (LINK_COST_SCALE / u64::from(link.speed.max(1))).max(1),
    }
}

/// Shortest paths from one chip to every chip reachable from it.
///
/// Equal-cost alternatives are resolved by relaxation order (lowest chip
/// first, links in direction order), so the tree is deterministic.
#[derive(Debug, Clone)]
pub struct ShortestPathTree {
    source: ChipCoord,
    /// For each reached chip other than the source, the previous chip and
    /// the link taken out of it.
    parent: BTreeMap<ChipCoord, (ChipCoord, Direction)>,
    distance: BTreeMap<ChipCoord, u64>,
}

impl ShortestPathTree {
    /// Runs Dijkstra from `source` over the links of `fabric`.
    pub fn compute(fabric: &Fabric, source: ChipCoord, kind: RouterKind) -> Self {
        let mut distance = BTreeMap::new();
        let mut parent = BTreeMap::new();
        let mut open = BinaryHeap::new();

        distance.insert(source, 0);
        open.push(SearchState {
            cost: 0,
            chip: source,
        });

        while let Some(current) = open.pop() {
            if current.cost > distance.get(&current.chip).copied().unwrap_or(u64::MAX) {
                continue; // stale entry
            }
            let Some(chip) = fabric.chip(current.chip) else {
                continue;
            };
            for (&direction, link) in &chip.router.links {
                if !fabric.contains(link.destination) {
                    continue;
                }
                let tentative = current.cost + link_cost(kind, link);
                let known = distance.get(&link.destination).copied().unwrap_or(u64::MAX);
                if tentative < known {
                    distance.insert(link.destination, tentative);
                    parent.insert(link.destination, (current.chip, direction));
                    open.push(SearchState {
                        cost: tentative,
                        chip: link.destination,
                    });
                }
            }
        }

        Self {
            source,
            parent,
            distance,
        }
    }

    /// The chip the tree is rooted at.
    pub fn source(&self) -> ChipCoord {
        self.source
    }

    /// Path cost to `target`, if reachable.
    pub fn distance(&self, target: ChipCoord) -> Option<u64> {
        self.distance.get(&target).copied()
    }

    /// The hops from the source to `target` as `(chip, outgoing link)` pairs
    /// in travel order. Empty when `target` is the source.
    pub fn path_to(&self, target: ChipCoord) -> Option<Vec<(ChipCoord, Direction)>> {
        if !self.distance.contains_key(&target) {
            return None;
        }
        let mut hops = Vec::new();
        let mut current = target;
        while current != self.source {
            let &(previous, direction) = self.parent.get(&current)?;
            hops.push((previous, direction));
            current = previous;
        }
        hops.reverse();
        Some(hops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_fabric::ChipTemplate;

    fn fabric(w: u32, h: u32) -> Fabric {
        let t = ChipTemplate {
            cores: 2,
            cpu_cycles: 1,
            local_memory: 1,
            shared_memory: 1,
            table_capacity: 8,
        };
        Fabric::grid(w, h, &t, false)
    }

    #[test]
    fn diagonal_uses_north_east() {
        let f = fabric(3, 3);
        let tree = ShortestPathTree::compute(&f, ChipCoord::new(0, 0), RouterKind::ShortestPath);
        assert_eq!(tree.distance(ChipCoord::new(2, 2)), Some(2));
        assert_eq!(
            tree.path_to(ChipCoord::new(2, 2)).unwrap(),
            vec![
                (ChipCoord::new(0, 0), Direction::NorthEast),
                (ChipCoord::new(1, 1), Direction::NorthEast)
            ]
        );
        assert!(tree.path_to(ChipCoord::new(0, 0)).unwrap().is_empty());
    }

    #[test]
    fn unreachable_chip() {
        let mut f = fabric(3, 1);
        f.remove_chip(ChipCoord::new(1, 0)).unwrap();
        let tree = ShortestPathTree::compute(&f, ChipCoord::new(0, 0), RouterKind::ShortestPath);
        assert!(tree.path_to(ChipCoord::new(2, 0)).is_none());
        assert!(tree.distance(ChipCoord::new(2, 0)).is_none());
    }

    #[test]
    fn link_speed_prefers_fast_detour() {
        // (0,0) -> (2,0): direct is two east hops; make the north detour fast
        let mut f = fabric(3, 2);
        f.set_link_speed(ChipCoord::new(0, 0), Direction::East, 1).unwrap();
        f.set_link_speed(ChipCoord::new(0, 0), Direction::NorthEast, 8).unwrap();
        f.set_link_speed(ChipCoord::new(1, 1), Direction::East, 8).unwrap();
        f.set_link_speed(ChipCoord::new(2, 1), Direction::South, 8).unwrap();
        let hops = ShortestPathTree::compute(&f, ChipCoord::new(0, 0), RouterKind::ShortestPath);
        assert_eq!(hops.path_to(ChipCoord::new(2, 0)).unwrap().len(), 2);
        let speed = ShortestPathTree::compute(&f, ChipCoord::new(0, 0), RouterKind::LinkSpeed);
        let path = speed.path_to(ChipCoord::new(2, 0)).unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], (ChipCoord::new(0, 0), Direction::NorthEast));
        assert_eq!(speed.distance(ChipCoord::new(2, 0)), Some(3 * 128));
    }

    #[test]
    fn deterministic() {
        let f = fabric(4, 4);
        let a = ShortestPathTree::compute(&f, ChipCoord::new(1, 2), RouterKind::ShortestPath);
        let b = ShortestPathTree::compute(&f, ChipCoord::new(1, 2), RouterKind::ShortestPath);
        assert_eq!(a.parent, b.parent);
    }
}
