//! Chips, cores, routers and links.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tessera_common::{ChipCoord, Direction, ResourceCost};

/// Core 0 of every chip runs the monitor and is never placed on.
pub const MONITOR_CORE: u32 = 0;

/// One processing core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Core {
    /// Core index on its chip.
    pub id: u32,
    /// CPU cycles available per time step.
    pub cpu_cycles: u64,
    /// Bytes of local memory.
    pub local_memory: u64,
    /// Whether this is the monitor core.
    pub is_monitor: bool,
}

/// An outgoing router link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// The direction the link leaves in.
    pub direction: Direction,
    /// The chip at the far end.
    pub destination: ChipCoord,
    /// Relative bandwidth; 1 is a standard link, larger is faster.
    pub speed: u32,
}

/// A chip's multicast router.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    /// Outgoing links by direction.
    pub links: BTreeMap<Direction, Link>,
    /// Maximum number of multicast entries.
    pub table_capacity: usize,
}

impl Router {
    /// Creates a router with no links.
    pub fn new(table_capacity: usize) -> Self {
        Self {
            links: BTreeMap::new(),
            table_capacity,
        }
    }

    /// Returns the link leaving in `direction`, if any.
    pub fn link(&self, direction: Direction) -> Option<&Link> {
        self.links.get(&direction)
    }
}

/// Parameters shared by every chip of a regular mesh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChipTemplate {
    /// Cores per chip, including the monitor.
    pub cores: u32,
    /// CPU cycles per core per time step.
    pub cpu_cycles: u64,
    /// Local memory bytes per core.
    pub local_memory: u64,
    /// Shared memory bytes per chip.
    pub shared_memory: u64,
    /// Router table capacity.
    pub table_capacity: usize,
}

/// A chip in the fabric.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chip {
    /// Position in the mesh.
    pub coord: ChipCoord,
    /// Working cores in ascending id order. Down cores are absent.
    pub cores: Vec<Core>,
    /// Bytes of memory shared by all cores.
    pub shared_memory: u64,
    /// The chip's router.
    pub router: Router,
    /// Whether this chip was synthesized for an off-mesh peripheral.
    pub is_virtual: bool,
}

impl Chip {
    /// Builds a real chip with all cores present and no links.
    pub fn from_template(coord: ChipCoord, template: &ChipTemplate) -> Self {
        let cores = (0..template.cores)
            .map(|id| Core {
                id,
                cpu_cycles: template.cpu_cycles,
                local_memory: template.local_memory,
                is_monitor: id == MONITOR_CORE,
            })
            .collect();
        Self {
            coord,
            cores,
            shared_memory: template.shared_memory,
            router: Router::new(template.table_capacity),
            is_virtual: false,
        }
    }

    /// Returns the core with the given id, if it is working.
    pub fn core(&self, id: u32) -> Option<&Core> {
        self.cores.iter().find(|c| c.id == id)
    }

    /// Iterates over the cores available to the application.
    pub fn application_cores(&self) -> impl Iterator<Item = &Core> {
        self.cores.iter().filter(|c| !c.is_monitor)
    }

    /// The budget of one core, with the whole chip's shared memory.
    pub fn core_budget(&self, core: &Core) -> ResourceCost {
        ResourceCost::new(core.cpu_cycles, core.local_memory, self.shared_memory)
    }

    /// Returns the chip the link in `direction` leads to.
    pub fn neighbour(&self, direction: Direction) -> Option<ChipCoord> {
        self.router.link(direction).map(|l| l.destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> ChipTemplate {
        ChipTemplate {
            cores: 4,
            cpu_cycles: 100,
            local_memory: 200,
            shared_memory: 1000,
            table_capacity: 8,
        }
    }

    #[test]
    fn template_reserves_monitor() {
        let chip = Chip::from_template(ChipCoord::new(0, 0), &template());
        assert_eq!(chip.cores.len(), 4);
        assert!(chip.core(MONITOR_CORE).unwrap().is_monitor);
        let app: Vec<u32> = chip.application_cores().map(|c| c.id).collect();
        assert_eq!(app, vec![1, 2, 3]);
    }

    #[test]
    fn core_budget_includes_shared_pool() {
        let chip = Chip::from_template(ChipCoord::new(0, 0), &template());
        let budget = chip.core_budget(chip.core(1).unwrap());
        assert_eq!(budget, ResourceCost::new(100, 200, 1000));
    }

    #[test]
    fn neighbour_follows_links() {
        let mut chip = Chip::from_template(ChipCoord::new(0, 0), &template());
        chip.router.links.insert(
            Direction::East,
            Link {
                direction: Direction::East,
                destination: ChipCoord::new(1, 0),
                speed: 1,
            },
        );
        assert_eq!(chip.neighbour(Direction::East), Some(ChipCoord::new(1, 0)));
        assert_eq!(chip.neighbour(Direction::North), None);
    }
}
