//! The fabric: a mesh of chips joined by directional links.

use crate::chip::{Chip, ChipTemplate, Link};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tessera_common::{ChipCoord, Direction, Location, MapError, MapResult, ResourceCost};
use tessera_config::MachineConfig;

/// The target mesh.
///
/// Chips are kept in coordinate order, which is the fixed traversal order of
/// every linear scan (placement, table compilation, stop).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fabric {
    chips: BTreeMap<ChipCoord, Chip>,
}

impl Fabric {
    /// Creates an empty fabric.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a `width` x `height` hexagonal mesh.
    ///
    /// Every chip gets a link in each of the six directions whose neighbour
    /// lies inside the mesh; with `wrap_around` the edges join to form a
    /// torus and every chip has all six links.
    pub fn grid(width: u32, height: u32, template: &ChipTemplate, wrap_around: bool) -> Self {
        let mut chips = BTreeMap::new();
        for x in 0..width {
            for y in 0..height {
                let coord = ChipCoord::new(x, y);
                let mut chip = Chip::from_template(coord, template);
                for direction in Direction::ALL {
                    if let Some(destination) = step(coord, direction, width, height, wrap_around) {
                        chip.router.links.insert(
                            direction,
                            Link {
                                direction,
                                destination,
                                speed: 1,
                            },
                        );
                    }
                }
                chips.insert(coord, chip);
            }
        }
        Self { chips }
    }

    /// Builds the fabric described by a machine configuration, with its down
    /// chips and down cores removed.
    pub fn from_config(machine: &MachineConfig) -> MapResult<Self> {
        let template = ChipTemplate {
            cores: machine.cores_per_chip,
            cpu_cycles: machine.cpu_cycles_per_core,
            local_memory: machine.local_memory_per_core,
            shared_memory: machine.shared_memory_per_chip,
            table_capacity: machine.router_table_capacity,
        };
        let mut fabric = Self::grid(machine.width, machine.height, &template, machine.wrap_around);
        for &chip in &machine.down_chips {
            fabric.remove_chip(chip)?;
        }
        for &location in &machine.down_cores {
            fabric.remove_core(location)?;
        }
        tracing::debug!(
            chips = fabric.chips.len(),
            cores = fabric.application_core_count(),
            "built fabric"
        );
        Ok(fabric)
    }

    /// Adds a chip, replacing any chip at the same coordinate.
    pub fn insert_chip(&mut self, chip: Chip) {
        self.chips.insert(chip.coord, chip);
    }

    /// Removes a chip and every link leading to it.
    pub fn remove_chip(&mut self, coord: ChipCoord) -> MapResult<()> {
        if self.chips.remove(&coord).is_none() {
            return Err(MapError::InvalidConstraint {
                subject: format!("chip {coord}"),
                reason: "cannot mark a nonexistent chip as down".into(),
            });
        }
        for chip in self.chips.values_mut() {
            chip.router.links.retain(|_, link| link.destination != coord);
        }
        Ok(())
    }

    /// Removes one core from its chip.
    pub fn remove_core(&mut self, location: Location) -> MapResult<()> {
        let chip = self
            .chips
            .get_mut(&location.chip)
            .ok_or_else(|| MapError::InvalidConstraint {
                subject: format!("core {location}"),
                reason: "chip does not exist".into(),
            })?;
        let before = chip.cores.len();
        chip.cores.retain(|c| c.id != location.core);
        if chip.cores.len() == before {
            return Err(MapError::InvalidConstraint {
                subject: format!("core {location}"),
                reason: "core does not exist".into(),
            });
        }
        Ok(())
    }

    /// Sets the relative speed of the link leaving `from` in `direction`.
    pub fn set_link_speed(
        &mut self,
        from: ChipCoord,
        direction: Direction,
        speed: u32,
    ) -> MapResult<()> {
        let link = self
            .chips
            .get_mut(&from)
            .and_then(|chip| chip.router.links.get_mut(&direction))
            .ok_or_else(|| MapError::InvalidConstraint {
                subject: format!("chip {from}"),
                reason: format!("has no {direction} link"),
            })?;
        link.speed = speed.max(1);
        Ok(())
    }

    /// Returns the chip at `coord`.
    pub fn chip(&self, coord: ChipCoord) -> Option<&Chip> {
        self.chips.get(&coord)
    }

    /// Returns a mutable reference to the chip at `coord`.
    pub fn chip_mut(&mut self, coord: ChipCoord) -> Option<&mut Chip> {
        self.chips.get_mut(&coord)
    }

    /// Iterates over all chips in coordinate order.
    pub fn chips(&self) -> impl Iterator<Item = &Chip> {
        self.chips.values()
    }

    /// Returns `true` if a chip exists at `coord`.
    pub fn contains(&self, coord: ChipCoord) -> bool {
        self.chips.contains_key(&coord)
    }

    /// Returns `true` if `coord` holds a virtual chip.
    pub fn is_virtual(&self, coord: ChipCoord) -> bool {
        self.chips.get(&coord).is_some_and(|c| c.is_virtual)
    }

    /// Returns the number of chips.
    pub fn len(&self) -> usize {
        self.chips.len()
    }

    /// Returns `true` if the fabric has no chips.
    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }

    /// Returns the link leaving `from` in `direction`.
    pub fn link(&self, from: ChipCoord, direction: Direction) -> Option<&Link> {
        self.chips.get(&from)?.router.link(direction)
    }

    /// Total cores available to the application on real chips.
    pub fn application_core_count(&self) -> usize {
        self.real_chips()
            .map(|chip| chip.application_cores().count())
            .sum()
    }

    /// Iterates over chips that are not virtual.
    pub fn real_chips(&self) -> impl Iterator<Item = &Chip> {
        self.chips.values().filter(|c| !c.is_virtual)
    }

    /// The largest budget a slice may use and still fit any application core
    /// of any real chip.
    ///
    /// Cycles and local memory are the minimum over all cores. Shared memory
    /// is each chip's pool divided evenly among its application cores, again
    /// minimized over chips. Returns `None` if no application core exists.
    pub fn partition_budget(&self) -> Option<ResourceCost> {
        let mut budget: Option<ResourceCost> = None;
        for chip in self.real_chips() {
            let app_cores = chip.application_cores().count() as u64;
            if app_cores == 0 {
                continue;
            }
            let share = chip.shared_memory / app_cores;
            for core in chip.application_cores() {
                let here = ResourceCost::new(core.cpu_cycles, core.local_memory, share);
                budget = Some(match budget {
                    None => here,
                    Some(b) => ResourceCost::new(
                        b.cpu_cycles.min(here.cpu_cycles),
                        b.local_memory.min(here.local_memory),
                        b.shared_memory.min(here.shared_memory),
                    ),
                });
            }
        }
        budget
    }
}

/// Returns the chip one step from `from`, or `None` if it leaves a
/// non-wrapping mesh.
fn step(
    from: ChipCoord,
    direction: Direction,
    width: u32,
    height: u32,
    wrap_around: bool,
) -> Option<ChipCoord> {
    let (dx, dy) = direction.offset();
    let x = i64::from(from.x) + dx;
    let y = i64::from(from.y) + dy;
    let (w, h) = (i64::from(width), i64::from(height));
    if wrap_around {
        // a 1-wide torus would link a chip to itself
        if (dx != 0 && w < 2) || (dy != 0 && h < 2) {
            return None;
        }
        let x = u32::try_from(x.rem_euclid(w)).ok()?;
        let y = u32::try_from(y.rem_euclid(h)).ok()?;
        Some(ChipCoord::new(x, y))
    } else if (0..w).contains(&x) && (0..h).contains(&y) {
        Some(ChipCoord::new(u32::try_from(x).ok()?, u32::try_from(y).ok()?))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::MONITOR_CORE;

    fn template() -> ChipTemplate {
        ChipTemplate {
            cores: 5,
            cpu_cycles: 1000,
            local_memory: 4096,
            shared_memory: 8000,
            table_capacity: 32,
        }
    }

    #[test]
    fn grid_links_inside_mesh() {
        let fabric = Fabric::grid(2, 2, &template(), false);
        assert_eq!(fabric.len(), 4);
        let origin = fabric.chip(ChipCoord::new(0, 0)).unwrap();
        let dirs: Vec<Direction> = origin.router.links.keys().copied().collect();
        assert_eq!(
            dirs,
            vec![Direction::East, Direction::NorthEast, Direction::North]
        );
        let top = fabric.chip(ChipCoord::new(1, 1)).unwrap();
        assert_eq!(top.neighbour(Direction::SouthWest), Some(ChipCoord::new(0, 0)));
        assert_eq!(top.neighbour(Direction::East), None);
    }

    #[test]
    fn links_are_symmetric() {
        let fabric = Fabric::grid(3, 3, &template(), false);
        for chip in fabric.chips() {
            for link in chip.router.links.values() {
                let back = fabric
                    .link(link.destination, link.direction.opposite())
                    .unwrap();
                assert_eq!(back.destination, chip.coord);
            }
        }
    }

    #[test]
    fn wrap_around_gives_six_links() {
        let fabric = Fabric::grid(3, 3, &template(), true);
        for chip in fabric.chips() {
            assert_eq!(chip.router.links.len(), 6);
        }
        assert_eq!(
            fabric.link(ChipCoord::new(0, 0), Direction::West).unwrap().destination,
            ChipCoord::new(2, 0)
        );
    }

    #[test]
    fn from_config_removes_down_resources() {
        let machine = MachineConfig {
            width: 2,
            height: 2,
            cores_per_chip: 4,
            down_chips: vec![ChipCoord::new(1, 1)],
            down_cores: vec![Location::new(0, 0, 2)],
            ..MachineConfig::default()
        };
        let fabric = Fabric::from_config(&machine).unwrap();
        assert_eq!(fabric.len(), 3);
        assert!(!fabric.contains(ChipCoord::new(1, 1)));
        assert!(fabric.link(ChipCoord::new(0, 0), Direction::NorthEast).is_none());
        let origin = fabric.chip(ChipCoord::new(0, 0)).unwrap();
        assert!(origin.core(2).is_none());
        // 3 app cores on two chips, 2 on the origin
        assert_eq!(fabric.application_core_count(), 8);
    }

    #[test]
    fn removing_missing_core_fails() {
        let mut fabric = Fabric::grid(1, 1, &template(), false);
        let err = fabric.remove_core(Location::new(0, 0, 9)).unwrap_err();
        assert!(matches!(err, MapError::InvalidConstraint { .. }));
    }

    #[test]
    fn partition_budget_shares_memory() {
        let mut fabric = Fabric::grid(2, 1, &template(), false);
        let budget = fabric.partition_budget().unwrap();
        assert_eq!(budget, ResourceCost::new(1000, 4096, 2000));

        fabric.remove_core(Location::new(1, 0, 1)).unwrap();
        // remaining cores on (1, 0) get a larger share but the minimum holds
        assert_eq!(fabric.partition_budget().unwrap().shared_memory, 2000);
    }

    #[test]
    fn partition_budget_without_cores() {
        let t = ChipTemplate {
            cores: 1,
            ..template()
        };
        let fabric = Fabric::grid(1, 1, &t, false);
        assert!(fabric.chip(ChipCoord::new(0, 0)).unwrap().core(MONITOR_CORE).is_some());
        assert!(fabric.partition_budget().is_none());
    }

    #[test]
    fn link_speed() {
        let mut fabric = Fabric::grid(2, 1, &template(), false);
        fabric
            .set_link_speed(ChipCoord::new(0, 0), Direction::East, 4)
            .unwrap();
        assert_eq!(
            fabric.link(ChipCoord::new(0, 0), Direction::East).unwrap().speed,
            4
        );
        assert!(fabric
            .set_link_speed(ChipCoord::new(0, 0), Direction::West, 4)
            .is_err());
    }

    #[test]
    fn json_round_trip_keeps_virtual_chip() {
        use crate::virtual_chip::VirtualChipSpec;

        let mut fabric = Fabric::grid(2, 1, &template(), false);
        fabric.remove_core(Location::new(1, 0, 2)).unwrap();
        fabric
            .set_link_speed(ChipCoord::new(0, 0), Direction::East, 4)
            .unwrap();
        fabric
            .add_virtual_chip(&VirtualChipSpec {
                coord: ChipCoord::new(5, 0),
                connected_to: ChipCoord::new(0, 0),
                direction: Direction::West,
            })
            .unwrap();

        let json = serde_json::to_string(&fabric).unwrap();
        let back: Fabric = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fabric);
        assert!(back.is_virtual(ChipCoord::new(5, 0)));
        assert!(!back.is_virtual(ChipCoord::new(0, 0)));
        assert_eq!(back.application_core_count(), 7);
    }
}
