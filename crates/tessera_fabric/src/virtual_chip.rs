//! Virtual chips standing in for peripherals attached to the mesh.
//!
//! A virtual chip has a full set of cores and an unbounded routing table, and
//! is joined to exactly one real chip by a bidirectional link. Units whose
//! slices must live on the peripheral name its [`VirtualChipSpec`].

use crate::chip::{Chip, Core, Link, Router, MONITOR_CORE};
use crate::fabric::Fabric;
use serde::{Deserialize, Serialize};
use tessera_common::{ChipCoord, Direction, MapError, MapResult};

/// Cores on a synthesized virtual chip, including its monitor.
pub const VIRTUAL_CHIP_CORES: u32 = 128;

/// Where a virtual chip sits and how it attaches to the mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VirtualChipSpec {
    /// Coordinate of the virtual chip; must not be a real chip.
    pub coord: ChipCoord,
    /// The real chip it is attached to.
    pub connected_to: ChipCoord,
    /// Direction of the link from the real chip to the virtual one.
    pub direction: Direction,
}

impl Fabric {
    /// Synthesizes the virtual chip described by `spec` and wires it in.
    ///
    /// The real chip gains a link in `spec.direction`; the virtual chip gets
    /// the opposite link back. Adding the same spec twice is a no-op.
    pub fn add_virtual_chip(&mut self, spec: &VirtualChipSpec) -> MapResult<()> {
        let invalid = |reason: String| MapError::InvalidConstraint {
            subject: format!("virtual chip {}", spec.coord),
            reason,
        };
        if let Some(existing) = self.chip(spec.coord) {
            let same = existing.is_virtual
                && existing.neighbour(spec.direction.opposite()) == Some(spec.connected_to);
            return if same {
                Ok(())
            } else {
                Err(invalid("coordinate is already occupied".into()))
            };
        }
        let real = self
            .chip(spec.connected_to)
            .ok_or_else(|| invalid(format!("attachment chip {} does not exist", spec.connected_to)))?;
        if real.is_virtual {
            return Err(invalid(format!(
                "attachment chip {} is itself virtual",
                spec.connected_to
            )));
        }
        if let Some(taken) = real.router.link(spec.direction) {
            return Err(invalid(format!(
                "{} link of chip {} already leads to {}",
                spec.direction, spec.connected_to, taken.destination
            )));
        }
        let core_template = real
            .application_cores()
            .next()
            .or_else(|| real.cores.first())
            .cloned()
            .ok_or_else(|| invalid(format!("attachment chip {} has no cores", spec.connected_to)))?;
        let shared_memory = real.shared_memory;

        let cores = (0..VIRTUAL_CHIP_CORES)
            .map(|id| Core {
                id,
                cpu_cycles: core_template.cpu_cycles,
                local_memory: core_template.local_memory,
                is_monitor: id == MONITOR_CORE,
            })
            .collect();
        let back = spec.direction.opposite();
        let mut router = Router::new(usize::MAX);
        router.links.insert(
            back,
            Link {
                direction: back,
                destination: spec.connected_to,
                speed: 1,
            },
        );
        self.insert_chip(Chip {
            coord: spec.coord,
            cores,
            shared_memory,
            router,
            is_virtual: true,
        });
        if let Some(real) = self.chip_mut(spec.connected_to) {
            real.router.links.insert(
                spec.direction,
                Link {
                    direction: spec.direction,
                    destination: spec.coord,
                    speed: 1,
                },
            );
        }
        tracing::debug!(
            chip = %spec.coord,
            via = %spec.connected_to,
            direction = %spec.direction,
            "added virtual chip"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::ChipTemplate;

    fn fabric() -> Fabric {
        let template = ChipTemplate {
            cores: 4,
            cpu_cycles: 1000,
            local_memory: 4096,
            shared_memory: 8000,
            table_capacity: 16,
        };
        Fabric::grid(1, 1, &template, false)
    }

    fn spec() -> VirtualChipSpec {
        VirtualChipSpec {
            coord: ChipCoord::new(5, 0),
            connected_to: ChipCoord::new(0, 0),
            direction: Direction::West,
        }
    }

    #[test]
    fn wires_link_both_ways() {
        let mut fabric = fabric();
        fabric.add_virtual_chip(&spec()).unwrap();
        let v = fabric.chip(ChipCoord::new(5, 0)).unwrap();
        assert!(v.is_virtual);
        assert_eq!(v.cores.len(), VIRTUAL_CHIP_CORES as usize);
        assert!(v.core(MONITOR_CORE).unwrap().is_monitor);
        assert_eq!(v.router.table_capacity, usize::MAX);
        assert_eq!(v.neighbour(Direction::East), Some(ChipCoord::new(0, 0)));
        assert_eq!(v.router.links.len(), 1);
        assert_eq!(
            fabric.link(ChipCoord::new(0, 0), Direction::West).unwrap().destination,
            ChipCoord::new(5, 0)
        );
    }

    #[test]
    fn adding_twice_is_noop() {
        let mut fabric = fabric();
        fabric.add_virtual_chip(&spec()).unwrap();
        fabric.add_virtual_chip(&spec()).unwrap();
        assert_eq!(fabric.len(), 2);
    }

    #[test]
    fn virtual_chips_do_not_count_as_real() {
        let mut fabric = fabric();
        let before = fabric.partition_budget();
        fabric.add_virtual_chip(&spec()).unwrap();
        assert_eq!(fabric.application_core_count(), 3);
        assert_eq!(fabric.partition_budget(), before);
    }

    #[test]
    fn rejects_bad_attachment() {
        let mut fabric = fabric();
        let mut s = spec();
        s.connected_to = ChipCoord::new(9, 9);
        assert!(matches!(
            fabric.add_virtual_chip(&s),
            Err(MapError::InvalidConstraint { .. })
        ));

        let mut s = spec();
        s.coord = ChipCoord::new(0, 0);
        assert!(fabric.add_virtual_chip(&s).is_err());
    }

    #[test]
    fn rejects_used_link() {
        let template = ChipTemplate {
            cores: 4,
            cpu_cycles: 1,
            local_memory: 1,
            shared_memory: 1,
            table_capacity: 1,
        };
        let mut fabric = Fabric::grid(2, 1, &template, false);
        let s = VirtualChipSpec {
            coord: ChipCoord::new(7, 7),
            connected_to: ChipCoord::new(0, 0),
            direction: Direction::East,
        };
        assert!(fabric.add_virtual_chip(&s).is_err());
    }
}
