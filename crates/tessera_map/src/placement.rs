//! Assigning every slice to a (chip, core).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tessera_common::{ChipCoord, Location, MapError, MapResult, Resource, SliceId};
use tessera_config::PlacerKind;
use tessera_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use tessera_fabric::{Chip, Fabric};
use tessera_graph::{ApplicationGraph, PartitionedGraph, Slice, Unit};

/// The chosen location of every slice.
///
/// No two slices share a location.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placements {
    by_slice: BTreeMap<SliceId, Location>,
}

impl Placements {
    /// Builds placements from explicit `(slice, location)` pairs.
    ///
    /// Used when a placement is read back or constructed by hand; no
    /// uniqueness check is made here.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (SliceId, Location)>) -> Self {
        Self {
            by_slice: pairs.into_iter().collect(),
        }
    }

    /// Returns where `slice` was placed.
    pub fn get(&self, slice: SliceId) -> Option<Location> {
        self.by_slice.get(&slice).copied()
    }

    /// Iterates over `(slice, location)` in slice order.
    pub fn iter(&self) -> impl Iterator<Item = (SliceId, Location)> + '_ {
        self.by_slice.iter().map(|(&s, &l)| (s, l))
    }

    /// Number of placed slices.
    pub fn len(&self) -> usize {
        self.by_slice.len()
    }

    /// Returns `true` if nothing was placed.
    pub fn is_empty(&self) -> bool {
        self.by_slice.is_empty()
    }

    /// Chips holding at least one slice, in coordinate order.
    pub fn chips(&self) -> BTreeSet<ChipCoord> {
        self.by_slice.values().map(|l| l.chip).collect()
    }
}

/// Free cores and shared memory left on one chip during placement.
#[derive(Debug)]
struct ChipState {
    free_cores: BTreeSet<u32>,
    shared_left: u64,
}

struct Occupancy {
    chips: BTreeMap<ChipCoord, ChipState>,
}

impl Occupancy {
    fn new(fabric: &Fabric) -> Self {
        let chips = fabric
            .chips()
            .map(|chip| {
                let state = ChipState {
                    free_cores: chip.application_cores().map(|c| c.id).collect(),
                    shared_left: chip.shared_memory,
                };
                (chip.coord, state)
            })
            .collect();
        Self { chips }
    }

    /// First free core on `chip` that can take `slice`.
    fn find_core(&self, chip: &Chip, slice: &Slice) -> Option<u32> {
        let state = self.chips.get(&chip.coord)?;
        if slice.cost.shared_memory > state.shared_left {
            return None;
        }
        state.free_cores.iter().copied().find(|&id| {
            chip.core(id).is_some_and(|core| {
                slice.cost.cpu_cycles <= core.cpu_cycles
                    && slice.cost.local_memory <= core.local_memory
            })
        })
    }

    fn take(&mut self, location: Location, slice: &Slice) {
        if let Some(state) = self.chips.get_mut(&location.chip) {
            state.free_cores.remove(&location.core);
            state.shared_left -= slice.cost.shared_memory.min(state.shared_left);
        }
    }
}

fn slice_subject(unit: &Unit, slice: &Slice) -> String {
    format!("slice {} {} of unit '{}'", slice.index, slice.atoms, unit.label)
}

/// Places every slice of `partitioned` onto `fabric`.
///
/// Virtual chips requested by units are synthesized first. Slices of units
/// pinned to a location are placed next, exactly where asked. The rest are
/// placed in slice order: with [`PlacerKind::Locality`] the chips already
/// holding connected slices are tried first (most connections first), then
/// every chip is scanned in coordinate order. Units confined to a virtual
/// chip are only placed there, and no other unit is placed on a virtual chip.
pub fn place(
    graph: &ApplicationGraph,
    partitioned: &PartitionedGraph,
    fabric: &mut Fabric,
    placer: PlacerKind,
    sink: &DiagnosticSink,
) -> MapResult<Placements> {
    for unit in graph.units() {
        if let Some(spec) = &unit.virtual_chip {
            let existed = fabric.contains(spec.coord);
            fabric.add_virtual_chip(spec)?;
            if !existed {
                sink.emit(
                    Diagnostic::note(
                        DiagnosticCode::VIRTUAL_CHIP_ADDED,
                        format!("virtual chip attached to chip {}", spec.connected_to),
                    )
                    .with_subject(format!("chip {}", spec.coord)),
                );
            }
        }
    }
    let fabric: &Fabric = fabric;

    let mut occupancy = Occupancy::new(fabric);
    let mut placements = Placements::default();

    for unit in graph.units().iter().filter(|u| u.fixed_location.is_some()) {
        place_fixed(unit, partitioned, fabric, &mut occupancy, &mut placements)?;
    }

    let adjacency = match placer {
        PlacerKind::Locality => partitioned.adjacency(),
        PlacerKind::Linear => BTreeMap::new(),
    };
    let real_chips: Vec<&Chip> = fabric.real_chips().collect();

    for slice in partitioned.slices() {
        if placements.get(slice.id).is_some() {
            continue;
        }
        let unit = graph.unit(slice.unit).ok_or_else(|| MapError::InvalidGraph {
            reason: format!("slice {} belongs to unknown unit {}", slice.id, slice.unit),
        })?;

        let candidates: Vec<&Chip> = match &unit.virtual_chip {
            Some(spec) => fabric.chip(spec.coord).into_iter().collect(),
            None => {
                let preferred = preferred_chips(slice.id, &adjacency, &placements);
                preferred
                    .iter()
                    .filter_map(|&c| fabric.chip(c).filter(|chip| !chip.is_virtual))
                    .chain(real_chips.iter().copied())
                    .collect()
            }
        };

        let found = candidates
            .iter()
            .find_map(|chip| occupancy.find_core(chip, slice).map(|core| (chip.coord, core)));
        let Some((chip, core)) = found else {
            return Err(shortfall(unit, slice, &candidates, &occupancy, partitioned, &placements));
        };
        let location = Location { chip, core };
        occupancy.take(location, slice);
        placements.by_slice.insert(slice.id, location);
        tracing::debug!(slice = %slice.id, unit = %unit.label, %location, "placed slice");
    }

    tracing::info!(
        slices = placements.len(),
        chips = placements.chips().len(),
        "placement complete"
    );
    Ok(placements)
}

fn place_fixed(
    unit: &Unit,
    partitioned: &PartitionedGraph,
    fabric: &Fabric,
    occupancy: &mut Occupancy,
    placements: &mut Placements,
) -> MapResult<()> {
    let Some(location) = unit.fixed_location else {
        return Ok(());
    };
    let invalid = |reason: String| MapError::InvalidConstraint {
        subject: format!("unit '{}'", unit.label),
        reason,
    };
    let slices = partitioned.slices_of(unit.id);
    let [slice_id] = slices else {
        return Err(invalid(format!(
            "pinned to {location} but partitioned into {} slices",
            slices.len()
        )));
    };
    if let Some(spec) = &unit.virtual_chip {
        if spec.coord != location.chip {
            return Err(invalid(format!(
                "pinned to {location} but confined to virtual chip {}",
                spec.coord
            )));
        }
    }
    let slice = partitioned
        .slice(*slice_id)
        .ok_or_else(|| invalid(format!("slice {slice_id} is missing")))?;
    let chip = fabric
        .chip(location.chip)
        .ok_or_else(|| invalid(format!("chip {} does not exist", location.chip)))?;
    let core = chip
        .core(location.core)
        .ok_or_else(|| invalid(format!("core {location} does not exist")))?;
    if core.is_monitor {
        return Err(invalid(format!("core {location} is the monitor core")));
    }
    let state = occupancy
        .chips
        .get(&location.chip)
        .ok_or_else(|| invalid(format!("chip {} does not exist", location.chip)))?;
    if !state.free_cores.contains(&location.core) {
        return Err(invalid(format!("core {location} is already occupied")));
    }
    let mut available = chip.core_budget(core);
    available.shared_memory = state.shared_left;
    if let Some(excess) = slice.cost.first_excess(&available) {
        return Err(MapError::ResourceExceeded {
            subject: format!("{} at {location}", slice_subject(unit, slice)),
            resource: excess.resource,
            requested: excess.requested,
            available: excess.available,
        });
    }
    occupancy.take(location, slice);
    placements.by_slice.insert(slice.id, location);
    tracing::debug!(slice = %slice.id, unit = %unit.label, %location, "placed pinned slice");
    Ok(())
}

/// Chips of already-placed neighbours of `slice`, most shared connections first.
fn preferred_chips(
    slice: SliceId,
    adjacency: &BTreeMap<SliceId, BTreeSet<SliceId>>,
    placements: &Placements,
) -> Vec<ChipCoord> {
    let Some(neighbours) = adjacency.get(&slice) else {
        return Vec::new();
    };
    let mut counts: BTreeMap<ChipCoord, usize> = BTreeMap::new();
    for location in neighbours.iter().filter_map(|&n| placements.get(n)) {
        *counts.entry(location.chip).or_default() += 1;
    }
    let mut ranked: Vec<(ChipCoord, usize)> = counts.into_iter().collect();
    // stable sort keeps coordinate order among equal counts
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.into_iter().map(|(c, _)| c).collect()
}

/// Builds the error for a slice that fits nowhere, with aggregate totals
/// over the candidate chips.
fn shortfall(
    unit: &Unit,
    slice: &Slice,
    candidates: &[&Chip],
    occupancy: &Occupancy,
    partitioned: &PartitionedGraph,
    placements: &Placements,
) -> MapError {
    let subject = slice_subject(unit, slice);
    let states: Vec<(&Chip, &ChipState)> = candidates
        .iter()
        .filter_map(|chip| occupancy.chips.get(&chip.coord).map(|s| (*chip, s)))
        .collect();
    let free_cores: usize = states.iter().map(|(_, s)| s.free_cores.len()).sum();
    if free_cores == 0 {
        let unplaced = partitioned
            .slices()
            .iter()
            .filter(|s| placements.get(s.id).is_none())
            .count();
        return MapError::ResourceExceeded {
            subject,
            resource: Resource::Cores,
            requested: unplaced as u64,
            available: 0,
        };
    }
    let best_shared = states
        .iter()
        .filter(|(_, s)| !s.free_cores.is_empty())
        .map(|(_, s)| s.shared_left)
        .max()
        .unwrap_or(0);
    if slice.cost.shared_memory > best_shared {
        return MapError::ResourceExceeded {
            subject,
            resource: Resource::SharedMemory,
            requested: slice.cost.shared_memory,
            available: best_shared,
        };
    }
    let (best_cycles, best_local) = states
        .iter()
        .flat_map(|(chip, s)| s.free_cores.iter().filter_map(|&id| chip.core(id)))
        .fold((0, 0), |(c, l), core| (c.max(core.cpu_cycles), l.max(core.local_memory)));
    let (resource, available) = if slice.cost.cpu_cycles > best_cycles {
        (Resource::CpuCycles, best_cycles)
    } else {
        (Resource::LocalMemory, best_local)
    };
    let requested = match resource {
        Resource::CpuCycles => slice.cost.cpu_cycles,
        _ => slice.cost.local_memory,
    };
    MapError::ResourceExceeded {
        subject,
        resource,
        requested,
        available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition;
    use std::sync::Arc;
    use tessera_common::{Direction, ResourceCost};
    use tessera_fabric::{ChipTemplate, VirtualChipSpec};
    use tessera_graph::{AllToAll, LinearModel};

    fn template(cores: u32) -> ChipTemplate {
        ChipTemplate {
            cores,
            cpu_cycles: 1000,
            local_memory: 1000,
            shared_memory: 10_000,
            table_capacity: 64,
        }
    }

    fn model() -> Arc<LinearModel> {
        Arc::new(LinearModel::new(
            "img",
            ResourceCost::new(0, 0, 100),
            ResourceCost::new(10, 10, 0),
        ))
    }

    fn run(
        app: &ApplicationGraph,
        fabric: &mut Fabric,
        placer: PlacerKind,
    ) -> MapResult<(PartitionedGraph, Placements)> {
        let sink = DiagnosticSink::new();
        let budget = fabric.partition_budget().unwrap();
        let g = partition(app, &budget, &BTreeMap::new(), &sink)?;
        let p = place(app, &g, fabric, placer, &sink)?;
        Ok((g, p))
    }

    #[test]
    fn linear_fills_chips_in_order() {
        let mut fabric = Fabric::grid(2, 2, &template(3), false);
        let mut app = ApplicationGraph::new();
        // 250 atoms at 100 per core: 3 slices
        app.add_unit(Unit::new("pop", 250, model())).unwrap();
        let (g, p) = run(&app, &mut fabric, PlacerKind::Linear).unwrap();
        let locs: Vec<Location> = g.slices().iter().map(|s| p.get(s.id).unwrap()).collect();
        assert_eq!(
            locs,
            vec![Location::new(0, 0, 1), Location::new(0, 0, 2), Location::new(0, 1, 1)]
        );
    }

    #[test]
    fn locality_prefers_connected_chip() {
        let mut fabric = Fabric::grid(2, 1, &template(4), false);
        let mut app = ApplicationGraph::new();
        let a = app
            .add_unit(Unit::new("a", 10, model()).with_fixed_location(Location::new(1, 0, 2)))
            .unwrap();
        let b = app.add_unit(Unit::new("b", 10, model())).unwrap();
        app.add_connection("a->b", a, b, Arc::new(AllToAll)).unwrap();
        let (g, p) = run(&app, &mut fabric, PlacerKind::Locality).unwrap();
        assert_eq!(p.get(g.slices_of(a)[0]), Some(Location::new(1, 0, 2)));
        assert_eq!(p.get(g.slices_of(b)[0]), Some(Location::new(1, 0, 1)));

        let mut fabric = Fabric::grid(2, 1, &template(4), false);
        let (g, p) = run(&app, &mut fabric, PlacerKind::Linear).unwrap();
        assert_eq!(p.get(g.slices_of(b)[0]), Some(Location::new(0, 0, 1)));
    }

    #[test]
    fn placements_are_injective_and_skip_monitor() {
        let mut fabric = Fabric::grid(2, 2, &template(5), false);
        let mut app = ApplicationGraph::new();
        for i in 0..4 {
            app.add_unit(Unit::new(format!("u{i}"), 300, model())).unwrap();
        }
        let (_, p) = run(&app, &mut fabric, PlacerKind::Locality).unwrap();
        assert_eq!(p.len(), 12);
        let distinct: BTreeSet<Location> = p.iter().map(|(_, l)| l).collect();
        assert_eq!(distinct.len(), 12);
        assert!(p.iter().all(|(_, l)| l.core != 0));
    }

    #[test]
    fn out_of_cores_reports_aggregate() {
        let mut fabric = Fabric::grid(1, 1, &template(3), false);
        let mut app = ApplicationGraph::new();
        app.add_unit(Unit::new("pop", 500, model())).unwrap();
        let err = run(&app, &mut fabric, PlacerKind::Linear).unwrap_err();
        match err {
            MapError::ResourceExceeded {
                resource,
                requested,
                available,
                ..
            } => {
                assert_eq!(resource, Resource::Cores);
                assert_eq!(requested, 3);
                assert_eq!(available, 0);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn shared_memory_exhaustion_on_virtual_chip() {
        // the virtual chip inherits the attachment chip's pool but has far more cores
        let mut t = template(10);
        t.shared_memory = 1000;
        let spec = VirtualChipSpec {
            coord: ChipCoord::new(9, 0),
            connected_to: ChipCoord::new(0, 0),
            direction: Direction::West,
        };
        let mut app = ApplicationGraph::new();
        app.add_unit(Unit::new("dev", 1500, model()).with_virtual_chip(spec))
            .unwrap();
        let mut fabric = Fabric::grid(1, 1, &t, false);
        let err = run(&app, &mut fabric, PlacerKind::Linear).unwrap_err();
        assert!(matches!(
            err,
            MapError::ResourceExceeded {
                resource: Resource::SharedMemory,
                requested: 100,
                available: 0,
                ..
            }
        ));
    }

    #[test]
    fn fixed_location_conflicts() {
        let mut app = ApplicationGraph::new();
        app.add_unit(Unit::new("a", 10, model()).with_fixed_location(Location::new(0, 0, 1)))
            .unwrap();
        app.add_unit(Unit::new("b", 10, model()).with_fixed_location(Location::new(0, 0, 1)))
            .unwrap();
        let mut fabric = Fabric::grid(1, 1, &template(4), false);
        let err = run(&app, &mut fabric, PlacerKind::Linear).unwrap_err();
        assert!(matches!(err, MapError::InvalidConstraint { ref reason, .. } if reason.contains("occupied")));

        let mut app = ApplicationGraph::new();
        app.add_unit(Unit::new("m", 10, model()).with_fixed_location(Location::new(0, 0, 0)))
            .unwrap();
        let mut fabric = Fabric::grid(1, 1, &template(4), false);
        let err = run(&app, &mut fabric, PlacerKind::Linear).unwrap_err();
        assert!(matches!(err, MapError::InvalidConstraint { ref reason, .. } if reason.contains("monitor")));
    }

    #[test]
    fn virtual_chip_units_stay_on_their_chip() {
        let spec = VirtualChipSpec {
            coord: ChipCoord::new(9, 0),
            connected_to: ChipCoord::new(0, 0),
            direction: Direction::West,
        };
        let mut app = ApplicationGraph::new();
        let dev = app
            .add_unit(Unit::new("retina", 250, model()).with_virtual_chip(spec))
            .unwrap();
        let pop = app.add_unit(Unit::new("pop", 10, model())).unwrap();
        let mut fabric = Fabric::grid(1, 1, &template(4), false);
        let (g, p) = run(&app, &mut fabric, PlacerKind::Locality).unwrap();
        assert!(fabric.chip(spec.coord).unwrap().is_virtual);
        for &s in g.slices_of(dev) {
            assert_eq!(p.get(s).unwrap().chip, spec.coord);
        }
        assert_eq!(p.get(g.slices_of(pop)[0]).unwrap().chip, ChipCoord::new(0, 0));
    }
}
