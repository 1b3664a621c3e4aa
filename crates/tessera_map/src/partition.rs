//! Splitting units into slices that fit one core.

use std::collections::BTreeMap;
use tessera_common::{MapError, MapResult, ResourceCost};
use tessera_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use tessera_graph::{ApplicationGraph, AtomRange, PartitionedGraph, Unit};

/// Partitions every unit of `graph` against the per-core `budget`.
///
/// Each unit is cut into equal slices of the largest size `k` whose cost
/// fits the budget (the last slice takes the remainder), capped by the
/// unit's own ceiling and any ceiling in `atoms_per_core` keyed by label.
/// Every connection then becomes one partitioned connection per source slice,
/// targeting every slice of the receiving unit; the edge filter prunes them.
pub fn partition(
    graph: &ApplicationGraph,
    budget: &ResourceCost,
    atoms_per_core: &BTreeMap<String, u32>,
    sink: &DiagnosticSink,
) -> MapResult<PartitionedGraph> {
    let mut partitioned = PartitionedGraph::new();

    for unit in graph.units() {
        let ceiling = [
            Some(unit.n_atoms),
            unit.max_atoms_per_core,
            atoms_per_core.get(&unit.label).copied(),
        ]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(unit.n_atoms)
        .max(1);

        let k = largest_fitting_slice(unit, ceiling, budget)?;
        let mut lo = 0;
        while lo < unit.n_atoms {
            let hi = lo.saturating_add(k).min(unit.n_atoms);
            let atoms = AtomRange::new(lo, hi);
            partitioned.add_slice(unit.id, atoms, unit.model.resource_cost(atoms.len()));
            lo = hi;
        }

        let n_slices = partitioned.slices_of(unit.id).len();
        tracing::debug!(unit = %unit.label, atoms_per_core = k, slices = n_slices, "partitioned unit");
        if n_slices > 1 {
            sink.emit(
                Diagnostic::note(
                    DiagnosticCode::UNIT_SPLIT,
                    format!("split into {n_slices} slices of up to {k} atoms"),
                )
                .with_subject(format!("unit '{}'", unit.label)),
            );
        }
    }

    for connection in graph.connections() {
        let targets = partitioned.slices_of(connection.target).to_vec();
        let sources = partitioned.slices_of(connection.source).to_vec();
        for source in sources {
            partitioned.add_connection(connection.id, source, targets.clone());
        }
    }

    Ok(partitioned)
}

/// Binary search for the largest slice size in `1..=ceiling` whose cost fits.
///
/// Relies on the cost function being non-decreasing in the slice size, so
/// only `O(log ceiling)` cost evaluations are made.
fn largest_fitting_slice(unit: &Unit, ceiling: u32, budget: &ResourceCost) -> MapResult<u32> {
    let fits = |n: u32| unit.model.resource_cost(n).fits_within(budget);

    if let Some(excess) = unit.model.resource_cost(1).first_excess(budget) {
        return Err(MapError::ResourceExceeded {
            subject: format!("a single atom of unit '{}'", unit.label),
            resource: excess.resource,
            requested: excess.requested,
            available: excess.available,
        });
    }

    let (mut lo, mut hi) = (1u32, ceiling);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    Ok(lo)
}
