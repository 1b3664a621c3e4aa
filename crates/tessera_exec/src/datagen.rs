//! Per-placement data generation and loading on a bounded worker pool.

use crate::executor::{LoadJob, RemoteExecutor};
use rayon::prelude::*;
use tessera_common::{Location, MapError, MapResult, RemoteError, SliceId};
use tessera_fabric::Fabric;
use tessera_graph::ApplicationGraph;
use tessera_map::Mapping;

/// Totals of a completed generation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// Slices generated and loaded.
    pub jobs: usize,
    /// Bytes of state written.
    pub state_bytes: usize,
}

#[derive(Debug)]
enum Failure {
    Generate(String),
    Remote(RemoteError),
}

/// Generates every placed slice's data and hands it to `executor`, using at
/// most `workers` threads.
///
/// Slices on virtual chips belong to off-mesh peripherals and are skipped.
///
/// All jobs run to completion before this returns, so loading never starts
/// on partial data. Failures are collected in placement order: when every
/// failure came from the transport the first is returned as a retryable
/// remote failure, otherwise they are reported together as
/// [`MapError::DataGenerationFailed`].
pub fn generate_and_load(
    graph: &ApplicationGraph,
    mapping: &Mapping,
    fabric: &Fabric,
    executor: &dyn RemoteExecutor,
    workers: usize,
) -> MapResult<GenerationReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("tessera-datagen-{i}"))
        .build()
        .map_err(|e| MapError::InvalidConstraint {
            subject: "data generation worker pool".into(),
            reason: e.to_string(),
        })?;

    let slots: Vec<(SliceId, Location)> = mapping
        .placements
        .iter()
        .filter(|(_, location)| !fabric.is_virtual(location.chip))
        .collect();
    let total = slots.len();
    let results: Vec<(Location, Result<usize, Failure>)> = pool.install(|| {
        slots
            .par_iter()
            .map(|&(slice, location)| (location, generate_one(graph, mapping, executor, slice, location)))
            .collect()
    });

    let mut state_bytes = 0;
    let mut failures = Vec::new();
    for (location, result) in results {
        match result {
            Ok(bytes) => state_bytes += bytes,
            Err(failure) => failures.push((location, failure)),
        }
    }

    if failures.is_empty() {
        tracing::info!(jobs = total, state_bytes, workers, "data generated and loaded");
        return Ok(GenerationReport {
            jobs: total,
            state_bytes,
        });
    }

    let count = failures.len();
    tracing::warn!(failures = count, total, "data generation failed");
    let all_remote = failures.iter().all(|(_, f)| matches!(f, Failure::Remote(_)));
    let (location, first) = failures.swap_remove(0);
    let first = match first {
        Failure::Remote(err) if all_remote => return Err(MapError::remote("generate_and_load", err)),
        Failure::Remote(err) => err.to_string(),
        Failure::Generate(msg) => msg,
    };
    Err(MapError::DataGenerationFailed {
        failures: count,
        total,
        first: format!("core {location}: {first}"),
    })
}

fn generate_one(
    graph: &ApplicationGraph,
    mapping: &Mapping,
    executor: &dyn RemoteExecutor,
    slice_id: SliceId,
    location: Location,
) -> Result<usize, Failure> {
    let slice = mapping
        .partitioned
        .slice(slice_id)
        .ok_or_else(|| Failure::Generate(format!("slice {slice_id} is missing")))?;
    let unit = graph
        .unit(slice.unit)
        .ok_or_else(|| Failure::Generate(format!("unit {} is missing", slice.unit)))?;
    let state = unit
        .model
        .serialize_state(slice.atoms)
        .map_err(|e| Failure::Generate(e.to_string()))?;
    let job = LoadJob {
        slice: slice_id,
        location,
        image: unit.model.executable_image().to_string(),
        state,
    };
    tracing::debug!(slice = %slice_id, %location, bytes = job.state.len(), "generated");
    executor.generate_and_load(&job).map_err(Failure::Remote)?;
    Ok(job.state.len())
}
