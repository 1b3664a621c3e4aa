//! The execution orchestrator.
//!
//! A [`Simulator`] owns three narrow pieces of state: [`FabricSettings`]
//! (what machine to build), [`ReportSettings`] (what to instrument and
//! read back), and [`ExecutionState`] (what is loaded and running). A run
//! validates the timing request, maps the graph, generates and loads data,
//! starts the application, and optionally reads back provenance. Stopping
//! clears the routing tables of every real chip that holds entries, then
//! halts.

use crate::datagen::generate_and_load;
use crate::executor::{ProvenanceItem, RemoteExecutor};
use crate::targets::ExecutableTargets;
use crate::timing::{time_steps, RunLength};
use std::time::Instant;
use tessera_common::{ContentHash, MapError, MapResult};
use tessera_config::{MachineConfig, ReportConfig, TesseraConfig};
use tessera_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, Severity};
use tessera_fabric::Fabric;
use tessera_graph::ApplicationGraph;
use tessera_map::{Mapper, Mapping, StageTimings};

/// The machine description a run builds its fabric from.
#[derive(Clone, Debug)]
pub struct FabricSettings {
    machine: MachineConfig,
}

impl FabricSettings {
    /// Wraps a machine description.
    pub fn new(machine: MachineConfig) -> Self {
        Self { machine }
    }

    /// Builds a fresh fabric.
    pub fn build(&self) -> MapResult<Fabric> {
        Fabric::from_config(&self.machine)
    }

    /// Length of one time step in microseconds.
    pub fn time_step_us(&self) -> u64 {
        self.machine.time_step_us
    }

    /// Application id used to start and stop the run.
    pub fn app_id(&self) -> u32 {
        self.machine.app_id
    }
}

/// Instrumentation and read-back switches.
#[derive(Clone, Debug)]
pub struct ReportSettings {
    reports: ReportConfig,
}

impl ReportSettings {
    /// Wraps report switches.
    pub fn new(reports: ReportConfig) -> Self {
        Self { reports }
    }

    /// Whether stage notes reach the caller's sink.
    pub fn notes(&self) -> bool {
        self.reports.enabled
    }

    /// Whether stage wall times are recorded.
    pub fn timings(&self) -> bool {
        self.reports.timings
    }

    /// Whether provenance is read back after a run.
    pub fn provenance(&self) -> bool {
        self.reports.provenance
    }
}

/// Where a simulator is in its load/run lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// Nothing loaded.
    #[default]
    Idle,
    /// Mapped but not loaded.
    Mapped,
    /// Loaded but not started.
    Loaded,
    /// Started.
    Running,
    /// Stopped after loading.
    Stopped,
}

/// What is currently mapped, loaded, and running.
#[derive(Debug, Default)]
pub struct ExecutionState {
    phase: Phase,
    fabric: Fabric,
    mapping: Option<Mapping>,
    targets: ExecutableTargets,
    time_steps: Option<u64>,
}

impl ExecutionState {
    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The fabric of the latest run, including any virtual chips it gained.
    pub fn fabric(&self) -> &Fabric {
        &self.fabric
    }

    /// The mapping of the latest run.
    pub fn mapping(&self) -> Option<&Mapping> {
        self.mapping.as_ref()
    }

    /// Executable groups of the latest run.
    pub fn targets(&self) -> &ExecutableTargets {
        &self.targets
    }

    /// Steps requested by the latest run, `None` when unbounded.
    pub fn time_steps(&self) -> Option<u64> {
        self.time_steps
    }

    fn holds_tables(&self) -> bool {
        matches!(self.phase, Phase::Loaded | Phase::Running)
    }
}

/// Outcome of one [`Simulator::run`].
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    /// Fingerprint of the mapping.
    pub fingerprint: ContentHash,
    /// Steps requested, `None` when unbounded.
    pub time_steps: Option<u64>,
    /// Number of slices placed.
    pub slices: usize,
    /// Number of chips holding slices.
    pub chips_used: usize,
    /// Routing entries across all chips.
    pub routing_entries: usize,
    /// Number of distinct executable images.
    pub images: usize,
    /// Provenance read back, when requested.
    pub provenance: Vec<ProvenanceItem>,
    /// Mapping stage timings, when requested.
    pub mapping_timings: Option<StageTimings>,
    /// Generate, load, run, and read-back timings, when requested.
    pub execution_timings: Option<StageTimings>,
}

/// Drives mapping and execution against a [`RemoteExecutor`].
#[derive(Debug)]
pub struct Simulator<E: RemoteExecutor> {
    config: TesseraConfig,
    fabric: FabricSettings,
    reports: ReportSettings,
    state: ExecutionState,
    executor: E,
}

impl<E: RemoteExecutor> Simulator<E> {
    /// Creates an idle simulator.
    pub fn new(config: TesseraConfig, executor: E) -> Self {
        Self {
            fabric: FabricSettings::new(config.machine.clone()),
            reports: ReportSettings::new(config.reports.clone()),
            state: ExecutionState::default(),
            config,
            executor,
        }
    }

    /// The remote executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Load/run state.
    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    /// Fabric settings.
    pub fn fabric_settings(&self) -> &FabricSettings {
        &self.fabric
    }

    /// Report settings.
    pub fn report_settings(&self) -> &ReportSettings {
        &self.reports
    }

    /// Maps `graph`, loads it, and runs it for `length`.
    ///
    /// The timing request is validated before any mapping stage runs. A
    /// previous run that is still loaded is stopped first.
    pub fn run(
        &mut self,
        graph: &ApplicationGraph,
        length: RunLength,
        sink: &DiagnosticSink,
    ) -> MapResult<RunSummary> {
        let steps = time_steps(length, self.fabric.time_step_us())?;
        if length.is_unbounded() {
            if let Some(unit) = graph.units().iter().find(|u| u.record_spikes) {
                return Err(MapError::timing(format!(
                    "unit '{}' records spikes, which needs a bounded run length",
                    unit.label
                )));
            }
            sink.emit(
                Diagnostic::warning(DiagnosticCode::UNBOUNDED_RUN, "run length is unbounded")
                    .with_help("call stop to halt the application and clear its routing tables"),
            );
        }

        if self.state.holds_tables() {
            self.stop()?;
        }
        self.state = ExecutionState::default();

        let mut fabric = self.fabric.build()?;
        let stage_sink = DiagnosticSink::new();
        let mapped = Mapper::new(&self.config).map(graph, &mut fabric, &stage_sink);
        for diag in stage_sink.take_all() {
            if self.reports.notes() || diag.severity >= Severity::Warning {
                sink.emit(diag);
            }
        }
        let mapping = mapped?;
        tracing::info!(fingerprint = %mapping.fingerprint(), "mapped");

        let targets = ExecutableTargets::from_mapping(graph, &mapping, &fabric)?;
        self.state = ExecutionState {
            phase: Phase::Mapped,
            fabric,
            mapping: Some(mapping),
            targets,
            time_steps: steps,
        };

        let mut timings = StageTimings::default();
        let mut provenance = Vec::new();
        if self.config.execution.load {
            self.load(graph, &mut timings)?;
            if self.config.execution.run {
                self.start(steps, &mut timings)?;
                if self.reports.provenance() {
                    provenance = self.retrieve_provenance(&mut timings)?;
                }
            }
        } else if self.config.execution.run {
            tracing::warn!("execution.run is set without execution.load; nothing to start");
        }

        let Some(mapping) = self.state.mapping.as_ref() else {
            return Err(MapError::InvalidGraph {
                reason: "mapping lost during execution".into(),
            });
        };
        let record = self.reports.timings();
        if record {
            for (stage, elapsed) in &timings.stages {
                tracing::info!(stage = *stage, elapsed_us = elapsed.as_micros() as u64, "stage timing");
            }
        }
        Ok(RunSummary {
            fingerprint: mapping.fingerprint(),
            time_steps: steps,
            slices: mapping.placements.len(),
            chips_used: mapping.placements.chips().len(),
            routing_entries: mapping.routing_tables.total_entries(),
            images: self.state.targets.len(),
            provenance,
            mapping_timings: mapping.timings.clone(),
            execution_timings: record.then_some(timings),
        })
    }

    fn load(&mut self, graph: &ApplicationGraph, timings: &mut StageTimings) -> MapResult<()> {
        let Some(mapping) = self.state.mapping.as_ref() else {
            return Ok(());
        };
        // tables may be live on the fabric from here on, even if loading fails
        self.state.phase = Phase::Loaded;
        let start = Instant::now();
        let fabric = &self.state.fabric;
        let report = generate_and_load(
            graph,
            mapping,
            fabric,
            &self.executor,
            self.config.execution.workers,
        )?;
        timings.stages.push(("generate", start.elapsed()));

        let start = Instant::now();
        // relay chips hold entries without holding any slice
        let mut tables = 0;
        for (chip, table) in mapping.routing_tables.iter() {
            if table.is_empty() || fabric.is_virtual(chip) {
                continue;
            }
            self.executor
                .load_routing_table(chip, table)
                .map_err(|e| MapError::remote("load_routing_table", e))?;
            tables += 1;
        }
        for (image, cores) in self.state.targets.iter() {
            self.executor
                .load_executable(image, cores)
                .map_err(|e| MapError::remote("load_executable", e))?;
            tracing::debug!(image, cores = cores.len(), "executable loaded");
        }
        if !mapping.tags.is_empty() {
            self.executor
                .load_tags(&mapping.tags)
                .map_err(|e| MapError::remote("load_tags", e))?;
        }
        timings.stages.push(("load", start.elapsed()));
        tracing::info!(
            executor = self.executor.name(),
            jobs = report.jobs,
            tables,
            images = self.state.targets.len(),
            "loaded"
        );
        Ok(())
    }

    fn start(&mut self, steps: Option<u64>, timings: &mut StageTimings) -> MapResult<()> {
        let start = Instant::now();
        self.executor
            .start_execution(self.fabric.app_id(), steps)
            .map_err(|e| MapError::remote("start_execution", e))?;
        self.state.phase = Phase::Running;
        timings.stages.push(("run", start.elapsed()));
        tracing::info!(app_id = self.fabric.app_id(), ?steps, "running");
        Ok(())
    }

    fn retrieve_provenance(&self, timings: &mut StageTimings) -> MapResult<Vec<ProvenanceItem>> {
        let start = Instant::now();
        let mut items = Vec::new();
        for (image, cores) in self.state.targets.iter() {
            let group = self
                .executor
                .retrieve_provenance(image, cores)
                .map_err(|e| MapError::remote("retrieve_provenance", e))?;
            items.extend(group);
        }
        timings.stages.push(("provenance", start.elapsed()));
        Ok(items)
    }

    /// Clears the routing table of every real chip holding entries, then
    /// halts the application. Does nothing unless something is loaded.
    pub fn stop(&mut self) -> MapResult<()> {
        if !self.state.holds_tables() {
            tracing::debug!(phase = ?self.state.phase, "stop with nothing loaded");
            return Ok(());
        }
        if let Some(mapping) = &self.state.mapping {
            let fabric = &self.state.fabric;
            for chip in mapping
                .routing_tables
                .chips_with_entries()
                .filter(|&chip| !fabric.is_virtual(chip))
            {
                self.executor
                    .clear_routing_table(chip)
                    .map_err(|e| MapError::remote("clear_routing_table", e))?;
            }
        }
        self.executor
            .stop(self.fabric.app_id())
            .map_err(|e| MapError::remote("stop", e))?;
        self.state.phase = Phase::Stopped;
        tracing::info!(app_id = self.fabric.app_id(), "stopped");
        Ok(())
    }
}
