//! An in-memory stand-in for the remote execution layer.
//!
//! The virtual board accepts every operation the real transport does and
//! records what it was asked to do, so a mapping can be loaded, run, and
//! stopped without hardware. Faults can be injected per operation to
//! exercise the orchestrator's failure paths.

use crate::executor::{LoadJob, ProvenanceItem, RemoteExecutor};
use crate::targets::CoreSubsets;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use tessera_common::{ChipCoord, Location, RemoteError, SliceId};
use tessera_map::{RoutingTable, TagAllocations};

/// A failure the virtual board reports for an operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// The operation times out after `duration_ms`.
    Timeout {
        /// Reported wait.
        duration_ms: u64,
    },
    /// The operation is refused.
    Rejected(String),
}

impl Fault {
    fn into_error(self, operation: &str) -> RemoteError {
        match self {
            Fault::Timeout { duration_ms } => RemoteError::Timeout {
                operation: operation.to_string(),
                duration_ms,
            },
            Fault::Rejected(reason) => RemoteError::rejected(reason),
        }
    }
}

#[derive(Clone, Debug)]
struct LoadedCore {
    slice: SliceId,
    image: String,
    state_bytes: usize,
}

#[derive(Debug, Default)]
struct BoardState {
    cores: BTreeMap<Location, LoadedCore>,
    executables: BTreeMap<String, CoreSubsets>,
    tables: BTreeMap<ChipCoord, RoutingTable>,
    tags: TagAllocations,
    running: Option<(u32, Option<u64>)>,
    steps_completed: u64,
    cleared: Vec<ChipCoord>,
    calls: Vec<String>,
    faults: BTreeMap<String, Fault>,
    failing_cores: BTreeSet<Location>,
}

impl BoardState {
    fn enter(&mut self, operation: &str) -> Result<(), RemoteError> {
        self.calls.push(operation.to_string());
        match self.faults.get(operation) {
            Some(fault) => Err(fault.clone().into_error(operation)),
            None => Ok(()),
        }
    }
}

/// The in-memory executor used when `machine.virtual_board` is set.
#[derive(Debug, Default)]
pub struct VirtualBoardExecutor {
    state: Mutex<BoardState>,
}

impl VirtualBoardExecutor {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes every future call of `operation` fail with `fault`.
    pub fn inject_fault(&self, operation: &str, fault: Fault) {
        self.lock().faults.insert(operation.to_string(), fault);
    }

    /// Makes loading the slice placed at `location` fail.
    pub fn fail_load_at(&self, location: Location) {
        self.lock().failing_cores.insert(location);
    }

    /// Removes every injected fault.
    pub fn clear_faults(&self) {
        let mut state = self.lock();
        state.faults.clear();
        state.failing_cores.clear();
    }

    /// Operation names in call order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Chips whose routing tables were cleared, in call order.
    pub fn cleared_chips(&self) -> Vec<ChipCoord> {
        self.lock().cleared.clone()
    }

    /// Returns `true` between a successful start and stop.
    pub fn is_running(&self) -> bool {
        self.lock().running.is_some()
    }

    /// Number of cores holding loaded data.
    pub fn loaded_cores(&self) -> usize {
        self.lock().cores.len()
    }

    /// The slice loaded at `location`.
    pub fn slice_at(&self, location: Location) -> Option<SliceId> {
        self.lock().cores.get(&location).map(|c| c.slice)
    }

    /// The routing table currently held by `chip`.
    pub fn routing_table(&self, chip: ChipCoord) -> Option<RoutingTable> {
        self.lock().tables.get(&chip).cloned()
    }

    /// The tags most recently programmed.
    pub fn tags(&self) -> TagAllocations {
        self.lock().tags.clone()
    }
}

impl RemoteExecutor for VirtualBoardExecutor {
    fn name(&self) -> &str {
        "virtual-board"
    }

    fn generate_and_load(&self, job: &LoadJob) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.enter("generate_and_load")?;
        if state.failing_cores.contains(&job.location) {
            return Err(RemoteError::rejected(format!(
                "core {} refused its data",
                job.location
            )));
        }
        if state.cores.contains_key(&job.location) {
            return Err(RemoteError::rejected(format!(
                "core {} is already loaded",
                job.location
            )));
        }
        state.cores.insert(
            job.location,
            LoadedCore {
                slice: job.slice,
                image: job.image.clone(),
                state_bytes: job.state.len(),
            },
        );
        Ok(())
    }

    fn load_routing_table(&self, chip: ChipCoord, table: &RoutingTable) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.enter("load_routing_table")?;
        state.tables.insert(chip, table.clone());
        Ok(())
    }

    fn load_executable(&self, image: &str, cores: &CoreSubsets) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.enter("load_executable")?;
        if let Some(missing) = cores.locations().find(|l| !state.cores.contains_key(l)) {
            return Err(RemoteError::rejected(format!(
                "core {missing} has no data for {image}"
            )));
        }
        state.executables.insert(image.to_string(), cores.clone());
        Ok(())
    }

    fn load_tags(&self, tags: &TagAllocations) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.enter("load_tags")?;
        state.tags = tags.clone();
        Ok(())
    }

    fn start_execution(&self, app_id: u32, time_steps: Option<u64>) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.enter("start_execution")?;
        if state.executables.is_empty() {
            return Err(RemoteError::rejected("no executables are loaded"));
        }
        state.running = Some((app_id, time_steps));
        // a bounded run completes before the call returns
        state.steps_completed = time_steps.unwrap_or(0);
        Ok(())
    }

    fn stop(&self, app_id: u32) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.enter("stop")?;
        let running = state.running;
        match running {
            Some((running, _)) if running != app_id => Err(RemoteError::rejected(format!(
                "application {app_id} is not running ({running} is)"
            ))),
            _ => {
                // halting frees the application's cores
                state.running = None;
                state.cores.clear();
                state.executables.clear();
                Ok(())
            }
        }
    }

    fn retrieve_provenance(
        &self,
        image: &str,
        cores: &CoreSubsets,
    ) -> Result<Vec<ProvenanceItem>, RemoteError> {
        let mut state = self.lock();
        state.enter("retrieve_provenance")?;
        let mut items = Vec::new();
        for location in cores.locations() {
            let core = state
                .cores
                .get(&location)
                .filter(|c| c.image == image)
                .ok_or_else(|| {
                    RemoteError::rejected(format!("core {location} is not running {image}"))
                })?;
            for (name, value) in [
                ("state_bytes", core.state_bytes as u64),
                ("time_steps", state.steps_completed),
            ] {
                items.push(ProvenanceItem {
                    location,
                    image: image.to_string(),
                    name: name.to_string(),
                    value,
                });
            }
        }
        Ok(items)
    }

    fn clear_routing_table(&self, chip: ChipCoord) -> Result<(), RemoteError> {
        let mut state = self.lock();
        state.enter("clear_routing_table")?;
        state.tables.remove(&chip);
        state.cleared.push(chip);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(location: Location) -> LoadJob {
        LoadJob {
            slice: SliceId::from_raw(0),
            location,
            image: "a.aplx".into(),
            state: vec![0; 12],
        }
    }

    #[test]
    fn load_run_provenance_stop() {
        let board = VirtualBoardExecutor::new();
        let here = Location::new(0, 0, 1);
        board.generate_and_load(&job(here)).unwrap();
        let mut cores = CoreSubsets::new();
        cores.add(here);
        board.load_executable("a.aplx", &cores).unwrap();
        board.start_execution(30, Some(100)).unwrap();
        assert!(board.is_running());

        let items = board.retrieve_provenance("a.aplx", &cores).unwrap();
        let steps = items.iter().find(|i| i.name == "time_steps").unwrap();
        assert_eq!(steps.value, 100);
        let bytes = items.iter().find(|i| i.name == "state_bytes").unwrap();
        assert_eq!(bytes.value, 12);

        assert!(board.stop(31).is_err());
        board.stop(30).unwrap();
        assert!(!board.is_running());
        assert_eq!(
            board.calls(),
            [
                "generate_and_load",
                "load_executable",
                "start_execution",
                "retrieve_provenance",
                "stop",
                "stop"
            ]
        );
    }

    #[test]
    fn injected_faults() {
        let board = VirtualBoardExecutor::new();
        board.inject_fault("load_tags", Fault::Timeout { duration_ms: 250 });
        let err = board.load_tags(&TagAllocations::default()).unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("250ms"));

        let here = Location::new(1, 0, 2);
        board.fail_load_at(here);
        assert!(board.generate_and_load(&job(here)).is_err());
        board.clear_faults();
        board.generate_and_load(&job(here)).unwrap();
        assert_eq!(board.slice_at(here), Some(SliceId::from_raw(0)));
        assert!(board.generate_and_load(&job(here)).is_err());
    }

    #[test]
    fn routing_tables_load_and_clear() {
        use std::collections::BTreeSet;
        use tessera_common::Direction;
        use tessera_map::MulticastEntry;

        let board = VirtualBoardExecutor::new();
        let relay = ChipCoord::new(1, 1);
        let mut table = RoutingTable::default();
        table.entries.push(MulticastEntry {
            key: 7,
            mask: u32::MAX,
            links: BTreeSet::from([Direction::NorthEast]),
            cores: BTreeSet::new(),
        });
        board.load_routing_table(relay, &table).unwrap();
        assert_eq!(board.routing_table(relay), Some(table));

        board.clear_routing_table(relay).unwrap();
        assert!(board.routing_table(relay).is_none());
        assert_eq!(board.cleared_chips(), [relay]);
        assert_eq!(board.calls(), ["load_routing_table", "clear_routing_table"]);
    }

    #[test]
    fn nothing_to_start() {
        let board = VirtualBoardExecutor::new();
        assert!(board.start_execution(30, None).is_err());
        let mut cores = CoreSubsets::new();
        cores.add(Location::new(0, 0, 1));
        assert!(board.load_executable("a.aplx", &cores).is_err());
    }
}
