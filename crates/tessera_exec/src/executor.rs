//! The seam to the remote execution layer.
//!
//! Everything that touches hardware or a transport goes through
//! [`RemoteExecutor`]. Each call is synchronous and reports success or a
//! [`RemoteError`]; the orchestrator wraps failures in
//! [`MapError::RemoteExecutionFailure`](tessera_common::MapError).

use crate::targets::CoreSubsets;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tessera_common::{ChipCoord, Location, RemoteError, SliceId};
use tessera_map::{RoutingTable, TagAllocations};

/// Generated data for one placed slice, ready to be written to its core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadJob {
    /// The slice being loaded.
    pub slice: SliceId,
    /// Where it runs.
    pub location: Location,
    /// Executable image the core will run.
    pub image: String,
    /// Serialized initial state of the slice's atoms.
    pub state: Vec<u8>,
}

/// One named provenance value read back from a core after a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceItem {
    /// The core that reported it.
    pub location: Location,
    /// Executable image running on the core.
    pub image: String,
    /// Counter name.
    pub name: String,
    /// Counter value.
    pub value: u64,
}

/// Remote load, run, stop, and read-back operations.
///
/// Implementations must tolerate [`generate_and_load`] being called from
/// several worker threads at once.
///
/// [`generate_and_load`]: RemoteExecutor::generate_and_load
pub trait RemoteExecutor: Debug + Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Writes one slice's generated data to its core.
    fn generate_and_load(&self, job: &LoadJob) -> Result<(), RemoteError>;

    /// Programs the multicast routing table of `chip`, replacing any
    /// entries it held.
    fn load_routing_table(&self, chip: ChipCoord, table: &RoutingTable) -> Result<(), RemoteError>;

    /// Loads `image` onto every core in `cores`.
    fn load_executable(&self, image: &str, cores: &CoreSubsets) -> Result<(), RemoteError>;

    /// Programs the notification and reverse tags.
    fn load_tags(&self, tags: &TagAllocations) -> Result<(), RemoteError>;

    /// Starts application `app_id` for `time_steps` steps, or until stopped
    /// when `None`.
    fn start_execution(&self, app_id: u32, time_steps: Option<u64>) -> Result<(), RemoteError>;

    /// Halts application `app_id`.
    fn stop(&self, app_id: u32) -> Result<(), RemoteError>;

    /// Reads back the provenance of the cores running `image`.
    fn retrieve_provenance(
        &self,
        image: &str,
        cores: &CoreSubsets,
    ) -> Result<Vec<ProvenanceItem>, RemoteError>;

    /// Empties the multicast routing table of `chip`.
    fn clear_routing_table(&self, chip: ChipCoord) -> Result<(), RemoteError>;
}
