//! Error types shared by every stage of the mapping and execution pipeline.

use crate::coord::{ChipCoord, Direction};
use crate::resource::{Resource, TagKind};

/// The standard result type for fallible pipeline operations.
pub type MapResult<T> = Result<T, MapError>;

/// A fatal failure of one pipeline stage.
///
/// Compilation-stage errors are deterministic: recompiling the same graph
/// against the same fabric and configuration reproduces them. Only
/// [`MapError::RemoteExecutionFailure`] is worth retrying without changing
/// the inputs (see [`MapError::is_retryable`]).
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// A unit, slice, or constrained placement does not fit its core or chip.
    #[error("{subject} needs {requested} {resource} but only {available} are available")]
    ResourceExceeded {
        /// The offending unit, slice, or location.
        subject: String,
        /// The resource that ran out.
        resource: Resource,
        /// The amount requested.
        requested: u64,
        /// The amount available.
        available: u64,
    },

    /// The routing key counter ran past the configured key-space width.
    #[error(
        "routing key space of {width_bits} bits exhausted: {requested} keys needed, {capacity} available"
    )]
    KeySpaceExhausted {
        /// Configured key width in bits.
        width_bits: u8,
        /// Keys needed so far.
        requested: u64,
        /// Keys the space can hold.
        capacity: u64,
    },

    /// A chip needs more multicast entries than its router can hold.
    #[error(
        "routing table on chip {chip} needs {entries} entries but holds {capacity} ({overflow} too many)"
    )]
    TableCapacityExceeded {
        /// The overflowing chip.
        chip: ChipCoord,
        /// Entries required.
        entries: usize,
        /// Router capacity.
        capacity: usize,
        /// `entries - capacity`.
        overflow: usize,
    },

    /// No path exists between a connection's source and a destination chip.
    #[error("no route for key {key:#010x} from chip {from} to chip {to}")]
    RouteUnreachable {
        /// Routing key of the connection.
        key: u32,
        /// Chip holding the source slice.
        from: ChipCoord,
        /// Chip that could not be reached.
        to: ChipCoord,
    },

    /// A packet under `key` would revisit a chip.
    #[error("routing cycle for key {key:#010x} through chips {}", join_chips(.chips))]
    RoutingCycleDetected {
        /// Routing key whose entries form the cycle.
        key: u32,
        /// Chips on the cycle, in traversal order.
        chips: Vec<ChipCoord>,
    },

    /// The run length and time step cannot be honoured.
    #[error("invalid timing configuration: {reason}")]
    InvalidTimingConfiguration {
        /// What is wrong with the combination.
        reason: String,
    },

    /// An explicitly requested tag is already allocated.
    #[error("{pool} tag {tag} requested by {subject} is already allocated")]
    TagConflict {
        /// Which pool the tag comes from.
        pool: TagKind,
        /// The conflicting tag value.
        tag: u32,
        /// The unit making the request.
        subject: String,
    },

    /// A tag pool has no values left.
    #[error("{pool} tag pool exhausted: tags are limited to {max}")]
    TagPoolExhausted {
        /// Which pool ran out.
        pool: TagKind,
        /// Largest tag value the pool may hand out.
        max: u32,
    },

    /// A unit needing a reverse tag was split over several cores.
    #[error(
        "unit '{unit}' requests a reverse tag but was partitioned into {slices} slices; \
         adjust its atoms-per-core so it maps to a single core"
    )]
    MultiCoreReverseTagUnsupported {
        /// Label of the unit.
        unit: String,
        /// Number of slices it was split into.
        slices: usize,
    },

    /// Two entries in one routing table match overlapping key ranges.
    #[error("routing keys {first:#010x} and {second:#010x} collide under their masks on chip {chip}")]
    KeyCollision {
        /// The chip holding both entries.
        chip: ChipCoord,
        /// Key of the first entry.
        first: u32,
        /// Key of the second entry.
        second: u32,
    },

    /// A routing entry forwards through a link the chip does not have.
    #[error("entry for key {key:#010x} on chip {chip} uses missing {direction} link")]
    NonexistentLink {
        /// The chip holding the entry.
        chip: ChipCoord,
        /// The missing link.
        direction: Direction,
        /// Routing key of the entry.
        key: u32,
    },

    /// A placement or virtual-chip constraint cannot be applied.
    #[error("invalid constraint on {subject}: {reason}")]
    InvalidConstraint {
        /// The constrained unit.
        subject: String,
        /// Why the constraint is unusable.
        reason: String,
    },

    /// The application graph is malformed.
    #[error("invalid application graph: {reason}")]
    InvalidGraph {
        /// Description of the problem.
        reason: String,
    },

    /// One or more per-placement data generation jobs failed.
    #[error("data generation failed on {failures} of {total} placements; first failure: {first}")]
    DataGenerationFailed {
        /// Number of failed jobs.
        failures: usize,
        /// Number of jobs dispatched.
        total: usize,
        /// Message of the first failure in placement order.
        first: String,
    },

    /// The remote execution layer reported a failure.
    #[error("remote {operation} failed: {source}")]
    RemoteExecutionFailure {
        /// The remote operation that failed.
        operation: String,
        /// The transport-level cause.
        #[source]
        source: RemoteError,
    },
}

impl MapError {
    /// Wraps a transport failure for the named remote operation.
    pub fn remote(operation: impl Into<String>, source: RemoteError) -> Self {
        Self::RemoteExecutionFailure {
            operation: operation.into(),
            source,
        }
    }

    /// Creates an invalid timing configuration error.
    pub fn timing(reason: impl Into<String>) -> Self {
        Self::InvalidTimingConfiguration {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the caller may retry the failed operation unchanged.
    ///
    /// Compilation is deterministic, so only remote execution failures are
    /// candidates for a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MapError::RemoteExecutionFailure { .. })
    }

    /// Returns `true` if this is a remote operation that timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, MapError::RemoteExecutionFailure { source, .. } if source.is_timeout())
    }
}

fn join_chips(chips: &[ChipCoord]) -> String {
    chips
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A failure reported by the remote execution (transport) layer.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The operation did not complete in time.
    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout {
        /// What was being attempted.
        operation: String,
        /// How long the transport waited.
        duration_ms: u64,
    },

    /// An I/O error occurred while talking to the fabric.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The fabric refused the request.
    #[error("request rejected: {reason}")]
    Rejected {
        /// Reason reported by the fabric.
        reason: String,
    },
}

impl RemoteError {
    /// Creates a rejection error.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Returns `true` for [`RemoteError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, RemoteError::Timeout { .. })
    }
}
