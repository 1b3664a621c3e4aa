//! Units: the caller's computational entities.

use crate::model::UnitModel;
use std::sync::Arc;
use tessera_common::{Location, UnitId};
use tessera_fabric::VirtualChipSpec;

/// Request for an inbound notification tag: packets from the unit are
/// forwarded to `host:port`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationTagRequest {
    /// Explicit tag, or `None` to take the next free one.
    pub tag: Option<u32>,
    /// Receiving host.
    pub host: String,
    /// Receiving port.
    pub port: u16,
}

/// Request for an outbound reverse tag: traffic arriving on `port` is
/// delivered to the unit's single core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReverseTagRequest {
    /// Explicit tag, or `None` to take the next free one.
    pub tag: Option<u32>,
    /// Listening port on the board.
    pub port: u16,
}

/// A computational entity of `n_atoms` atoms.
#[derive(Clone, Debug)]
pub struct Unit {
    /// Assigned by [`ApplicationGraph::add_unit`](crate::ApplicationGraph::add_unit).
    pub id: UnitId,
    /// Unique, human-readable label.
    pub label: String,
    /// Number of atoms.
    pub n_atoms: u32,
    /// Cost and state provider.
    pub model: Arc<dyn UnitModel>,
    /// Optional inbound tag request.
    pub notification_tag: Option<NotificationTagRequest>,
    /// Optional outbound tag request.
    pub reverse_tag: Option<ReverseTagRequest>,
    /// Pins the unit to an exact core; the unit must then fit in one slice.
    pub fixed_location: Option<Location>,
    /// Confines the unit to a virtual chip, created on demand.
    pub virtual_chip: Option<VirtualChipSpec>,
    /// Caller-supplied ceiling on atoms per slice.
    pub max_atoms_per_core: Option<u32>,
    /// Whether the unit records spikes during a run.
    pub record_spikes: bool,
}

impl Unit {
    /// Creates an unconstrained unit.
    pub fn new(label: impl Into<String>, n_atoms: u32, model: Arc<dyn UnitModel>) -> Self {
        Self {
            id: UnitId::from_raw(0),
            label: label.into(),
            n_atoms,
            model,
            notification_tag: None,
            reverse_tag: None,
            fixed_location: None,
            virtual_chip: None,
            max_atoms_per_core: None,
            record_spikes: false,
        }
    }

    /// Requests a notification tag.
    pub fn with_notification_tag(
        mut self,
        tag: Option<u32>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        self.notification_tag = Some(NotificationTagRequest {
            tag,
            host: host.into(),
            port,
        });
        self
    }

    /// Requests a reverse tag.
    pub fn with_reverse_tag(mut self, tag: Option<u32>, port: u16) -> Self {
        self.reverse_tag = Some(ReverseTagRequest { tag, port });
        self
    }

    /// Pins the unit to `location`. Placement fails if the unit is
    /// partitioned into more than one slice.
    pub fn with_fixed_location(mut self, location: Location) -> Self {
        self.fixed_location = Some(location);
        self
    }

    /// Confines the unit to a virtual chip.
    pub fn with_virtual_chip(mut self, spec: VirtualChipSpec) -> Self {
        self.virtual_chip = Some(spec);
        self
    }

    /// Caps the atoms placed on one core.
    pub fn with_max_atoms_per_core(mut self, max: u32) -> Self {
        self.max_atoms_per_core = Some(max);
        self
    }

    /// Turns on spike recording.
    pub fn with_spike_recording(mut self) -> Self {
        self.record_spikes = true;
        self
    }
}
