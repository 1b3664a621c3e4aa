//! The application graph built by the caller.

use crate::connectivity::ConnectivityRule;
use crate::error::GraphError;
use crate::unit::Unit;
use std::sync::Arc;
use tessera_common::{ConnectionId, UnitId};

/// A directed link between two units.
#[derive(Clone, Debug)]
pub struct Connection {
    /// Position in the graph's connection list.
    pub id: ConnectionId,
    /// Human-readable label.
    pub label: String,
    /// Sending unit.
    pub source: UnitId,
    /// Receiving unit.
    pub target: UnitId,
    /// Which atom pairs are linked.
    pub rule: Arc<dyn ConnectivityRule>,
}

/// Units and connections, in declaration order.
///
/// IDs index the internal vectors, so declaration order is also the
/// deterministic processing order of every mapping stage.
#[derive(Clone, Debug, Default)]
pub struct ApplicationGraph {
    units: Vec<Unit>,
    connections: Vec<Connection>,
}

impl ApplicationGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit and returns its ID.
    pub fn add_unit(&mut self, mut unit: Unit) -> Result<UnitId, GraphError> {
        if unit.n_atoms == 0 {
            return Err(GraphError::EmptyUnit(unit.label));
        }
        if self.unit_by_label(&unit.label).is_some() {
            return Err(GraphError::DuplicateLabel(unit.label));
        }
        let id = UnitId::from_raw(self.units.len() as u32);
        unit.id = id;
        self.units.push(unit);
        Ok(id)
    }

    /// Adds a connection from `source` to `target`.
    pub fn add_connection(
        &mut self,
        label: impl Into<String>,
        source: UnitId,
        target: UnitId,
        rule: Arc<dyn ConnectivityRule>,
    ) -> Result<ConnectionId, GraphError> {
        let label = label.into();
        let mut sizes = [0u32; 2];
        for (slot, unit) in sizes.iter_mut().zip([source, target]) {
            *slot = self
                .unit(unit)
                .ok_or_else(|| GraphError::UnknownUnit {
                    connection: label.clone(),
                    unit,
                })?
                .n_atoms;
        }
        rule.validate(sizes[0], sizes[1])?;
        let id = ConnectionId::from_raw(self.connections.len() as u32);
        self.connections.push(Connection {
            id,
            label,
            source,
            target,
            rule,
        });
        Ok(id)
    }

    /// Returns the unit with the given ID.
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id.index())
    }

    /// Returns the unit with the given label.
    pub fn unit_by_label(&self, label: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.label == label)
    }

    /// Returns the connection with the given ID.
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(id.index())
    }

    /// All units in declaration order.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// All connections in declaration order.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Returns `true` if any unit records spikes.
    pub fn records_spikes(&self) -> bool {
        self.units.iter().any(|u| u.record_spikes)
    }

    /// Total atoms across all units.
    pub fn total_atoms(&self) -> u64 {
        self.units.iter().map(|u| u64::from(u.n_atoms)).sum()
    }
}
