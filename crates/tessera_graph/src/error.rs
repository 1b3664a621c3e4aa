//! Errors raised while assembling graphs and models.

use tessera_common::{MapError, UnitId};

/// Errors from building an application graph or querying a unit model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Two units share a label.
    #[error("a unit labelled '{0}' already exists")]
    DuplicateLabel(String),

    /// A unit was declared with no atoms.
    #[error("unit '{0}' has no atoms")]
    EmptyUnit(String),

    /// A connection refers to a unit not in the graph.
    #[error("connection '{connection}' refers to unknown unit {unit}")]
    UnknownUnit {
        /// Label of the connection.
        connection: String,
        /// The missing unit.
        unit: UnitId,
    },

    /// Two model components declare the same parameter.
    #[error("parameter '{name}' is declared by both '{first}' and '{second}'")]
    DuplicateParameter {
        /// Parameter name.
        name: String,
        /// Component that declared it first.
        first: String,
        /// Component that declared it again.
        second: String,
    },

    /// No component of a model declares the parameter.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    /// A composed model has no components.
    #[error("model '{0}' has no components")]
    EmptyModel(String),

    /// A connectivity rule does not make sense for the units it joins.
    #[error("invalid connectivity rule: {0}")]
    InvalidRule(String),

    /// Unit state could not be serialized.
    #[error("cannot serialize state of atoms {lo}..{hi}: {reason}")]
    StateSerialization {
        /// First atom of the range.
        lo: u32,
        /// One past the last atom of the range.
        hi: u32,
        /// What went wrong.
        reason: String,
    },
}

impl From<GraphError> for MapError {
    fn from(err: GraphError) -> Self {
        MapError::InvalidGraph {
            reason: err.to_string(),
        }
    }
}
