//! Opaque ID newtypes for application and partitioned graph entities.
//!
//! [`UnitId`], [`ConnectionId`], [`SliceId`], and [`PartitionedConnectionId`]
//! are thin `u32` wrappers used as indices into the graph vectors. They are
//! `Copy`, `Ord`, `Hash`, and `Serialize`/`Deserialize`.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }

            /// Returns the ID as a `usize` suitable for vector indexing.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID for a unit in the application graph.
    UnitId
);

define_id!(
    /// Opaque, copyable ID for a connection in the application graph.
    ConnectionId
);

define_id!(
    /// Opaque, copyable ID for a slice in the partitioned graph.
    SliceId
);

define_id!(
    /// Opaque, copyable ID for a partitioned connection.
    PartitionedConnectionId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashSet};

    #[test]
    fn unit_id_roundtrip() {
        let id = UnitId::from_raw(42);
        assert_eq!(id.as_raw(), 42);
        assert_eq!(id.index(), 42);
    }

    #[test]
    fn id_equality() {
        let a = SliceId::from_raw(3);
        let b = SliceId::from_raw(3);
        let c = SliceId::from_raw(4);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn id_hash_in_set() {
        let mut set = HashSet::new();
        set.insert(ConnectionId::from_raw(1));
        set.insert(ConnectionId::from_raw(2));
        set.insert(ConnectionId::from_raw(1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn ids_order_by_raw_index() {
        let set: BTreeSet<_> = [5, 1, 3]
            .into_iter()
            .map(PartitionedConnectionId::from_raw)
            .collect();
        let raw: Vec<u32> = set.into_iter().map(|id| id.as_raw()).collect();
        assert_eq!(raw, vec![1, 3, 5]);
    }

    #[test]
    fn id_serde_roundtrip() {
        let id = SliceId::from_raw(55);
        let json = serde_json::to_string(&id).unwrap();
        let restored: SliceId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn id_display() {
        let id = UnitId::from_raw(7);
        assert_eq!(format!("{id}"), "7");
    }
}
