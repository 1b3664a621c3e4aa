//! Routing key allocation.
//!
//! Every partitioned connection receives a `(key, mask)` pair. A packet
//! carrying key `k` matches an entry when `k & mask == key & mask`.
//! Allocation strategies implement [`KeyAllocator`]; one is chosen per run.

use crate::placement::Placements;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tessera_common::{MapError, MapResult, PartitionedConnectionId};
use tessera_config::KeyAllocatorKind;
use tessera_graph::PartitionedGraph;

/// A routing key and the mask of its significant bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyAndMask {
    /// The routing key.
    pub key: u32,
    /// Significant bits of the key.
    pub mask: u32,
}

impl KeyAndMask {
    /// Returns `true` if a packet with key `packet` matches.
    pub fn matches(&self, packet: u32) -> bool {
        packet & self.mask == self.key & self.mask
    }

    /// Returns `true` if some packet key would match both `self` and `other`.
    pub fn overlaps(&self, other: &KeyAndMask) -> bool {
        let common = self.mask & other.mask;
        self.key & common == other.key & common
    }
}

impl fmt::Display for KeyAndMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}/{:#010x}", self.key, self.mask)
    }
}

/// Keys of every partitioned connection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAssignments {
    by_connection: BTreeMap<PartitionedConnectionId, KeyAndMask>,
}

impl KeyAssignments {
    /// Records the key of `connection`.
    pub fn insert(&mut self, connection: PartitionedConnectionId, key: KeyAndMask) {
        self.by_connection.insert(connection, key);
    }

    /// Returns the key of `connection`.
    pub fn get(&self, connection: PartitionedConnectionId) -> Option<KeyAndMask> {
        self.by_connection.get(&connection).copied()
    }

    /// Iterates over `(connection, key)` in connection order.
    pub fn iter(&self) -> impl Iterator<Item = (PartitionedConnectionId, KeyAndMask)> + '_ {
        self.by_connection.iter().map(|(&c, &k)| (c, k))
    }

    /// Number of assigned keys.
    pub fn len(&self) -> usize {
        self.by_connection.len()
    }

    /// Returns `true` if no keys were assigned.
    pub fn is_empty(&self) -> bool {
        self.by_connection.is_empty()
    }
}

/// A routing key allocation strategy.
pub trait KeyAllocator: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Assigns a key to every partitioned connection.
    fn allocate(
        &mut self,
        partitioned: &PartitionedGraph,
        placements: &Placements,
    ) -> MapResult<KeyAssignments>;
}

/// Returns the allocator selected by `kind` over a `width_bits` key space.
pub fn allocator_for(kind: KeyAllocatorKind, width_bits: u8) -> Box<dyn KeyAllocator> {
    match kind {
        KeyAllocatorKind::Sequential => Box::new(SequentialKeys::new(width_bits)),
        KeyAllocatorKind::AtomBlock => Box::new(AtomBlockKeys::new(width_bits)),
    }
}

fn full_mask(width_bits: u8) -> u32 {
    if width_bits >= 32 {
        u32::MAX
    } else {
        (1u32 << width_bits) - 1
    }
}

fn capacity(width_bits: u8) -> u64 {
    1u64 << width_bits.min(32)
}

/// One key per partitioned connection from a counter, all bits significant.
#[derive(Clone, Debug)]
pub struct SequentialKeys {
    width_bits: u8,
}

impl SequentialKeys {
    /// Creates the allocator over a `width_bits` key space.
    pub fn new(width_bits: u8) -> Self {
        Self { width_bits }
    }
}

impl KeyAllocator for SequentialKeys {
    fn name(&self) -> &str {
        "sequential"
    }

    fn allocate(
        &mut self,
        partitioned: &PartitionedGraph,
        _placements: &Placements,
    ) -> MapResult<KeyAssignments> {
        let capacity = capacity(self.width_bits);
        let requested = partitioned.connections().len() as u64;
        if requested > capacity {
            return Err(MapError::KeySpaceExhausted {
                width_bits: self.width_bits,
                requested,
                capacity,
            });
        }
        let mask = full_mask(self.width_bits);
        let mut keys = KeyAssignments::default();
        for (next, pc) in partitioned.connections().iter().enumerate() {
            keys.insert(
                pc.id,
                KeyAndMask {
                    key: next as u32,
                    mask,
                },
            );
        }
        Ok(keys)
    }
}

/// A power-of-two aligned block of keys per partitioned connection.
///
/// The block is large enough for one key per atom of the source slice; the
/// mask selects the block and the low bits are free to carry the atom index.
#[derive(Clone, Debug)]
pub struct AtomBlockKeys {
    width_bits: u8,
}

impl AtomBlockKeys {
    /// Creates the allocator over a `width_bits` key space.
    pub fn new(width_bits: u8) -> Self {
        Self { width_bits }
    }
}

impl KeyAllocator for AtomBlockKeys {
    fn name(&self) -> &str {
        "atom_block"
    }

    fn allocate(
        &mut self,
        partitioned: &PartitionedGraph,
        _placements: &Placements,
    ) -> MapResult<KeyAssignments> {
        let capacity = capacity(self.width_bits);
        let width_mask = full_mask(self.width_bits);
        let mut keys = KeyAssignments::default();
        let mut next: u64 = 0;
        for pc in partitioned.connections() {
            let atoms = partitioned
                .slice(pc.source)
                .map_or(1, |s| u64::from(s.atoms.len()).max(1));
            let block = atoms.next_power_of_two();
            let base = next.div_ceil(block) * block;
            let end = base + block;
            if end > capacity {
                return Err(MapError::KeySpaceExhausted {
                    width_bits: self.width_bits,
                    requested: end,
                    capacity,
                });
            }
            keys.insert(
                pc.id,
                KeyAndMask {
                    key: base as u32,
                    mask: width_mask & !((block - 1) as u32),
                },
            );
            next = end;
        }
        Ok(keys)
    }
}
