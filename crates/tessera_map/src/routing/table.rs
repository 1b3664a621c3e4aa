//! Compiled per-chip multicast routing tables.

use crate::keys::KeyAndMask;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tessera_common::{ChipCoord, Direction};

/// One multicast routing entry: packets matching `key`/`mask` are copied to
/// every link in `links` and every core in `cores`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MulticastEntry {
    /// The routing key.
    pub key: u32,
    /// Significant bits of the key.
    pub mask: u32,
    /// Outgoing links.
    pub links: BTreeSet<Direction>,
    /// Local cores to deliver to.
    pub cores: BTreeSet<u32>,
}

impl MulticastEntry {
    /// The entry's key and mask.
    pub fn key_and_mask(&self) -> KeyAndMask {
        KeyAndMask {
            key: self.key,
            mask: self.mask,
        }
    }
}

/// The ordered entries of one chip's router. The first matching entry wins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    /// Entries in match order.
    pub entries: Vec<MulticastEntry>,
}

impl RoutingTable {
    /// Returns the entry a packet with key `packet` would match.
    pub fn lookup(&self, packet: u32) -> Option<&MulticastEntry> {
        self.entries
            .iter()
            .find(|e| e.key_and_mask().matches(packet))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Routing tables of every chip that carries traffic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTables {
    tables: BTreeMap<ChipCoord, RoutingTable>,
}

impl RoutingTables {
    /// Appends `entry` to the table of `chip`.
    pub fn push(&mut self, chip: ChipCoord, entry: MulticastEntry) {
        self.tables.entry(chip).or_default().entries.push(entry);
    }

    /// Returns the table of `chip`.
    pub fn table(&self, chip: ChipCoord) -> Option<&RoutingTable> {
        self.tables.get(&chip)
    }

    /// Iterates over `(chip, table)` in coordinate order.
    pub fn iter(&self) -> impl Iterator<Item = (ChipCoord, &RoutingTable)> {
        self.tables.iter().map(|(&c, t)| (c, t))
    }

    /// Chips whose table holds at least one entry.
    pub fn chips_with_entries(&self) -> impl Iterator<Item = ChipCoord> + '_ {
        self.tables
            .iter()
            .filter(|(_, t)| !t.is_empty())
            .map(|(&c, _)| c)
    }

    /// Total entries over all chips.
    pub fn total_entries(&self) -> usize {
        self.tables.values().map(RoutingTable::len).sum()
    }

    /// Returns `true` if no chip has a table.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
