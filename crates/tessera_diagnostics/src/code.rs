//! Diagnostic codes with category prefixes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a diagnostic code, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Errors, prefixed with `E`.
    Error,
    /// Warnings, prefixed with `W`.
    Warning,
    /// Stage notes, prefixed with `N`.
    Note,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Error => 'E',
            Category::Warning => 'W',
            Category::Note => 'N',
        }
    }
}

/// A category prefix plus a numeric identifier, displayed as e.g. `W101`.
///
/// Numbers are grouped by origin: `1xx` execution setup, `2xx` compilation
/// stages, `3xx` routing tables.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// An unbounded run was requested.
    pub const UNBOUNDED_RUN: Self = Self::new(Category::Warning, 101);
    /// Partitioned connections were removed by the edge filter.
    pub const CONNECTIONS_PRUNED: Self = Self::new(Category::Note, 201);
    /// A unit was split over more than one slice.
    pub const UNIT_SPLIT: Self = Self::new(Category::Note, 202);
    /// A virtual chip was added to the fabric.
    pub const VIRTUAL_CHIP_ADDED: Self = Self::new(Category::Note, 203);
    /// A routing table is close to its capacity.
    pub const TABLE_NEAR_CAPACITY: Self = Self::new(Category::Warning, 301);

    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}
