//! Half-open ranges of atom indices.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The atoms `lo..hi` of one unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AtomRange {
    /// First atom in the range.
    pub lo: u32,
    /// One past the last atom.
    pub hi: u32,
}

impl AtomRange {
    /// Creates the range `lo..hi`. An inverted range is treated as empty.
    pub fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi: hi.max(lo) }
    }

    /// Number of atoms in the range.
    pub fn len(&self) -> u32 {
        self.hi - self.lo
    }

    /// Returns `true` if the range holds no atoms.
    pub fn is_empty(&self) -> bool {
        self.hi == self.lo
    }

    /// Returns `true` if `atom` lies in the range.
    pub fn contains(&self, atom: u32) -> bool {
        (self.lo..self.hi).contains(&atom)
    }

    /// Returns the overlap with `other`, if any.
    pub fn intersect(&self, other: &AtomRange) -> Option<AtomRange> {
        let lo = self.lo.max(other.lo);
        let hi = self.hi.min(other.hi);
        (lo < hi).then_some(AtomRange { lo, hi })
    }

    /// Iterates over the atom indices.
    pub fn iter(&self) -> std::ops::Range<u32> {
        self.lo..self.hi
    }
}

impl fmt::Display for AtomRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.lo, self.hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basics() {
        let r = AtomRange::new(10, 15);
        assert_eq!(r.len(), 5);
        assert!(r.contains(10));
        assert!(!r.contains(15));
        assert!(AtomRange::new(4, 2).is_empty());
        assert_eq!(format!("{r}"), "[10, 15)");
    }

    #[test]
    fn intersection() {
        let a = AtomRange::new(0, 60);
        assert_eq!(
            a.intersect(&AtomRange::new(50, 100)),
            Some(AtomRange::new(50, 60))
        );
        assert_eq!(a.intersect(&AtomRange::new(60, 100)), None);
    }
}
