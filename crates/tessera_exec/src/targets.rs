//! Grouping placements by executable image.

use std::collections::{BTreeMap, BTreeSet};
use tessera_common::{ChipCoord, Location, MapError, MapResult};
use tessera_fabric::Fabric;
use tessera_graph::ApplicationGraph;
use tessera_map::Mapping;

/// A set of cores, grouped by chip.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoreSubsets {
    by_chip: BTreeMap<ChipCoord, BTreeSet<u32>>,
}

impl CoreSubsets {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one core.
    pub fn add(&mut self, location: Location) {
        self.by_chip.entry(location.chip).or_default().insert(location.core);
    }

    /// Returns `true` if `location` is in the set.
    pub fn contains(&self, location: Location) -> bool {
        self.by_chip
            .get(&location.chip)
            .is_some_and(|cores| cores.contains(&location.core))
    }

    /// Iterates over `(chip, cores)` in coordinate order.
    pub fn chips(&self) -> impl Iterator<Item = (ChipCoord, &BTreeSet<u32>)> {
        self.by_chip.iter().map(|(&chip, cores)| (chip, cores))
    }

    /// Every core, in location order.
    pub fn locations(&self) -> impl Iterator<Item = Location> + '_ {
        self.by_chip.iter().flat_map(|(&chip, cores)| {
            cores.iter().map(move |&core| Location { chip, core })
        })
    }

    /// Total number of cores.
    pub fn len(&self) -> usize {
        self.by_chip.values().map(BTreeSet::len).sum()
    }

    /// Returns `true` if the set holds no cores.
    pub fn is_empty(&self) -> bool {
        self.by_chip.is_empty()
    }
}

/// Cores to load, keyed by executable image.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutableTargets {
    by_image: BTreeMap<String, CoreSubsets>,
}

impl ExecutableTargets {
    /// Groups every slice of `mapping` placed on a real chip by its unit's
    /// executable.
    pub fn from_mapping(
        graph: &ApplicationGraph,
        mapping: &Mapping,
        fabric: &Fabric,
    ) -> MapResult<Self> {
        let mut targets = Self::default();
        for (slice_id, location) in mapping.placements.iter() {
            if fabric.is_virtual(location.chip) {
                continue;
            }
            let unit = mapping
                .partitioned
                .slice(slice_id)
                .and_then(|slice| graph.unit(slice.unit))
                .ok_or_else(|| MapError::InvalidGraph {
                    reason: format!("placed slice {slice_id} has no unit"),
                })?;
            targets
                .by_image
                .entry(unit.model.executable_image().to_string())
                .or_default()
                .add(location);
        }
        Ok(targets)
    }

    /// Iterates over `(image, cores)` in image-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CoreSubsets)> {
        self.by_image.iter().map(|(image, cores)| (image.as_str(), cores))
    }

    /// Cores running `image`.
    pub fn cores(&self, image: &str) -> Option<&CoreSubsets> {
        self.by_image.get(image)
    }

    /// Number of distinct images.
    pub fn len(&self) -> usize {
        self.by_image.len()
    }

    /// Returns `true` if nothing is to be loaded.
    pub fn is_empty(&self) -> bool {
        self.by_image.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsets_group_by_chip() {
        let mut cores = CoreSubsets::new();
        cores.add(Location::new(1, 0, 3));
        cores.add(Location::new(0, 0, 2));
        cores.add(Location::new(1, 0, 1));
        cores.add(Location::new(1, 0, 1));
        assert_eq!(cores.len(), 3);
        assert!(cores.contains(Location::new(1, 0, 3)));
        assert!(!cores.contains(Location::new(0, 0, 3)));
        let order: Vec<_> = cores.locations().collect();
        assert_eq!(
            order,
            vec![Location::new(0, 0, 2), Location::new(1, 0, 1), Location::new(1, 0, 3)]
        );
        assert_eq!(cores.chips().count(), 2);
    }
}
