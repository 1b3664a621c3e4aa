//! Resource-cost vectors and the names of the scarce resources they measure.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// The cost (or budget) of running some atoms on one core.
///
/// `cpu_cycles` and `local_memory` are per-core quantities; `shared_memory`
/// is drawn from the chip-wide pool shared by every core on the chip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceCost {
    /// CPU cycles consumed per time step.
    pub cpu_cycles: u64,
    /// Bytes of core-local memory.
    pub local_memory: u64,
    /// Bytes of chip-shared memory.
    pub shared_memory: u64,
}

impl ResourceCost {
    /// A zero cost.
    pub const ZERO: Self = Self {
        cpu_cycles: 0,
        local_memory: 0,
        shared_memory: 0,
    };

    /// Creates a cost from its three components.
    pub const fn new(cpu_cycles: u64, local_memory: u64, shared_memory: u64) -> Self {
        Self {
            cpu_cycles,
            local_memory,
            shared_memory,
        }
    }

    /// Multiplies every component by `n`, saturating.
    pub fn scaled(&self, n: u64) -> Self {
        Self {
            cpu_cycles: self.cpu_cycles.saturating_mul(n),
            local_memory: self.local_memory.saturating_mul(n),
            shared_memory: self.shared_memory.saturating_mul(n),
        }
    }

    /// Returns the first component of `self` that exceeds `budget`, if any.
    ///
    /// Components are checked in the order cycles, local memory, shared
    /// memory so the reported resource is stable.
    pub fn first_excess(&self, budget: &ResourceCost) -> Option<Excess> {
        let checks = [
            (Resource::CpuCycles, self.cpu_cycles, budget.cpu_cycles),
            (Resource::LocalMemory, self.local_memory, budget.local_memory),
            (Resource::SharedMemory, self.shared_memory, budget.shared_memory),
        ];
        checks
            .into_iter()
            .find(|(_, requested, available)| requested > available)
            .map(|(resource, requested, available)| Excess {
                resource,
                requested,
                available,
            })
    }

    /// Returns `true` if every component fits within `budget`.
    pub fn fits_within(&self, budget: &ResourceCost) -> bool {
        self.first_excess(budget).is_none()
    }
}

impl Add for ResourceCost {
    type Output = ResourceCost;

    fn add(self, rhs: ResourceCost) -> ResourceCost {
        ResourceCost {
            cpu_cycles: self.cpu_cycles.saturating_add(rhs.cpu_cycles),
            local_memory: self.local_memory.saturating_add(rhs.local_memory),
            shared_memory: self.shared_memory.saturating_add(rhs.shared_memory),
        }
    }
}

impl AddAssign for ResourceCost {
    fn add_assign(&mut self, rhs: ResourceCost) {
        *self = *self + rhs;
    }
}

impl Sum for ResourceCost {
    fn sum<I: Iterator<Item = ResourceCost>>(iter: I) -> Self {
        iter.fold(ResourceCost::ZERO, Add::add)
    }
}

impl fmt::Display for ResourceCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cycles, {} B local, {} B shared",
            self.cpu_cycles, self.local_memory, self.shared_memory
        )
    }
}

/// A named scarce resource, used to report what ran out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
    /// CPU cycles per time step on one core.
    CpuCycles,
    /// Core-local memory bytes.
    LocalMemory,
    /// Chip-shared memory bytes.
    SharedMemory,
    /// Free application cores.
    Cores,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::CpuCycles => "cpu cycles",
            Resource::LocalMemory => "local memory bytes",
            Resource::SharedMemory => "shared memory bytes",
            Resource::Cores => "cores",
        };
        f.write_str(name)
    }
}

/// Describes one resource component that exceeded its budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Excess {
    /// Which resource was exceeded.
    pub resource: Resource,
    /// The amount requested.
    pub requested: u64,
    /// The amount available.
    pub available: u64,
}

/// The two communication-tag pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    /// Outbound tags used to notify external hosts.
    Notification,
    /// Inbound tags delivering external traffic to one core.
    Reverse,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagKind::Notification => f.write_str("notification"),
            TagKind::Reverse => f.write_str("reverse"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_within_budget() {
        let budget = ResourceCost::new(100, 100, 100);
        assert!(ResourceCost::new(100, 50, 0).fits_within(&budget));
        assert!(!ResourceCost::new(101, 50, 0).fits_within(&budget));
    }

    #[test]
    fn first_excess_reports_in_fixed_order() {
        let budget = ResourceCost::new(10, 10, 10);
        let excess = ResourceCost::new(5, 20, 30).first_excess(&budget).unwrap();
        assert_eq!(excess.resource, Resource::LocalMemory);
        assert_eq!(excess.requested, 20);
        assert_eq!(excess.available, 10);
    }

    #[test]
    fn add_and_sum() {
        let a = ResourceCost::new(1, 2, 3);
        let b = ResourceCost::new(10, 20, 30);
        assert_eq!(a + b, ResourceCost::new(11, 22, 33));
        let total: ResourceCost = vec![a, b, a].into_iter().sum();
        assert_eq!(total, ResourceCost::new(12, 24, 36));
    }

    #[test]
    fn scaled_multiplies_each_component() {
        assert_eq!(ResourceCost::new(1, 2, 3).scaled(4), ResourceCost::new(4, 8, 12));
        assert_eq!(ResourceCost::new(u64::MAX, 0, 0).scaled(2).cpu_cycles, u64::MAX);
    }

    #[test]
    fn add_saturates() {
        let a = ResourceCost::new(u64::MAX, 0, 0);
        assert_eq!((a + a).cpu_cycles, u64::MAX);
    }

    #[test]
    fn display() {
        assert_eq!(
            format!("{}", ResourceCost::new(1, 2, 3)),
            "1 cycles, 2 B local, 3 B shared"
        );
        assert_eq!(format!("{}", Resource::Cores), "cores");
        assert_eq!(format!("{}", TagKind::Reverse), "reverse");
    }
}
