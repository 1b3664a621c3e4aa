//! Allocation of the scarce I/O tags.
//!
//! Notification (inbound to a host) and reverse (outbound from a host) tags
//! come from two independent pools. Each pool keeps a high-water mark: an
//! explicit request raises it, an automatic request takes the value after
//! it. Tags are never reused within one run, so automatic values never
//! collide with explicit ones handed out earlier.

use crate::placement::Placements;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tessera_common::{Location, MapError, MapResult, TagKind, UnitId};
use tessera_config::TagConfig;
use tessera_graph::{ApplicationGraph, PartitionedGraph, Unit};

/// One tag pool, scoped to a single compilation run.
#[derive(Clone, Debug)]
pub struct TagPool {
    kind: TagKind,
    min: u32,
    max: u32,
    high_water: Option<u32>,
    used: BTreeSet<u32>,
}

impl TagPool {
    /// Creates a pool handing out `min..=max`.
    pub fn new(kind: TagKind, min: u32, max: u32) -> Self {
        Self {
            kind,
            min,
            max,
            high_water: None,
            used: BTreeSet::new(),
        }
    }

    /// Allocates `requested`, or the next tag above the high-water mark when
    /// `requested` is `None`. `subject` names the requester in errors.
    pub fn allocate(&mut self, requested: Option<u32>, subject: &str) -> MapResult<u32> {
        let tag = match requested {
            Some(tag) => {
                if self.used.contains(&tag) {
                    return Err(MapError::TagConflict {
                        pool: self.kind,
                        tag,
                        subject: subject.to_string(),
                    });
                }
                if tag > self.max {
                    return Err(MapError::InvalidConstraint {
                        subject: subject.to_string(),
                        reason: format!("{} tag {tag} is above the pool maximum {}", self.kind, self.max),
                    });
                }
                tag
            }
            None => {
                let next = match self.high_water {
                    Some(h) => h.saturating_add(1).max(self.min),
                    None => self.min,
                };
                if next > self.max {
                    return Err(MapError::TagPoolExhausted {
                        pool: self.kind,
                        max: self.max,
                    });
                }
                next
            }
        };
        self.used.insert(tag);
        self.high_water = Some(self.high_water.map_or(tag, |h| h.max(tag)));
        Ok(tag)
    }

    /// Tags allocated so far, ascending.
    pub fn used(&self) -> impl Iterator<Item = u32> + '_ {
        self.used.iter().copied()
    }
}

/// An allocated inbound tag: the unit's packets are forwarded to `host:port`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTag {
    /// The sending unit.
    pub unit: UnitId,
    /// Tag value.
    pub tag: u32,
    /// Receiving host.
    pub host: String,
    /// Receiving port.
    pub port: u16,
}

/// An allocated outbound tag: traffic on `port` is delivered to `destination`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseTag {
    /// The receiving unit.
    pub unit: UnitId,
    /// Tag value.
    pub tag: u32,
    /// Listening port.
    pub port: u16,
    /// The unit's single core.
    pub destination: Location,
}

/// Every tag allocated for a graph.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAllocations {
    /// Notification tags in allocation order.
    pub notification: Vec<NotificationTag>,
    /// Reverse tags in allocation order.
    pub reverse: Vec<ReverseTag>,
}

impl TagAllocations {
    /// Returns `true` if no tags were allocated.
    pub fn is_empty(&self) -> bool {
        self.notification.is_empty() && self.reverse.is_empty()
    }
}

fn unit_subject(unit: &Unit) -> String {
    format!("unit '{}'", unit.label)
}

/// Allocates the tags every unit requests.
///
/// Explicitly numbered requests across the whole graph are served before
/// automatic ones, each pass in unit order. Fails before allocating anything
/// if a unit requesting a reverse tag was split into several slices.
pub fn allocate_tags(
    graph: &ApplicationGraph,
    partitioned: &PartitionedGraph,
    placements: &Placements,
    config: &TagConfig,
) -> MapResult<TagAllocations> {
    let mut destinations = Vec::new();
    for unit in graph.units().iter().filter(|u| u.reverse_tag.is_some()) {
        let slices = partitioned.slices_of(unit.id);
        let [slice] = slices else {
            return Err(MapError::MultiCoreReverseTagUnsupported {
                unit: unit.label.clone(),
                slices: slices.len(),
            });
        };
        let destination = placements.get(*slice).ok_or_else(|| MapError::InvalidGraph {
            reason: format!("slice {slice} of unit '{}' is unplaced", unit.label),
        })?;
        destinations.push((unit.id, destination));
    }

    let mut notification_pool = TagPool::new(TagKind::Notification, config.notification_min, config.max_tag);
    let mut reverse_pool = TagPool::new(TagKind::Reverse, config.reverse_min, config.max_tag);
    let mut allocations = TagAllocations::default();

    for explicit in [true, false] {
        for unit in graph.units() {
            if let Some(request) = &unit.notification_tag {
                if request.tag.is_some() == explicit {
                    let tag = notification_pool.allocate(request.tag, &unit_subject(unit))?;
                    allocations.notification.push(NotificationTag {
                        unit: unit.id,
                        tag,
                        host: request.host.clone(),
                        port: request.port,
                    });
                }
            }
            if let Some(request) = &unit.reverse_tag {
                if request.tag.is_some() == explicit {
                    let Some(&(_, destination)) = destinations.iter().find(|(id, _)| *id == unit.id)
                    else {
                        continue;
                    };
                    let tag = reverse_pool.allocate(request.tag, &unit_subject(unit))?;
                    allocations.reverse.push(ReverseTag {
                        unit: unit.id,
                        tag,
                        port: request.port,
                        destination,
                    });
                }
            }
        }
    }

    tracing::info!(
        notification = allocations.notification.len(),
        reverse = allocations.reverse.len(),
        "tags allocated"
    );
    Ok(allocations)
}
