//! Fabric coordinates, core locations, and router link directions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The integer coordinate of a chip in the fabric mesh.
///
/// Ordered by `x` then `y`, which is the fixed traversal order used by every
/// linear scan over the fabric. Serialized as the string `"x,y"` so it can
/// key JSON and TOML maps.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ChipCoord {
    /// Column of the chip.
    pub x: u32,
    /// Row of the chip.
    pub y: u32,
}

impl ChipCoord {
    /// Creates a chip coordinate.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for ChipCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Error returned when a coordinate string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid coordinate '{input}': expected {expected} comma-separated integers")]
pub struct ParseCoordError {
    /// The text that failed to parse.
    pub input: String,
    /// How many integers were expected.
    pub expected: usize,
}

fn parse_fields(s: &str, expected: usize) -> Result<Vec<u32>, ParseCoordError> {
    let err = || ParseCoordError {
        input: s.to_string(),
        expected,
    };
    let fields = s
        .split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| err())?;
    if fields.len() != expected {
        return Err(err());
    }
    Ok(fields)
}

impl FromStr for ChipCoord {
    type Err = ParseCoordError;

    /// Parses `"x,y"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let f = parse_fields(s, 2)?;
        Ok(Self::new(f[0], f[1]))
    }
}

impl From<ChipCoord> for String {
    fn from(c: ChipCoord) -> String {
        format!("{},{}", c.x, c.y)
    }
}

impl TryFrom<String> for ChipCoord {
    type Error = ParseCoordError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A concrete processing location: one core on one chip.
///
/// Serialized as the string `"x,y,core"`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Location {
    /// The chip holding the core.
    pub chip: ChipCoord,
    /// The core index on that chip.
    pub core: u32,
}

impl Location {
    /// Creates a location from chip coordinates and a core index.
    pub const fn new(x: u32, y: u32, core: u32) -> Self {
        Self {
            chip: ChipCoord::new(x, y),
            core,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.chip.x, self.chip.y, self.core)
    }
}

impl FromStr for Location {
    type Err = ParseCoordError;

    /// Parses `"x,y,core"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let f = parse_fields(s, 3)?;
        Ok(Self::new(f[0], f[1], f[2]))
    }
}

impl From<Location> for String {
    fn from(l: Location) -> String {
        format!("{},{},{}", l.chip.x, l.chip.y, l.core)
    }
}

impl TryFrom<String> for Location {
    type Error = ParseCoordError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// One of the six outgoing router links of a chip in the hexagonal mesh.
///
/// The numeric index is the hardware link id; the link arriving from the
/// opposite neighbour has index `(id + 3) % 6`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Link 0, towards `(x + 1, y)`.
    East,
    /// Link 1, towards `(x + 1, y + 1)`.
    NorthEast,
    /// Link 2, towards `(x, y + 1)`.
    North,
    /// Link 3, towards `(x - 1, y)`.
    West,
    /// Link 4, towards `(x - 1, y - 1)`.
    SouthWest,
    /// Link 5, towards `(x, y - 1)`.
    South,
}

impl Direction {
    /// All six directions in link-id order.
    pub const ALL: [Direction; 6] = [
        Direction::East,
        Direction::NorthEast,
        Direction::North,
        Direction::West,
        Direction::SouthWest,
        Direction::South,
    ];

    /// Returns the hardware link id (0..=5).
    pub fn index(self) -> u8 {
        match self {
            Direction::East => 0,
            Direction::NorthEast => 1,
            Direction::North => 2,
            Direction::West => 3,
            Direction::SouthWest => 4,
            Direction::South => 5,
        }
    }

    /// Returns the direction with the given link id, if it is in range.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Returns the direction pointing back along the same link.
    pub fn opposite(self) -> Self {
        Self::ALL[((self.index() + 3) % 6) as usize]
    }

    /// Returns the `(dx, dy)` step this direction takes across the mesh.
    pub fn offset(self) -> (i64, i64) {
        match self {
            Direction::East => (1, 0),
            Direction::NorthEast => (1, 1),
            Direction::North => (0, 1),
            Direction::West => (-1, 0),
            Direction::SouthWest => (-1, -1),
            Direction::South => (0, -1),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::East => "east",
            Direction::NorthEast => "north-east",
            Direction::North => "north",
            Direction::West => "west",
            Direction::SouthWest => "south-west",
            Direction::South => "south",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chip_coord_ordering_is_x_major() {
        assert!(ChipCoord::new(0, 5) < ChipCoord::new(1, 0));
        assert!(ChipCoord::new(1, 0) < ChipCoord::new(1, 1));
    }

    #[test]
    fn parse_chip_coord() {
        assert_eq!("3, 4".parse::<ChipCoord>().unwrap(), ChipCoord::new(3, 4));
        assert!("3".parse::<ChipCoord>().is_err());
        assert!("a,b".parse::<ChipCoord>().is_err());
    }

    #[test]
    fn parse_location() {
        assert_eq!("1,2,3".parse::<Location>().unwrap(), Location::new(1, 2, 3));
        let err = "1,2".parse::<Location>().unwrap_err();
        assert_eq!(err.expected, 3);
    }

    #[test]
    fn display_formats() {
        assert_eq!(format!("{}", ChipCoord::new(1, 2)), "(1, 2)");
        assert_eq!(format!("{}", Location::new(1, 2, 3)), "(1, 2, 3)");
        assert_eq!(format!("{}", Direction::SouthWest), "south-west");
    }

    #[test]
    fn opposite_is_three_links_round() {
        for d in Direction::ALL {
            assert_eq!(d.opposite().index(), (d.index() + 3) % 6);
            assert_eq!(d.opposite().opposite(), d);
            let (dx, dy) = d.offset();
            let (ox, oy) = d.opposite().offset();
            assert_eq!((dx + ox, dy + oy), (0, 0));
        }
    }

    #[test]
    fn from_index_range() {
        assert_eq!(Direction::from_index(2), Some(Direction::North));
        assert_eq!(Direction::from_index(6), None);
    }

    #[test]
    fn coords_serialize_as_strings() {
        use std::collections::BTreeMap;
        let mut m = BTreeMap::new();
        m.insert(ChipCoord::new(1, 0), Location::new(1, 0, 4));
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"1,0":"1,0,4"}"#);
        let back: BTreeMap<ChipCoord, Location> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
