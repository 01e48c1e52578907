//! Link sides and sync directions.

use crate::error::{LinkError, LinkResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One end of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// The first configured entity.
    A,
    /// The second configured entity.
    B,
}

impl Side {
    /// Returns the other end.
    pub fn opposite(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    /// Returns the direction in which a change on this side is mirrored.
    pub fn outbound(self) -> Direction {
        match self {
            Side::A => Direction::AToB,
            Side::B => Direction::BToA,
        }
    }
}

/// Direction of a mirror action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Entity A drives entity B.
    AToB,
    /// Entity B drives entity A.
    BToA,
}

impl Direction {
    /// Both directions.
    pub const ALL: [Direction; 2] = [Direction::AToB, Direction::BToA];

    /// Returns the side whose change is mirrored.
    pub fn source(self) -> Side {
        match self {
            Direction::AToB => Side::A,
            Direction::BToA => Side::B,
        }
    }

    /// Returns the side that receives the mirror action.
    pub fn target(self) -> Side {
        self.source().opposite()
    }

    /// Returns the opposite direction.
    pub fn reverse(self) -> Direction {
        self.target().outbound()
    }

    /// Returns a stable index for per-direction arrays.
    pub fn index(self) -> usize {
        match self {
            Direction::AToB => 0,
            Direction::BToA => 1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::AToB => f.write_str("a_to_b"),
            Direction::BToA => f.write_str("b_to_a"),
        }
    }
}

impl FromStr for Direction {
    type Err = LinkError;

    fn from_str(s: &str) -> LinkResult<Self> {
        match s {
            "a_to_b" | "1to2" => Ok(Direction::AToB),
            "b_to_a" | "2to1" => Ok(Direction::BToA),
            other => Err(LinkError::InvalidConfig(format!(
                "unknown direction: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_sides() {
        assert_eq!(Direction::AToB.source(), Side::A);
        assert_eq!(Direction::AToB.target(), Side::B);
        assert_eq!(Direction::AToB.reverse(), Direction::BToA);
        assert_eq!(Side::B.outbound(), Direction::BToA);
        assert_ne!(Direction::AToB.index(), Direction::BToA.index());
    }

    #[test]
    fn direction_names() {
        assert_eq!("1to2".parse::<Direction>().unwrap(), Direction::AToB);
        assert_eq!("b_to_a".parse::<Direction>().unwrap(), Direction::BToA);
        assert!("sideways".parse::<Direction>().is_err());
        assert_eq!(Direction::BToA.to_string(), "b_to_a");
    }
}
