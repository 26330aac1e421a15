//! Round and position indices. Both are 0-based and validated to 0..=3.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rounds per match.
pub const ROUNDS: usize = 4;

/// Position pairings per round (and players per lineup).
pub const POSITIONS: usize = 4;

/// A round or position index outside 0..=3.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{kind} index {value} is out of range 0-3")]
pub struct IndexOutOfRange {
    pub kind: &'static str,
    pub value: u8,
}

/// 0-based round index. Displayed 1-based ("round 1" .. "round 4").
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct RoundIndex(u8);

impl RoundIndex {
    pub const FIRST: RoundIndex = RoundIndex(0);
    pub const LAST: RoundIndex = RoundIndex(ROUNDS as u8 - 1);

    pub fn new(index: u8) -> Option<Self> {
        (usize::from(index) < ROUNDS).then_some(Self(index))
    }

    /// From a 1-based round number.
    pub fn from_number(number: u8) -> Option<Self> {
        number.checked_sub(1).and_then(Self::new)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        usize::from(self.0)
    }

    /// 1-based round number.
    pub fn number(self) -> u8 {
        self.0 + 1
    }

    pub fn next(self) -> Option<Self> {
        Self::new(self.0 + 1)
    }

    pub fn prev(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }

    pub fn is_last(self) -> bool {
        self == Self::LAST
    }

    pub fn all() -> impl Iterator<Item = RoundIndex> {
        (0..ROUNDS as u8).map(Self)
    }
}

impl TryFrom<u8> for RoundIndex {
    type Error = IndexOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(IndexOutOfRange { kind: "round", value })
    }
}

impl From<RoundIndex> for u8 {
    fn from(round: RoundIndex) -> u8 {
        round.0
    }
}

impl fmt::Display for RoundIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round {}", self.number())
    }
}

/// Table position. Home side uses the index (0-3), away side the letter (A-D);
/// both name the same pairing.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Position(u8);

impl Position {
    pub fn new(index: u8) -> Option<Self> {
        (usize::from(index) < POSITIONS).then_some(Self(index))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        usize::from(self.0)
    }

    /// Away-side letter for this position.
    pub fn letter(self) -> char {
        char::from(b'A' + self.0)
    }

    pub fn all() -> impl Iterator<Item = Position> {
        (0..POSITIONS as u8).map(Self)
    }
}

impl TryFrom<u8> for Position {
    type Error = IndexOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(IndexOutOfRange { kind: "position", value })
    }
}

impl From<Position> for u8 {
    fn from(position: Position) -> u8 {
        position.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, self.letter())
    }
}
