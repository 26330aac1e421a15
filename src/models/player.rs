//! Player identifiers and team sides.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a registered player, as issued by the league roster.
pub type PlayerId = String;

/// Which of the two teams in a match.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSide {
    Home,
    Away,
}

impl TeamSide {
    pub fn from_is_home(is_home_team: bool) -> Self {
        if is_home_team {
            TeamSide::Home
        } else {
            TeamSide::Away
        }
    }

    pub fn is_home(self) -> bool {
        self == TeamSide::Home
    }

    pub fn other(self) -> Self {
        match self {
            TeamSide::Home => TeamSide::Away,
            TeamSide::Away => TeamSide::Home,
        }
    }

    pub fn both() -> [TeamSide; 2] {
        [TeamSide::Home, TeamSide::Away]
    }
}

impl fmt::Display for TeamSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamSide::Home => write!(f, "home"),
            TeamSide::Away => write!(f, "away"),
        }
    }
}
