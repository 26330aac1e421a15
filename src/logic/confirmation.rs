//! Two-captain sign-off that gates advancing to the next round.
//!
//! The flags at round index `r` record sign-off of the lineup that follows
//! round `r`. Locking round `r` clears them; each team sets and unsets only its
//! own flag. There is no timeout.

use crate::logic::game_flow::GamePhase;
use crate::models::{FieldUpdate, MatchRecord, RoundIndex, TeamSide};
use serde::{Deserialize, Serialize};

/// Both teams' confirmation flags for one round.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Confirmations {
    pub home: bool,
    pub away: bool,
}

impl Confirmations {
    pub fn for_round(record: &MatchRecord, round: RoundIndex) -> Self {
        Self {
            home: record.home_confirmed[round.as_usize()],
            away: record.away_confirmed[round.as_usize()],
        }
    }

    pub fn get(self, side: TeamSide) -> bool {
        match side {
            TeamSide::Home => self.home,
            TeamSide::Away => self.away,
        }
    }

    pub fn set(&mut self, side: TeamSide, confirmed: bool) {
        match side {
            TeamSide::Home => self.home = confirmed,
            TeamSide::Away => self.away = confirmed,
        }
    }

    pub fn both(self) -> bool {
        self.home && self.away
    }

    /// Phase of a locked round's substitution window given these flags.
    pub fn phase(self) -> GamePhase {
        match (self.home, self.away) {
            (true, true) => GamePhase::TransitioningToNextRound,
            (false, false) => GamePhase::SubstitutionPhase,
            _ => GamePhase::AwaitingConfirmations,
        }
    }
}

/// Field update setting one team's flag.
pub fn confirmation_update(side: TeamSide, round: RoundIndex, confirmed: bool) -> FieldUpdate {
    FieldUpdate::Confirmed {
        side,
        round,
        confirmed,
    }
}

/// Field updates clearing both teams' flags for `round`.
pub fn reset_updates(round: RoundIndex) -> [FieldUpdate; 2] {
    TeamSide::both().map(|side| confirmation_update(side, round, false))
}
