//! Frame: one scored contest between the two players at a position in a round.

use crate::models::player::{PlayerId, TeamSide};
use crate::models::round::{Position, RoundIndex};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Log entry for one player swap at a frame.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SubstitutionRecord {
    pub timestamp: DateTime<Utc>,
    pub team: TeamSide,
    pub position: Position,
    pub old_player_id: PlayerId,
    pub new_player_id: PlayerId,
    /// Captain (or client) that made the change, when known.
    #[serde(default)]
    pub performed_by: Option<String>,
}

/// A single frame. Round and position are fixed at creation; only the players
/// assigned to the slot and the result change.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    round: RoundIndex,
    home_position: Position,
    away_position: char,
    pub home_player_id: PlayerId,
    pub away_player_id: PlayerId,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub winner_player_id: Option<PlayerId>,
    /// Append-only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substitution_history: Vec<SubstitutionRecord>,
}

impl Frame {
    pub fn new(
        round: RoundIndex,
        position: Position,
        home_player_id: PlayerId,
        away_player_id: PlayerId,
    ) -> Self {
        Self {
            round,
            home_position: position,
            away_position: position.letter(),
            home_player_id,
            away_player_id,
            is_complete: false,
            winner_player_id: None,
            substitution_history: Vec::new(),
        }
    }

    pub fn round(&self) -> RoundIndex {
        self.round
    }

    pub fn position(&self) -> Position {
        self.home_position
    }

    pub fn away_position(&self) -> char {
        self.away_position
    }

    /// Away letter still matches the home index (only a hand-edited record breaks this).
    pub fn positions_agree(&self) -> bool {
        self.away_position == self.home_position.letter()
    }

    pub fn player(&self, side: TeamSide) -> &PlayerId {
        match side {
            TeamSide::Home => &self.home_player_id,
            TeamSide::Away => &self.away_player_id,
        }
    }

    /// Put `player` into this frame's `side` slot; returns the previous occupant.
    pub fn assign(&mut self, side: TeamSide, player: PlayerId) -> PlayerId {
        let slot = match side {
            TeamSide::Home => &mut self.home_player_id,
            TeamSide::Away => &mut self.away_player_id,
        };
        std::mem::replace(slot, player)
    }

    /// Mark the frame complete with `winner`'s current player as the winner.
    pub fn record_result(&mut self, winner: TeamSide) {
        self.winner_player_id = Some(self.player(winner).clone());
        self.is_complete = true;
    }
}
