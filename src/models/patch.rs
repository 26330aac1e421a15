//! Partial writes against a match record.
//!
//! Each update names one field path of the record. Updates that concern a
//! single team only ever touch that team's fields, so home and away captains
//! writing at the same time do not overwrite each other.

use crate::models::frame::SubstitutionRecord;
use crate::models::lineup::Lineup;
use crate::models::match_record::{MatchError, MatchRecord, MatchStatus};
use crate::models::player::{PlayerId, TeamSide};
use crate::models::round::{Position, RoundIndex};
use serde::{Deserialize, Serialize};

/// One field-level update.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FieldUpdate {
    Status {
        status: MatchStatus,
    },
    CurrentRound {
        round: RoundIndex,
    },
    RoundLocked {
        round: RoundIndex,
        locked: bool,
    },
    Confirmed {
        side: TeamSide,
        round: RoundIndex,
        confirmed: bool,
    },
    /// One team's four lineup cells for a round.
    Lineup {
        round: RoundIndex,
        side: TeamSide,
        players: Lineup,
    },
    /// Reassign one side of a frame, optionally logging the swap.
    FramePlayer {
        round: RoundIndex,
        position: Position,
        side: TeamSide,
        player: PlayerId,
        #[serde(default)]
        log: Option<SubstitutionRecord>,
    },
    FrameResult {
        round: RoundIndex,
        position: Position,
        winner: TeamSide,
    },
    /// Fails the whole patch unless both teams have confirmed the lineup that
    /// follows `round`.
    ExpectConfirmed {
        round: RoundIndex,
    },
    /// Open `round` from the lineups already on the record: record the
    /// inherited lineup if the round has none yet and seat every frame from it.
    SeatRound {
        round: RoundIndex,
    },
}

/// Ordered list of updates, applied all-or-nothing.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MatchPatch {
    pub updates: Vec<FieldUpdate>,
}

impl MatchPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, update: FieldUpdate) {
        self.updates.push(update);
    }

    pub fn with(mut self, update: FieldUpdate) -> Self {
        self.push(update);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }
}

impl From<FieldUpdate> for MatchPatch {
    fn from(update: FieldUpdate) -> Self {
        Self {
            updates: vec![update],
        }
    }
}

impl MatchRecord {
    /// Apply `patch`. On error the record is left unchanged.
    pub fn apply_patch(&mut self, patch: &MatchPatch) -> Result<(), MatchError> {
        let mut next = self.clone();
        for update in &patch.updates {
            next.apply_update(update)?;
        }
        next.check_lineups()?;
        *self = next;
        Ok(())
    }

    fn apply_update(&mut self, update: &FieldUpdate) -> Result<(), MatchError> {
        match update {
            FieldUpdate::Status { status } => self.status = *status,
            FieldUpdate::CurrentRound { round } => self.current_round = *round,
            FieldUpdate::RoundLocked { round, locked } => {
                self.round_locked[round.as_usize()] = *locked;
            }
            FieldUpdate::Confirmed {
                side,
                round,
                confirmed,
            } => {
                self.confirmed_mut(*side)[round.as_usize()] = *confirmed;
            }
            FieldUpdate::Lineup {
                round,
                side,
                players,
            } => {
                if let Some(player) = players.iter().find(|p| !self.is_participant(*side, p)) {
                    return Err(MatchError::NotParticipant {
                        side: *side,
                        player: player.clone(),
                    });
                }
                let fallback = self.roster_lineup();
                self.lineup_history
                    .set_side(*round, *side, players.clone(), fallback.as_ref())?;
            }
            FieldUpdate::FramePlayer {
                round,
                position,
                side,
                player,
                log,
            } => {
                if self.is_locked(*round) {
                    return Err(MatchError::RoundLocked(*round));
                }
                if !self.is_participant(*side, player) {
                    return Err(MatchError::NotParticipant {
                        side: *side,
                        player: player.clone(),
                    });
                }
                let frame = self
                    .frame_mut(*round, *position)
                    .ok_or(MatchError::MissingFrame {
                        round: *round,
                        position: *position,
                    })?;
                frame.assign(*side, player.clone());
                if let Some(entry) = log {
                    frame.substitution_history.push(entry.clone());
                }
            }
            FieldUpdate::FrameResult {
                round,
                position,
                winner,
            } => {
                if self.is_locked(*round) {
                    return Err(MatchError::RoundLocked(*round));
                }
                self.frame_mut(*round, *position)
                    .ok_or(MatchError::MissingFrame {
                        round: *round,
                        position: *position,
                    })?
                    .record_result(*winner);
            }
            FieldUpdate::ExpectConfirmed { round } => {
                let index = round.as_usize();
                if !(self.home_confirmed[index] && self.away_confirmed[index]) {
                    return Err(MatchError::NotConfirmed(*round));
                }
            }
            FieldUpdate::SeatRound { round } => self.seat_round(*round)?,
        }
        Ok(())
    }

    fn seat_round(&mut self, round: RoundIndex) -> Result<(), MatchError> {
        if self.is_locked(round) {
            return Err(MatchError::RoundLocked(round));
        }
        let lineup = self
            .resolve_lineup(&self.lineup_history, round)
            .ok_or(MatchError::MissingLineup(round))?;
        if !self.lineup_history.contains(round) {
            self.lineup_history.set_round(round, lineup.clone())?;
        }
        for frame in self.frames.iter_mut().filter(|f| f.round() == round) {
            let position = frame.position();
            for side in TeamSide::both() {
                frame.assign(side, lineup.player_at(side, position).clone());
            }
        }
        Ok(())
    }
}
