//! The canonical match record shared by both captains, and its integrity rules.

use crate::models::frame::Frame;
use crate::models::lineup::{Lineup, LineupHistory, RoundLineup};
use crate::models::player::{PlayerId, TeamSide};
use crate::models::round::{Position, RoundIndex, POSITIONS, ROUNDS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Unique identifier for a match.
pub type MatchId = Uuid;

/// Errors raised when a record or a patch would break the record's invariants.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum MatchError {
    #[error("{side} team needs at least 4 registered players (has {count})")]
    NotEnoughParticipants { side: TeamSide, count: usize },
    #[error("player {0} is registered twice")]
    DuplicateParticipant(PlayerId),
    #[error("match must have 16 frames (has {0})")]
    FrameCount(usize),
    #[error("frame for {round} position {position} appears twice")]
    DuplicateFrame { round: RoundIndex, position: Position },
    #[error("no frame for {round} position {position}")]
    MissingFrame { round: RoundIndex, position: Position },
    #[error("frame for {round} position {position} has a mismatched away letter")]
    AwayPositionMismatch { round: RoundIndex, position: Position },
    #[error("{player} is listed twice in the {side} lineup for {round}")]
    DuplicateLineupPlayer {
        round: RoundIndex,
        side: TeamSide,
        player: PlayerId,
    },
    #[error("no lineup recorded for {0}")]
    MissingLineup(RoundIndex),
    #[error("the starting lineup cannot be changed")]
    StartingLineupImmutable,
    #[error("{player} is not a registered {side} player")]
    NotParticipant { side: TeamSide, player: PlayerId },
    #[error("{0} is locked")]
    RoundLocked(RoundIndex),
    #[error("the lineup after {0} is not confirmed by both teams")]
    NotConfirmed(RoundIndex),
}

/// Lifecycle status stored on the record.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
}

/// Full match record as persisted remotely.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    #[serde(default)]
    pub status: MatchStatus,
    /// Round open for scoring or substitution.
    pub current_round: RoundIndex,
    /// 16 frames, one per (round, position).
    pub frames: Vec<Frame>,
    #[serde(default)]
    pub round_locked: [bool; ROUNDS],
    #[serde(default)]
    pub home_confirmed: [bool; ROUNDS],
    #[serde(default)]
    pub away_confirmed: [bool; ROUNDS],
    pub lineup_history: LineupHistory,
    /// Registered players; the first four form the starting lineup.
    pub home_participants: Vec<PlayerId>,
    pub away_participants: Vec<PlayerId>,
    /// Bumped by the store on every write.
    #[serde(default)]
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl MatchRecord {
    /// Create a scheduled match. Every round's frames start with the starting
    /// lineup (the first four registered players of each team).
    pub fn new(
        home_participants: Vec<PlayerId>,
        away_participants: Vec<PlayerId>,
    ) -> Result<Self, MatchError> {
        check_participants(TeamSide::Home, &home_participants)?;
        check_participants(TeamSide::Away, &away_participants)?;

        let starting = RoundLineup::new(
            first_four(&home_participants),
            first_four(&away_participants),
        );
        let frames = RoundIndex::all()
            .flat_map(|round| {
                let starting = &starting;
                Position::all().map(move |position| {
                    Frame::new(
                        round,
                        position,
                        starting.player_at(TeamSide::Home, position).clone(),
                        starting.player_at(TeamSide::Away, position).clone(),
                    )
                })
            })
            .collect();

        Ok(Self {
            id: Uuid::new_v4(),
            status: MatchStatus::Scheduled,
            current_round: RoundIndex::FIRST,
            frames,
            round_locked: [false; ROUNDS],
            home_confirmed: [false; ROUNDS],
            away_confirmed: [false; ROUNDS],
            lineup_history: LineupHistory::starting(starting),
            home_participants,
            away_participants,
            version: 0,
            updated_at: Utc::now(),
        })
    }

    pub fn frame(&self, round: RoundIndex, position: Position) -> Option<&Frame> {
        self.frames
            .iter()
            .find(|f| f.round() == round && f.position() == position)
    }

    pub fn frame_mut(&mut self, round: RoundIndex, position: Position) -> Option<&mut Frame> {
        self.frames
            .iter_mut()
            .find(|f| f.round() == round && f.position() == position)
    }

    pub fn round_frames(&self, round: RoundIndex) -> impl Iterator<Item = &Frame> {
        self.frames.iter().filter(move |f| f.round() == round)
    }

    /// All four of the round's frames exist and are complete.
    pub fn is_round_complete(&self, round: RoundIndex) -> bool {
        let mut count = 0;
        for frame in self.round_frames(round) {
            if !frame.is_complete {
                return false;
            }
            count += 1;
        }
        count == POSITIONS
    }

    pub fn is_locked(&self, round: RoundIndex) -> bool {
        self.round_locked[round.as_usize()]
    }

    pub fn all_rounds_locked(&self) -> bool {
        self.round_locked.iter().all(|locked| *locked)
    }

    pub fn confirmed(&self, side: TeamSide) -> &[bool; ROUNDS] {
        match side {
            TeamSide::Home => &self.home_confirmed,
            TeamSide::Away => &self.away_confirmed,
        }
    }

    pub fn confirmed_mut(&mut self, side: TeamSide) -> &mut [bool; ROUNDS] {
        match side {
            TeamSide::Home => &mut self.home_confirmed,
            TeamSide::Away => &mut self.away_confirmed,
        }
    }

    pub fn participants(&self, side: TeamSide) -> &[PlayerId] {
        match side {
            TeamSide::Home => &self.home_participants,
            TeamSide::Away => &self.away_participants,
        }
    }

    pub fn is_participant(&self, side: TeamSide, player: &str) -> bool {
        self.participants(side).iter().any(|p| p == player)
    }

    /// Starting lineup derived from the registered players alone.
    pub fn roster_lineup(&self) -> Option<RoundLineup> {
        if self.home_participants.len() < POSITIONS || self.away_participants.len() < POSITIONS {
            return None;
        }
        Some(RoundLineup::new(
            first_four(&self.home_participants),
            first_four(&self.away_participants),
        ))
    }

    /// Lineup in effect for `round` according to `history`, falling back to the
    /// registered roster when nothing at or before `round` is recorded.
    pub fn resolve_lineup(&self, history: &LineupHistory, round: RoundIndex) -> Option<RoundLineup> {
        match history.resolve(round) {
            Some(lineup) => Some(lineup.clone()),
            None => {
                log::warn!(
                    "match {}: no lineup recorded up to {}, using registered roster",
                    self.id,
                    round
                );
                self.roster_lineup()
            }
        }
    }

    /// Highest round any frame belongs to.
    pub fn max_frame_round(&self) -> RoundIndex {
        self.frames
            .iter()
            .map(Frame::round)
            .max()
            .unwrap_or(RoundIndex::LAST)
    }

    /// Check the record's structural invariants.
    pub fn validate(&self) -> Result<(), MatchError> {
        check_participants(TeamSide::Home, &self.home_participants)?;
        check_participants(TeamSide::Away, &self.away_participants)?;

        let mut seen = HashSet::new();
        for frame in &self.frames {
            if !seen.insert((frame.round(), frame.position())) {
                return Err(MatchError::DuplicateFrame {
                    round: frame.round(),
                    position: frame.position(),
                });
            }
            if !frame.positions_agree() {
                return Err(MatchError::AwayPositionMismatch {
                    round: frame.round(),
                    position: frame.position(),
                });
            }
        }
        if self.frames.len() != ROUNDS * POSITIONS {
            return Err(MatchError::FrameCount(self.frames.len()));
        }

        if self.lineup_history.starting_lineup().is_none() {
            return Err(MatchError::MissingLineup(RoundIndex::FIRST));
        }
        self.check_lineups()
    }

    pub(crate) fn check_lineups(&self) -> Result<(), MatchError> {
        match self.lineup_history.find_duplicate() {
            Some((round, side, player)) => Err(MatchError::DuplicateLineupPlayer {
                round,
                side,
                player,
            }),
            None => Ok(()),
        }
    }
}

fn check_participants(side: TeamSide, players: &[PlayerId]) -> Result<(), MatchError> {
    if players.len() < POSITIONS {
        return Err(MatchError::NotEnoughParticipants {
            side,
            count: players.len(),
        });
    }
    let mut seen = HashSet::new();
    for player in players {
        if !seen.insert(player) {
            return Err(MatchError::DuplicateParticipant(player.clone()));
        }
    }
    Ok(())
}

fn first_four(players: &[PlayerId]) -> Lineup {
    std::array::from_fn(|i| players[i].clone())
}
