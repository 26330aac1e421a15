//! Per-round lineups and the lineup history that tracks them across the match.
//!
//! Round 1's lineup is the starting roster and never changes. Later rounds get
//! an entry only once something is written to them; until then they resolve to
//! the nearest earlier recorded round.

use crate::models::match_record::MatchError;
use crate::models::player::{PlayerId, TeamSide};
use crate::models::round::{Position, RoundIndex, POSITIONS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One team's four players, indexed by position.
pub type Lineup = [PlayerId; POSITIONS];

/// Both teams' lineups for one round.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RoundLineup {
    pub home_lineup: Lineup,
    pub away_lineup: Lineup,
}

impl RoundLineup {
    pub fn new(home_lineup: Lineup, away_lineup: Lineup) -> Self {
        Self {
            home_lineup,
            away_lineup,
        }
    }

    pub fn side(&self, side: TeamSide) -> &Lineup {
        match side {
            TeamSide::Home => &self.home_lineup,
            TeamSide::Away => &self.away_lineup,
        }
    }

    pub fn side_mut(&mut self, side: TeamSide) -> &mut Lineup {
        match side {
            TeamSide::Home => &mut self.home_lineup,
            TeamSide::Away => &mut self.away_lineup,
        }
    }

    pub fn player_at(&self, side: TeamSide, position: Position) -> &PlayerId {
        &self.side(side)[position.as_usize()]
    }

    /// Position the player occupies on `side`, if any.
    pub fn position_of(&self, side: TeamSide, player: &str) -> Option<Position> {
        Position::all().find(|p| self.player_at(side, *p) == player)
    }

    pub fn contains(&self, side: TeamSide, player: &str) -> bool {
        self.position_of(side, player).is_some()
    }

    /// First player listed at two positions on `side`.
    pub fn duplicate_player(&self, side: TeamSide) -> Option<&PlayerId> {
        let lineup = self.side(side);
        lineup
            .iter()
            .enumerate()
            .find(|&(i, id)| lineup[i + 1..].contains(id))
            .map(|(_, id)| id)
    }
}

/// Lineups keyed by round. Copy-on-write: writing into a round seeds that
/// round from the nearest earlier one, never touching the earlier entry.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineupHistory(BTreeMap<RoundIndex, RoundLineup>);

impl LineupHistory {
    /// History holding only the starting roster.
    pub fn starting(lineup: RoundLineup) -> Self {
        let mut rounds = BTreeMap::new();
        rounds.insert(RoundIndex::FIRST, lineup);
        Self(rounds)
    }

    pub fn get(&self, round: RoundIndex) -> Option<&RoundLineup> {
        self.0.get(&round)
    }

    pub fn starting_lineup(&self) -> Option<&RoundLineup> {
        self.get(RoundIndex::FIRST)
    }

    pub fn contains(&self, round: RoundIndex) -> bool {
        self.0.contains_key(&round)
    }

    /// Lineup in effect for `round`: its own entry, else the nearest earlier one.
    pub fn resolve(&self, round: RoundIndex) -> Option<&RoundLineup> {
        self.0.range(..=round).next_back().map(|(_, lineup)| lineup)
    }

    pub fn rounds(&self) -> impl Iterator<Item = (RoundIndex, &RoundLineup)> {
        self.0.iter().map(|(round, lineup)| (*round, lineup))
    }

    /// Put `player` at one cell of `round`, creating the round's entry first if
    /// needed. Returns the player previously at that cell.
    ///
    /// `fallback` seeds the entry when no earlier round is recorded.
    pub fn stage(
        &mut self,
        round: RoundIndex,
        side: TeamSide,
        position: Position,
        player: PlayerId,
        fallback: Option<&RoundLineup>,
    ) -> Result<PlayerId, MatchError> {
        let entry = self.entry_for(round, fallback)?;
        let cell = &mut entry.side_mut(side)[position.as_usize()];
        Ok(std::mem::replace(cell, player))
    }

    /// Replace one team's whole lineup for `round`.
    pub fn set_side(
        &mut self,
        round: RoundIndex,
        side: TeamSide,
        lineup: Lineup,
        fallback: Option<&RoundLineup>,
    ) -> Result<(), MatchError> {
        let entry = self.entry_for(round, fallback)?;
        *entry.side_mut(side) = lineup;
        Ok(())
    }

    /// Record the complete lineup for a round, e.g. when a round begins.
    pub fn set_round(&mut self, round: RoundIndex, lineup: RoundLineup) -> Result<(), MatchError> {
        if round == RoundIndex::FIRST && self.contains(round) {
            return Err(MatchError::StartingLineupImmutable);
        }
        self.0.insert(round, lineup);
        Ok(())
    }

    /// Drop every entry except the starting roster.
    pub fn retain_starting(&mut self) {
        self.0.retain(|round, _| *round == RoundIndex::FIRST);
    }

    /// First (round, side, player) where a player is listed twice.
    pub fn find_duplicate(&self) -> Option<(RoundIndex, TeamSide, PlayerId)> {
        self.rounds().find_map(|(round, lineup)| {
            TeamSide::both().into_iter().find_map(|side| {
                lineup
                    .duplicate_player(side)
                    .map(|player| (round, side, player.clone()))
            })
        })
    }

    fn entry_for(
        &mut self,
        round: RoundIndex,
        fallback: Option<&RoundLineup>,
    ) -> Result<&mut RoundLineup, MatchError> {
        if round == RoundIndex::FIRST {
            return Err(MatchError::StartingLineupImmutable);
        }
        if !self.contains(round) {
            let seed = self
                .resolve(round)
                .or(fallback)
                .cloned()
                .ok_or(MatchError::MissingLineup(round))?;
            log::debug!("seeding lineup for {} from earlier round", round);
            self.0.insert(round, seed);
        }
        self.0
            .get_mut(&round)
            .ok_or(MatchError::MissingLineup(round))
    }
}
