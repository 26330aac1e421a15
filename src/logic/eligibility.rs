//! Substitution eligibility: may a player fill a position in the round after `round_index`?
//!
//! Rules, in order:
//! 1. The player must be registered for the team.
//! 2. The player must not already hold a different position in the target
//!    round. Already holding the requested position is a no-op and allowed.
//! 3. Round 2 (first window, round 1 as baseline): additionally, a player moved
//!    out of their round-1 slot into another slot cannot fill a third one.
//! 4. Rounds 3 and 4: a player leaving their previous-round slot cannot also be
//!    moved into another slot, and anyone who played the immediately preceding
//!    round must rest.
//!
//! Lineups are resolved through the lineup history; rounds without an entry
//! inherit the nearest earlier one, and the registered roster backs that up.

use crate::models::{
    LineupHistory, MatchRecord, PlayerId, Position, RoundIndex, RoundLineup, TeamSide,
};

/// Why a candidate cannot be substituted in.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Ineligible {
    #[error("no round follows {0}")]
    NoFollowingRound(RoundIndex),
    #[error("{player} is not a registered {side} player")]
    NotParticipant { side: TeamSide, player: PlayerId },
    #[error("no lineup available for {0}")]
    MissingLineup(RoundIndex),
    #[error("{player} already plays position {position} in {round}")]
    AlreadyInLineup {
        player: PlayerId,
        position: Position,
        round: RoundIndex,
    },
    #[error("{player} already moved from position {from} to {to} for round 2")]
    DoubleBooked {
        player: PlayerId,
        from: Position,
        to: Position,
    },
    #[error("{player} is being substituted out of position {from} and cannot move to another position")]
    OutMigrating {
        player: PlayerId,
        from: Position,
        round: RoundIndex,
    },
    #[error("{player} played in {round} and must sit out the next round")]
    MustRest { player: PlayerId, round: RoundIndex },
}

/// Whether `candidate` may fill `position` in round `round_index + 1` (0-based).
pub fn is_eligible(
    record: &MatchRecord,
    lineups: &LineupHistory,
    position: Position,
    is_home_team: bool,
    candidate: &str,
    round_index: RoundIndex,
) -> bool {
    let side = TeamSide::from_is_home(is_home_team);
    check_eligibility(record, lineups, position, side, candidate, round_index).is_ok()
}

/// Like [`is_eligible`], but reports the first rule the candidate fails.
pub fn check_eligibility(
    record: &MatchRecord,
    lineups: &LineupHistory,
    position: Position,
    side: TeamSide,
    candidate: &str,
    round_index: RoundIndex,
) -> Result<(), Ineligible> {
    let target = round_index
        .next()
        .ok_or(Ineligible::NoFollowingRound(round_index))?;

    if !record.is_participant(side, candidate) {
        return Err(Ineligible::NotParticipant {
            side,
            player: candidate.to_string(),
        });
    }

    let target_lineup = resolve(record, lineups, target)?;
    if target_lineup.player_at(side, position) == candidate {
        return Ok(());
    }
    let previous_lineup = resolve(record, lineups, round_index)?;

    if round_index == RoundIndex::FIRST {
        check_double_booking(&previous_lineup, &target_lineup, side, position, candidate)?;
        return check_single_position(&target_lineup, side, candidate, target);
    }

    check_single_position(&target_lineup, side, candidate, target)?;
    check_out_migration(
        &previous_lineup,
        &target_lineup,
        side,
        position,
        candidate,
        round_index,
    )?;
    check_rest(&previous_lineup, side, candidate, round_index)
}

/// Registered players of `side` who may fill `position` after `round_index`.
pub fn eligible_candidates(
    record: &MatchRecord,
    lineups: &LineupHistory,
    position: Position,
    side: TeamSide,
    round_index: RoundIndex,
) -> Vec<PlayerId> {
    record
        .participants(side)
        .iter()
        .filter(|p| check_eligibility(record, lineups, position, side, p, round_index).is_ok())
        .cloned()
        .collect()
}

fn resolve(
    record: &MatchRecord,
    lineups: &LineupHistory,
    round: RoundIndex,
) -> Result<RoundLineup, Ineligible> {
    record
        .resolve_lineup(lineups, round)
        .ok_or(Ineligible::MissingLineup(round))
}

fn check_single_position(
    target: &RoundLineup,
    side: TeamSide,
    candidate: &str,
    round: RoundIndex,
) -> Result<(), Ineligible> {
    match target.position_of(side, candidate) {
        Some(position) => Err(Ineligible::AlreadyInLineup {
            player: candidate.to_string(),
            position,
            round,
        }),
        None => Ok(()),
    }
}

/// A player vacated their round-1 slot and already took another one.
fn check_double_booking(
    baseline: &RoundLineup,
    target: &RoundLineup,
    side: TeamSide,
    position: Position,
    candidate: &str,
) -> Result<(), Ineligible> {
    let Some(from) = baseline.position_of(side, candidate) else {
        return Ok(());
    };
    if from == position || target.player_at(side, from) == candidate {
        return Ok(());
    }
    match target.position_of(side, candidate) {
        Some(to) if to != position => Err(Ineligible::DoubleBooked {
            player: candidate.to_string(),
            from,
            to,
        }),
        _ => Ok(()),
    }
}

fn check_out_migration(
    previous: &RoundLineup,
    target: &RoundLineup,
    side: TeamSide,
    position: Position,
    candidate: &str,
    previous_round: RoundIndex,
) -> Result<(), Ineligible> {
    match previous.position_of(side, candidate) {
        Some(from) if from != position && target.player_at(side, from) != candidate => {
            Err(Ineligible::OutMigrating {
                player: candidate.to_string(),
                from,
                round: previous_round,
            })
        }
        _ => Ok(()),
    }
}

fn check_rest(
    previous: &RoundLineup,
    side: TeamSide,
    candidate: &str,
    previous_round: RoundIndex,
) -> Result<(), Ineligible> {
    if previous.contains(side, candidate) {
        return Err(Ineligible::MustRest {
            player: candidate.to_string(),
            round: previous_round,
        });
    }
    Ok(())
}
