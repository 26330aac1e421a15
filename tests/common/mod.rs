//! Shared fixtures: a stored match and the two captains' sessions.

#![allow(dead_code)]

use league_match_flow::{
    FieldUpdate, MatchId, MatchPatch, MatchRecord, MatchSession, MatchStore, MemoryStore,
    Position, RoundIndex, TeamSide,
};
use std::sync::Arc;

pub fn round(n: u8) -> RoundIndex {
    RoundIndex::from_number(n).unwrap()
}

pub fn pos(i: u8) -> Position {
    Position::new(i).unwrap()
}

/// Six registered players per team: h1..h6 and a1..a6.
pub fn new_record() -> MatchRecord {
    let home = (1..=6).map(|i| format!("h{i}")).collect();
    let away = (1..=6).map(|i| format!("a{i}")).collect();
    MatchRecord::new(home, away).unwrap()
}

pub fn stored_match() -> (Arc<MemoryStore>, MatchId) {
    let store = Arc::new(MemoryStore::new());
    let id = store.insert(new_record()).unwrap().id;
    (store, id)
}

pub fn captain<S: MatchStore>(store: &Arc<S>, id: MatchId, name: &str) -> MatchSession<S> {
    MatchSession::open(store.clone(), id, Some(name.to_string())).unwrap()
}

/// Record results for the first `frames` positions of `round`.
pub fn score<S: MatchStore>(store: &S, id: MatchId, round: RoundIndex, frames: usize) {
    for position in Position::all().take(frames) {
        let patch = MatchPatch::from(FieldUpdate::FrameResult {
            round,
            position,
            winner: TeamSide::Home,
        });
        store.apply(id, &patch).unwrap();
    }
}

/// Score, lock, confirm and advance one round with no substitutions.
pub fn play_round<S: MatchStore>(
    store: &S,
    id: MatchId,
    home: &mut MatchSession<S>,
    away: &mut MatchSession<S>,
    round: RoundIndex,
) {
    play_round_with(store, id, home, away, round, &[], &[]);
}

/// Like [`play_round`], making each team's `(position, player)` substitutions
/// for the next round in order before confirming.
pub fn play_round_with<S: MatchStore>(
    store: &S,
    id: MatchId,
    home: &mut MatchSession<S>,
    away: &mut MatchSession<S>,
    round: RoundIndex,
    home_subs: &[(u8, &str)],
    away_subs: &[(u8, &str)],
) {
    score(store, id, round, 4);
    home.pump();
    home.lock_round(round).unwrap();
    if round.is_last() {
        return;
    }
    for &(position, player) in home_subs {
        home.make_substitution(pos(position), true, player, round)
            .unwrap();
    }
    away.pump();
    for &(position, player) in away_subs {
        away.make_substitution(pos(position), false, player, round)
            .unwrap();
    }
    away.confirm_away_lineup(round).unwrap();
    home.pump();
    home.confirm_home_lineup(round).unwrap();
    home.advance_round(round).unwrap();
    away.pump();
}
