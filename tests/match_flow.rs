//! Integration tests for the two-captain match flow over a shared store.

mod common;

use common::{captain, play_round, pos, round, score, stored_match};
use league_match_flow::{
    FieldUpdate, GameFlowError, GamePhase, MatchError, MatchId, MatchPatch, MatchRecord,
    MatchSession, MatchStatus, MatchStore, MemoryStore, RoundIndex, Subscription, SyncError,
    TeamSide,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[test]
fn sessions_open_in_setup() {
    let (store, id) = stored_match();
    let home = captain(&store, id, "home");
    assert_eq!(home.state().state, GamePhase::Setup);
    assert_eq!(home.state().current_round, RoundIndex::FIRST);
    assert!(home.state().error.is_none());
    assert!(home.record().is_some());
}

#[test]
fn first_round_to_second_round() {
    let (store, id) = stored_match();
    let mut home = captain(&store, id, "home");
    let mut away = captain(&store, id, "away");

    home.start_match().unwrap();
    assert_eq!(home.state().state, GamePhase::ScoringRound);
    assert!(away.pump());
    assert_eq!(away.state().state, GamePhase::ScoringRound);

    score(store.as_ref(), id, RoundIndex::FIRST, 4);
    home.pump();
    assert_eq!(home.state().state, GamePhase::RoundCompleted);
    home.lock_round(RoundIndex::FIRST).unwrap();
    assert_eq!(home.state().state, GamePhase::SubstitutionPhase);

    // h5 comes in for h2 at position 1.
    home.make_substitution(pos(1), true, "h5", RoundIndex::FIRST)
        .unwrap();
    let staged = home.state().lineup_history.get(round(2)).unwrap();
    assert_eq!(staged.home_lineup, ["h1", "h5", "h3", "h4"]);

    away.pump();
    assert_eq!(away.state().state, GamePhase::SubstitutionPhase);
    assert_eq!(
        away.state().lineup_history.get(round(2)).unwrap().home_lineup,
        ["h1", "h5", "h3", "h4"]
    );

    home.confirm_home_lineup(RoundIndex::FIRST).unwrap();
    away.pump();
    assert_eq!(away.state().state, GamePhase::AwaitingConfirmations);
    away.confirm_away_lineup(RoundIndex::FIRST).unwrap();
    assert_eq!(away.state().state, GamePhase::TransitioningToNextRound);

    home.pump();
    assert_eq!(home.state().state, GamePhase::TransitioningToNextRound);
    home.advance_round(RoundIndex::FIRST).unwrap();
    assert_eq!(home.state().state, GamePhase::ScoringRound);
    assert_eq!(home.state().current_round.number(), 2);

    let record = store.load(id).unwrap();
    assert_eq!(record.current_round, round(2));
    let frame = record.frame(round(2), pos(1)).unwrap();
    assert_eq!(frame.home_player_id, "h5");
    assert_eq!(frame.substitution_history.len(), 1);
    assert_eq!(frame.substitution_history[0].performed_by.as_deref(), Some("home"));
    assert_eq!(
        record.lineup_history.starting_lineup().unwrap().home_lineup,
        ["h1", "h2", "h3", "h4"]
    );

    away.pump();
    assert_eq!(away.state().state, GamePhase::ScoringRound);
    assert_eq!(away.state().current_round, round(2));
}

#[test]
fn locking_requires_every_frame_scored() {
    let (store, id) = stored_match();
    let mut home = captain(&store, id, "home");
    home.start_match().unwrap();
    score(store.as_ref(), id, RoundIndex::FIRST, 3);
    home.pump();

    assert_eq!(
        home.lock_round(RoundIndex::FIRST),
        Err(GameFlowError::IncompleteRound(RoundIndex::FIRST))
    );
    assert_eq!(home.state().state, GamePhase::ScoringRound);
    assert!(home.state().error.is_some());
    assert!(!store.load(id).unwrap().is_locked(RoundIndex::FIRST));
    assert_eq!(
        home.complete_round(),
        Err(GameFlowError::IncompleteRound(RoundIndex::FIRST))
    );

    // Once the last frame is in, the snapshot completes the round and it can be locked.
    score(store.as_ref(), id, RoundIndex::FIRST, 4);
    home.pump();
    assert_eq!(home.state().state, GamePhase::RoundCompleted);
    home.lock_round(RoundIndex::FIRST).unwrap();
    assert!(store.load(id).unwrap().is_locked(RoundIndex::FIRST));
}

#[test]
fn results_entered_before_the_start_complete_the_round() {
    let (store, id) = stored_match();
    score(store.as_ref(), id, RoundIndex::FIRST, 4);
    let mut home = captain(&store, id, "home");
    assert_eq!(home.state().state, GamePhase::Setup);

    home.start_match().unwrap();
    assert_eq!(home.state().state, GamePhase::ScoringRound);
    let version = store.load(id).unwrap().version;
    home.complete_round().unwrap();
    assert_eq!(home.state().state, GamePhase::RoundCompleted);
    assert_eq!(store.load(id).unwrap().version, version);

    home.lock_round(RoundIndex::FIRST).unwrap();
    assert_eq!(home.state().state, GamePhase::SubstitutionPhase);
}

#[test]
fn advancing_needs_both_captains() {
    let (store, id) = stored_match();
    let mut home = captain(&store, id, "home");
    home.start_match().unwrap();
    score(store.as_ref(), id, RoundIndex::FIRST, 4);
    home.pump();
    home.lock_round(RoundIndex::FIRST).unwrap();
    home.confirm_home_lineup(RoundIndex::FIRST).unwrap();

    assert!(matches!(
        home.advance_round(RoundIndex::FIRST),
        Err(GameFlowError::InvalidState {
            state: GamePhase::AwaitingConfirmations,
            ..
        })
    ));
    assert_eq!(store.load(id).unwrap().current_round, RoundIndex::FIRST);
}

#[test]
fn all_rounds_locked_completes_the_match() {
    let (store, id) = stored_match();
    let mut home = captain(&store, id, "home");
    let mut away = captain(&store, id, "away");
    home.start_match().unwrap();
    away.pump();

    for r in RoundIndex::all() {
        play_round(store.as_ref(), id, &mut home, &mut away, r);
    }

    assert_eq!(home.state().state, GamePhase::MatchCompleted);
    away.pump();
    assert_eq!(away.state().state, GamePhase::MatchCompleted);
    assert_eq!(away.state().current_round, RoundIndex::LAST);

    let record = store.load(id).unwrap();
    assert!(record.all_rounds_locked());
    assert_eq!(record.status, MatchStatus::Completed);

    // A fresh client lands straight on the final state.
    let late = captain(&store, id, "spectator");
    assert_eq!(late.state().state, GamePhase::MatchCompleted);
}

#[test]
fn reset_is_local_until_the_next_snapshot() {
    let (store, id) = stored_match();
    let mut home = captain(&store, id, "home");
    home.start_match().unwrap();
    home.pump();
    let version = store.load(id).unwrap().version;

    home.reset_game_flow();
    assert_eq!(home.state().state, GamePhase::Setup);
    assert_eq!(store.load(id).unwrap().version, version);
    assert_eq!(store.load(id).unwrap().status, MatchStatus::InProgress);

    // Starting again rejoins the match on record without writing.
    home.start_match().unwrap();
    assert_eq!(home.state().state, GamePhase::ScoringRound);
    assert_eq!(store.load(id).unwrap().version, version);
}

#[test]
fn closing_a_session_releases_its_subscription() {
    let (store, id) = stored_match();
    let home = captain(&store, id, "home");
    let away = captain(&store, id, "away");
    assert_eq!(store.subscriber_count(id), 2);
    drop(home);
    assert_eq!(store.subscriber_count(id), 1);
    drop(away);
    assert_eq!(store.subscriber_count(id), 0);
}

#[test]
fn unknown_match_cannot_be_opened() {
    let store = Arc::new(MemoryStore::new());
    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        MatchSession::open(store, missing, None),
        Err(SyncError::NotFound(id)) if id == missing
    ));
}

/// Memory store whose writes can be switched off.
struct FlakyStore {
    inner: MemoryStore,
    offline: AtomicBool,
}

impl MatchStore for FlakyStore {
    fn load(&self, id: MatchId) -> Result<MatchRecord, SyncError> {
        self.inner.load(id)
    }

    fn apply(&self, id: MatchId, patch: &MatchPatch) -> Result<MatchRecord, SyncError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::Unavailable("offline".into()));
        }
        self.inner.apply(id, patch)
    }

    fn subscribe(&self, id: MatchId) -> Result<Subscription, SyncError> {
        self.inner.subscribe(id)
    }
}

#[test]
fn failed_write_keeps_optimistic_state_until_next_snapshot() {
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new(),
        offline: AtomicBool::new(false),
    });
    let id = store.inner.insert(common::new_record()).unwrap().id;
    let mut home = captain(&store, id, "home");
    home.start_match().unwrap();
    score(&store.inner, id, RoundIndex::FIRST, 4);
    home.pump();

    store.offline.store(true, Ordering::SeqCst);
    assert!(matches!(
        home.lock_round(RoundIndex::FIRST),
        Err(GameFlowError::Sync(SyncError::Unavailable(_)))
    ));
    assert_eq!(home.state().state, GamePhase::SubstitutionPhase);
    assert!(home
        .state()
        .error
        .as_deref()
        .is_some_and(|e| e.contains("offline")));
    assert!(!store.load(id).unwrap().is_locked(RoundIndex::FIRST));

    // The next snapshot restores what the store actually holds.
    store.offline.store(false, Ordering::SeqCst);
    let touch = MatchPatch::from(FieldUpdate::Status {
        status: MatchStatus::InProgress,
    });
    store.apply(id, &touch).unwrap();
    assert!(home.pump());
    assert_eq!(home.state().state, GamePhase::RoundCompleted);
    assert!(home.state().error.is_none());
}

#[test]
fn stale_snapshots_are_ignored() {
    let (store, id) = stored_match();
    let mut home = captain(&store, id, "home");
    let before_start = store.load(id).unwrap();
    home.start_match().unwrap();
    home.pump();

    home.reconcile(before_start);
    assert_eq!(home.state().state, GamePhase::ScoringRound);
}

/// Both captains confirmed round 1 and home has seen it; away has not acted since.
fn both_confirmed() -> (Arc<MemoryStore>, MatchId, MatchSession<MemoryStore>, MatchSession<MemoryStore>) {
    let (store, id) = stored_match();
    let mut home = captain(&store, id, "home");
    let mut away = captain(&store, id, "away");
    home.start_match().unwrap();
    score(store.as_ref(), id, RoundIndex::FIRST, 4);
    home.pump();
    home.lock_round(RoundIndex::FIRST).unwrap();
    home.confirm_home_lineup(RoundIndex::FIRST).unwrap();
    away.pump();
    away.confirm_away_lineup(RoundIndex::FIRST).unwrap();
    home.pump();
    assert_eq!(home.state().state, GamePhase::TransitioningToNextRound);
    (store, id, home, away)
}

#[test]
fn advance_keeps_a_late_opposing_substitution() {
    let (store, id, mut home, mut away) = both_confirmed();

    // Away re-opens, swaps a5 in and confirms again; home does not see it.
    away.edit_away_lineup(RoundIndex::FIRST).unwrap();
    away.make_substitution(pos(0), false, "a5", RoundIndex::FIRST)
        .unwrap();
    away.confirm_away_lineup(RoundIndex::FIRST).unwrap();

    home.advance_round(RoundIndex::FIRST).unwrap();

    let record = store.load(id).unwrap();
    assert_eq!(record.current_round, round(2));
    let lineup = record.lineup_history.get(round(2)).unwrap();
    assert_eq!(lineup.away_lineup, ["a5", "a2", "a3", "a4"]);
    assert_eq!(lineup.home_lineup, ["h1", "h2", "h3", "h4"]);
    for frame in record.round_frames(round(2)) {
        let position = frame.position();
        assert_eq!(&frame.away_player_id, lineup.player_at(TeamSide::Away, position));
        assert_eq!(&frame.home_player_id, lineup.player_at(TeamSide::Home, position));
    }

    home.pump();
    away.pump();
    assert_eq!(home.state(), away.state());
    assert_eq!(home.state().state, GamePhase::ScoringRound);
}

#[test]
fn advance_is_refused_once_a_team_reopens() {
    let (store, id, mut home, mut away) = both_confirmed();
    away.edit_away_lineup(RoundIndex::FIRST).unwrap();

    assert!(matches!(
        home.advance_round(RoundIndex::FIRST),
        Err(GameFlowError::Sync(SyncError::Rejected(
            MatchError::NotConfirmed(r)
        ))) if r == RoundIndex::FIRST
    ));
    assert_eq!(store.load(id).unwrap().current_round, RoundIndex::FIRST);

    // The next snapshot puts home back in the window.
    assert!(home.pump());
    assert_eq!(home.state().state, GamePhase::AwaitingConfirmations);
    assert!(home.state().error.is_none());
}
