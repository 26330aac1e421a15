//! Match game-flow state machine.
//!
//! One instance per client. Local events are checked against the latest match
//! record, applied to the local copy straight away, and returned as a patch for
//! the caller to write to the store. Snapshots pushed by the store rebuild the
//! whole state from the record alone, so two clients looking at the same record
//! always agree, whatever they did locally before.

use crate::logic::confirmation::{confirmation_update, reset_updates, Confirmations};
use crate::logic::eligibility::{self, Ineligible};
use crate::logic::store::SyncError;
use crate::models::{
    FieldUpdate, LineupHistory, MatchError, MatchPatch, MatchRecord, MatchStatus, PlayerId,
    Position, RoundIndex, SubstitutionRecord, TeamSide,
};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Where the match stands from one client's point of view.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    #[default]
    Setup,
    ScoringRound,
    RoundCompleted,
    SubstitutionPhase,
    AwaitingConfirmations,
    TransitioningToNextRound,
    MatchCompleted,
}

impl GamePhase {
    /// Between locking a round and advancing past it.
    pub fn is_substitution_window(self) -> bool {
        matches!(
            self,
            GamePhase::SubstitutionPhase
                | GamePhase::AwaitingConfirmations
                | GamePhase::TransitioningToNextRound
        )
    }
}

/// Everything that can happen to the machine. All but `Reconcile` come from
/// the captain using this client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameFlowEvent {
    StartMatch,
    CompleteRound,
    LockRound {
        round_index: RoundIndex,
    },
    MakeSubstitution {
        position: Position,
        is_home_team: bool,
        player_id: PlayerId,
        round_index: RoundIndex,
    },
    ConfirmHomeLineup {
        round_index: RoundIndex,
    },
    ConfirmAwayLineup {
        round_index: RoundIndex,
    },
    EditHomeLineup {
        round_index: RoundIndex,
    },
    EditAwayLineup {
        round_index: RoundIndex,
    },
    AdvanceRound {
        round_index: RoundIndex,
    },
    ResetGameFlow,
    /// A new copy of the record arrived from the store.
    Reconcile {
        snapshot: Box<MatchRecord>,
    },
}

impl GameFlowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GameFlowEvent::StartMatch => "START_MATCH",
            GameFlowEvent::CompleteRound => "COMPLETE_ROUND",
            GameFlowEvent::LockRound { .. } => "LOCK_ROUND",
            GameFlowEvent::MakeSubstitution { .. } => "MAKE_SUBSTITUTION",
            GameFlowEvent::ConfirmHomeLineup { .. } => "CONFIRM_HOME_LINEUP",
            GameFlowEvent::ConfirmAwayLineup { .. } => "CONFIRM_AWAY_LINEUP",
            GameFlowEvent::EditHomeLineup { .. } => "EDIT_HOME_LINEUP",
            GameFlowEvent::EditAwayLineup { .. } => "EDIT_AWAY_LINEUP",
            GameFlowEvent::AdvanceRound { .. } => "ADVANCE_ROUND",
            GameFlowEvent::ResetGameFlow => "RESET_GAME_FLOW",
            GameFlowEvent::Reconcile { .. } => "RECONCILE",
        }
    }
}

/// Local view of the match. Rebuilt from every snapshot; never persisted.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GameFlowState {
    pub state: GamePhase,
    pub current_round: RoundIndex,
    pub home_team_confirmed: bool,
    pub away_team_confirmed: bool,
    /// Lineups including substitutions staged on this client.
    pub lineup_history: LineupHistory,
    pub error: Option<String>,
}

impl GameFlowState {
    pub fn confirmations(&self) -> Confirmations {
        Confirmations {
            home: self.home_team_confirmed,
            away: self.away_team_confirmed,
        }
    }

    fn set_confirmations(&mut self, confirmations: Confirmations) {
        self.home_team_confirmed = confirmations.home;
        self.away_team_confirmed = confirmations.away;
    }
}

/// Why an event was rejected.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum GameFlowError {
    #[error("{event} is not allowed in state {state:?}")]
    InvalidState {
        event: &'static str,
        state: GamePhase,
    },
    #[error("no match record received yet")]
    NoSnapshot,
    #[error("{requested} is not the open round ({current} is)")]
    WrongRound {
        requested: RoundIndex,
        current: RoundIndex,
    },
    #[error("{0} is not fully scored")]
    IncompleteRound(RoundIndex),
    #[error("the {0} lineup is confirmed; edit it before making substitutions")]
    LineupConfirmed(TeamSide),
    #[error("{0} is the final round")]
    FinalRound(RoundIndex),
    #[error(transparent)]
    Ineligible(#[from] Ineligible),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("remote write failed: {0}")]
    Sync(#[from] SyncError),
}

/// Derive the local state a record implies. Pure: the same record always gives
/// the same state.
pub fn derive_state(record: &MatchRecord) -> GameFlowState {
    if let Err(err) = record.validate() {
        warn!("match {} failed integrity check: {}", record.id, err);
    }

    let mut state = GameFlowState {
        lineup_history: record.lineup_history.clone(),
        ..GameFlowState::default()
    };

    if record.all_rounds_locked() {
        state.state = GamePhase::MatchCompleted;
        state.current_round = record.max_frame_round();
        return state;
    }
    if record.status == MatchStatus::Scheduled {
        return state;
    }

    let round = record.current_round;
    let confirmations = Confirmations::for_round(record, round);
    state.current_round = round;
    state.set_confirmations(confirmations);
    state.state = if record.is_locked(round) {
        confirmations.phase()
    } else if record.is_round_complete(round) {
        GamePhase::RoundCompleted
    } else {
        GamePhase::ScoringRound
    };
    state
}

/// State container for one client: a single `dispatch` entry point and a
/// read-only view of the state.
#[derive(Clone, Debug, Default)]
pub struct GameFlow {
    state: GameFlowState,
    /// Latest snapshot with this client's accepted writes applied on top.
    record: Option<MatchRecord>,
    /// Latest snapshot exactly as received.
    last_snapshot: Option<MatchRecord>,
    /// Recorded as `performed_by` on substitutions.
    actor: Option<String>,
}

impl GameFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor(actor: impl Into<String>) -> Self {
        Self {
            actor: Some(actor.into()),
            ..Self::default()
        }
    }

    pub fn state(&self) -> &GameFlowState {
        &self.state
    }

    /// Local copy of the record, if a snapshot has arrived.
    pub fn record(&self) -> Option<&MatchRecord> {
        self.record.as_ref()
    }

    /// Eligibility against this client's staged lineups.
    pub fn is_eligible(
        &self,
        position: Position,
        is_home_team: bool,
        candidate: &str,
        round_index: RoundIndex,
    ) -> bool {
        self.record.as_ref().is_some_and(|record| {
            eligibility::is_eligible(
                record,
                &self.state.lineup_history,
                position,
                is_home_team,
                candidate,
                round_index,
            )
        })
    }

    /// Players who could fill `position` in the round after `round_index`.
    pub fn eligible_candidates(
        &self,
        position: Position,
        side: TeamSide,
        round_index: RoundIndex,
    ) -> Vec<PlayerId> {
        match &self.record {
            Some(record) => eligibility::eligible_candidates(
                record,
                &self.state.lineup_history,
                position,
                side,
                round_index,
            ),
            None => Vec::new(),
        }
    }

    /// Handle one event. Returns the writes to mirror to the store (empty for
    /// local-only events). A rejected event changes nothing but `error`.
    pub fn dispatch(&mut self, event: GameFlowEvent) -> Result<MatchPatch, GameFlowError> {
        let name = event.name();
        let local = !matches!(event, GameFlowEvent::Reconcile { .. });
        match self.handle(event) {
            Ok(patch) => {
                if local {
                    self.state.error = None;
                    debug!("{} accepted, now {:?}", name, self.state.state);
                }
                Ok(patch)
            }
            Err(err) => {
                debug!("{} rejected in {:?}: {}", name, self.state.state, err);
                self.state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Surface a failure that happened outside the machine (e.g. a failed write).
    /// Local state is kept as is.
    pub fn record_error(&mut self, err: &GameFlowError) {
        self.state.error = Some(err.to_string());
    }

    fn handle(&mut self, event: GameFlowEvent) -> Result<MatchPatch, GameFlowError> {
        match event {
            GameFlowEvent::StartMatch => self.start_match(),
            GameFlowEvent::CompleteRound => self.complete_round(),
            GameFlowEvent::LockRound { round_index } => self.lock_round(round_index),
            GameFlowEvent::MakeSubstitution {
                position,
                is_home_team,
                player_id,
                round_index,
            } => self.make_substitution(
                position,
                TeamSide::from_is_home(is_home_team),
                player_id,
                round_index,
            ),
            GameFlowEvent::ConfirmHomeLineup { round_index } => {
                self.set_confirmed(TeamSide::Home, round_index, true)
            }
            GameFlowEvent::ConfirmAwayLineup { round_index } => {
                self.set_confirmed(TeamSide::Away, round_index, true)
            }
            GameFlowEvent::EditHomeLineup { round_index } => {
                self.set_confirmed(TeamSide::Home, round_index, false)
            }
            GameFlowEvent::EditAwayLineup { round_index } => {
                self.set_confirmed(TeamSide::Away, round_index, false)
            }
            GameFlowEvent::AdvanceRound { round_index } => self.advance_round(round_index),
            GameFlowEvent::ResetGameFlow => {
                self.reset();
                Ok(MatchPatch::new())
            }
            GameFlowEvent::Reconcile { snapshot } => {
                self.reconcile(*snapshot);
                Ok(MatchPatch::new())
            }
        }
    }

    fn start_match(&mut self) -> Result<MatchPatch, GameFlowError> {
        self.expect_state("START_MATCH", &[GamePhase::Setup])?;
        let record = self.snapshot()?;
        if record.status != MatchStatus::Scheduled {
            // Already under way on the record: rejoin rather than restart it.
            info!("match {} already started; resuming from record", record.id);
            let mut state = derive_state(record);
            state.error = None;
            self.state = state;
            return Ok(MatchPatch::new());
        }

        let patch = MatchPatch::new()
            .with(FieldUpdate::Status {
                status: MatchStatus::InProgress,
            })
            .with(FieldUpdate::CurrentRound {
                round: RoundIndex::FIRST,
            });
        let id = self.apply_local(&patch)?;
        self.state.state = GamePhase::ScoringRound;
        self.state.current_round = RoundIndex::FIRST;
        info!("match {} started", id);
        Ok(patch)
    }

    fn complete_round(&mut self) -> Result<MatchPatch, GameFlowError> {
        self.expect_state("COMPLETE_ROUND", &[GamePhase::ScoringRound])?;
        let round = self.state.current_round;
        if !self.snapshot()?.is_round_complete(round) {
            return Err(GameFlowError::IncompleteRound(round));
        }
        self.state.state = GamePhase::RoundCompleted;
        Ok(MatchPatch::new())
    }

    fn lock_round(&mut self, round: RoundIndex) -> Result<MatchPatch, GameFlowError> {
        self.expect_state(
            "LOCK_ROUND",
            &[GamePhase::ScoringRound, GamePhase::RoundCompleted],
        )?;
        self.expect_round(round)?;
        if !self.snapshot()?.is_round_complete(round) {
            return Err(GameFlowError::IncompleteRound(round));
        }

        let mut patch = MatchPatch::from(FieldUpdate::RoundLocked {
            round,
            locked: true,
        });
        for update in reset_updates(round) {
            patch.push(update);
        }
        if round.is_last() {
            patch.push(FieldUpdate::Status {
                status: MatchStatus::Completed,
            });
        }
        let id = self.apply_local(&patch)?;

        self.state.set_confirmations(Confirmations::default());
        if round.is_last() {
            self.state.state = GamePhase::MatchCompleted;
            info!("match {}: {} locked, match completed", id, round);
        } else {
            self.state.state = GamePhase::SubstitutionPhase;
            info!("match {}: {} locked, substitutions open", id, round);
        }
        Ok(patch)
    }

    fn make_substitution(
        &mut self,
        position: Position,
        side: TeamSide,
        player: PlayerId,
        round: RoundIndex,
    ) -> Result<MatchPatch, GameFlowError> {
        self.expect_state(
            "MAKE_SUBSTITUTION",
            &[
                GamePhase::SubstitutionPhase,
                GamePhase::AwaitingConfirmations,
            ],
        )?;
        self.expect_round(round)?;
        if self.state.confirmations().get(side) {
            return Err(GameFlowError::LineupConfirmed(side));
        }

        let record = self.snapshot()?;
        eligibility::check_eligibility(
            record,
            &self.state.lineup_history,
            position,
            side,
            &player,
            round,
        )?;
        let target = round.next().ok_or(Ineligible::NoFollowingRound(round))?;

        let mut lineups = self.state.lineup_history.clone();
        let previous = lineups.stage(
            target,
            side,
            position,
            player.clone(),
            record.roster_lineup().as_ref(),
        )?;
        let staged = lineups
            .get(target)
            .map(|lineup| lineup.side(side).clone())
            .ok_or(MatchError::MissingLineup(target))?;

        let mut patch = MatchPatch::from(FieldUpdate::Lineup {
            round: target,
            side,
            players: staged,
        });
        let occupant = record
            .frame(target, position)
            .map(|frame| frame.player(side).clone())
            .unwrap_or_else(|| previous.clone());
        if occupant != player {
            patch.push(FieldUpdate::FramePlayer {
                round: target,
                position,
                side,
                player: player.clone(),
                log: Some(SubstitutionRecord {
                    timestamp: Utc::now(),
                    team: side,
                    position,
                    old_player_id: occupant,
                    new_player_id: player.clone(),
                    performed_by: self.actor.clone(),
                }),
            });
        }

        let id = self.apply_local(&patch)?;
        self.state.lineup_history = lineups;
        info!(
            "match {}: {} substitution for {} position {}: {} -> {}",
            id, side, target, position, previous, player
        );
        Ok(patch)
    }

    /// Confirm (`true`) or re-open (`false`) one team's lineup.
    fn set_confirmed(
        &mut self,
        side: TeamSide,
        round: RoundIndex,
        confirmed: bool,
    ) -> Result<MatchPatch, GameFlowError> {
        let event = match (side, confirmed) {
            (TeamSide::Home, true) => "CONFIRM_HOME_LINEUP",
            (TeamSide::Away, true) => "CONFIRM_AWAY_LINEUP",
            (TeamSide::Home, false) => "EDIT_HOME_LINEUP",
            (TeamSide::Away, false) => "EDIT_AWAY_LINEUP",
        };
        if !self.state.state.is_substitution_window() {
            return Err(GameFlowError::InvalidState {
                event,
                state: self.state.state,
            });
        }
        self.expect_round(round)?;

        let patch = MatchPatch::from(confirmation_update(side, round, confirmed));
        let id = self.apply_local(&patch)?;

        let mut confirmations = self.state.confirmations();
        confirmations.set(side, confirmed);
        self.state.set_confirmations(confirmations);
        self.state.state = confirmations.phase();
        info!(
            "match {}: {} lineup for {} {}",
            id,
            side,
            round,
            if confirmed { "confirmed" } else { "re-opened" }
        );
        Ok(patch)
    }

    /// Writes no lineup cells. The store re-checks both confirmations and
    /// seats the next round from its own lineups.
    fn advance_round(&mut self, round: RoundIndex) -> Result<MatchPatch, GameFlowError> {
        self.expect_state("ADVANCE_ROUND", &[GamePhase::TransitioningToNextRound])?;
        self.expect_round(round)?;
        let next = round.next().ok_or(GameFlowError::FinalRound(round))?;

        let patch = MatchPatch::new()
            .with(FieldUpdate::ExpectConfirmed { round })
            .with(FieldUpdate::SeatRound { round: next })
            .with(FieldUpdate::CurrentRound { round: next });
        let id = self.apply_local(&patch)?;

        let record = self.snapshot()?;
        let lineups = record.lineup_history.clone();
        let confirmations = Confirmations::for_round(record, next);
        self.state.lineup_history = lineups;
        self.state.current_round = next;
        self.state.set_confirmations(confirmations);
        self.state.state = GamePhase::ScoringRound;
        info!("match {}: advanced to {}", id, next);
        Ok(patch)
    }

    /// Back to `SETUP`. Keeps the starting lineup; the record is not touched.
    fn reset(&mut self) {
        self.state.state = GamePhase::Setup;
        self.state.current_round = RoundIndex::FIRST;
        self.state.set_confirmations(Confirmations::default());
        self.state.lineup_history.retain_starting();
        info!("game flow reset locally");
    }

    fn reconcile(&mut self, snapshot: MatchRecord) {
        if let Some(last) = &self.last_snapshot {
            if snapshot.version < last.version {
                debug!(
                    "match {}: ignoring stale snapshot v{} (have v{})",
                    snapshot.id, snapshot.version, last.version
                );
                return;
            }
            if *last == snapshot {
                debug!("match {}: snapshot v{} unchanged", snapshot.id, snapshot.version);
                return;
            }
        }

        let state = derive_state(&snapshot);
        if state.state != self.state.state || state.current_round != self.state.current_round {
            info!(
                "match {}: {:?} ({}) -> {:?} ({}) from snapshot v{}",
                snapshot.id,
                self.state.state,
                self.state.current_round,
                state.state,
                state.current_round,
                snapshot.version
            );
        }
        self.state = state;
        self.record = Some(snapshot.clone());
        self.last_snapshot = Some(snapshot);
    }

    fn snapshot(&self) -> Result<&MatchRecord, GameFlowError> {
        self.record.as_ref().ok_or(GameFlowError::NoSnapshot)
    }

    /// Apply an accepted patch to the local record copy. Returns the match id.
    fn apply_local(&mut self, patch: &MatchPatch) -> Result<uuid::Uuid, GameFlowError> {
        let record = self.record.as_mut().ok_or(GameFlowError::NoSnapshot)?;
        record.apply_patch(patch)?;
        Ok(record.id)
    }

    fn expect_state(&self, event: &'static str, allowed: &[GamePhase]) -> Result<(), GameFlowError> {
        if allowed.contains(&self.state.state) {
            Ok(())
        } else {
            Err(GameFlowError::InvalidState {
                event,
                state: self.state.state,
            })
        }
    }

    fn expect_round(&self, requested: RoundIndex) -> Result<(), GameFlowError> {
        if requested == self.state.current_round {
            Ok(())
        } else {
            Err(GameFlowError::WrongRound {
                requested,
                current: self.state.current_round,
            })
        }
    }
}
