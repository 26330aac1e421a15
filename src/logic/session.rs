//! One captain's client: a game-flow machine bound to a store subscription.
//!
//! Actions update the local state first, then write the resulting patch to the
//! store. A failed write is reported through `error` and the local state is
//! kept until the next snapshot replaces it. Snapshots are pulled from the
//! subscription with [`MatchSession::pump`].

use crate::logic::game_flow::{GameFlow, GameFlowError, GameFlowEvent, GameFlowState};
use crate::logic::store::{MatchStore, SyncError, Subscription};
use crate::models::{MatchId, MatchRecord, PlayerId, Position, RoundIndex};
use std::sync::Arc;

pub struct MatchSession<S: MatchStore> {
    match_id: MatchId,
    store: Arc<S>,
    subscription: Subscription,
    flow: GameFlow,
}

impl<S: MatchStore> MatchSession<S> {
    /// Subscribe to `match_id` and load its current record.
    pub fn open(store: Arc<S>, match_id: MatchId, actor: Option<String>) -> Result<Self, SyncError> {
        let subscription = store.subscribe(match_id)?;
        let flow = match actor {
            Some(actor) => GameFlow::with_actor(actor),
            None => GameFlow::new(),
        };
        let mut session = Self {
            match_id,
            store,
            subscription,
            flow,
        };
        session.pump();
        log::info!("session opened for match {}", match_id);
        Ok(session)
    }

    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    pub fn state(&self) -> &GameFlowState {
        self.flow.state()
    }

    pub fn flow(&self) -> &GameFlow {
        &self.flow
    }

    pub fn record(&self) -> Option<&MatchRecord> {
        self.flow.record()
    }

    /// Reconcile with the newest snapshot, if one arrived. Returns whether one did.
    pub fn pump(&mut self) -> bool {
        match self.subscription.latest() {
            Some(snapshot) => {
                self.reconcile(snapshot);
                true
            }
            None => false,
        }
    }

    /// Reconcile with a snapshot obtained some other way.
    pub fn reconcile(&mut self, snapshot: MatchRecord) {
        let event = GameFlowEvent::Reconcile {
            snapshot: Box::new(snapshot),
        };
        if let Err(err) = self.flow.dispatch(event) {
            log::warn!("match {}: snapshot not applied: {}", self.match_id, err);
        }
    }

    /// Apply a local event and write its patch to the store.
    pub fn dispatch(&mut self, event: GameFlowEvent) -> Result<(), GameFlowError> {
        let patch = self.flow.dispatch(event)?;
        if patch.is_empty() {
            return Ok(());
        }
        match self.store.apply(self.match_id, &patch) {
            Ok(record) => {
                log::debug!(
                    "match {}: wrote {} updates, store at v{}",
                    self.match_id,
                    patch.len(),
                    record.version
                );
                Ok(())
            }
            Err(err) => {
                log::warn!("match {}: write failed: {}", self.match_id, err);
                let err = GameFlowError::from(err);
                self.flow.record_error(&err);
                Err(err)
            }
        }
    }

    pub fn start_match(&mut self) -> Result<(), GameFlowError> {
        self.dispatch(GameFlowEvent::StartMatch)
    }

    pub fn complete_round(&mut self) -> Result<(), GameFlowError> {
        self.dispatch(GameFlowEvent::CompleteRound)
    }

    pub fn lock_round(&mut self, round_index: RoundIndex) -> Result<(), GameFlowError> {
        self.dispatch(GameFlowEvent::LockRound { round_index })
    }

    pub fn make_substitution(
        &mut self,
        position: Position,
        is_home_team: bool,
        player_id: impl Into<PlayerId>,
        round_index: RoundIndex,
    ) -> Result<(), GameFlowError> {
        self.dispatch(GameFlowEvent::MakeSubstitution {
            position,
            is_home_team,
            player_id: player_id.into(),
            round_index,
        })
    }

    pub fn confirm_home_lineup(&mut self, round_index: RoundIndex) -> Result<(), GameFlowError> {
        self.dispatch(GameFlowEvent::ConfirmHomeLineup { round_index })
    }

    pub fn confirm_away_lineup(&mut self, round_index: RoundIndex) -> Result<(), GameFlowError> {
        self.dispatch(GameFlowEvent::ConfirmAwayLineup { round_index })
    }

    pub fn edit_home_lineup(&mut self, round_index: RoundIndex) -> Result<(), GameFlowError> {
        self.dispatch(GameFlowEvent::EditHomeLineup { round_index })
    }

    pub fn edit_away_lineup(&mut self, round_index: RoundIndex) -> Result<(), GameFlowError> {
        self.dispatch(GameFlowEvent::EditAwayLineup { round_index })
    }

    pub fn advance_round(&mut self, round_index: RoundIndex) -> Result<(), GameFlowError> {
        self.dispatch(GameFlowEvent::AdvanceRound { round_index })
    }

    /// Local only; the record is left as it is.
    pub fn reset_game_flow(&mut self) {
        if let Err(err) = self.dispatch(GameFlowEvent::ResetGameFlow) {
            log::warn!("match {}: reset failed: {}", self.match_id, err);
        }
    }
}

impl<S: MatchStore> Drop for MatchSession<S> {
    fn drop(&mut self) {
        log::info!("session closed for match {}", self.match_id);
    }
}
