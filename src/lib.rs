//! Team league match flow: library with the match record model and game-flow logic.
//!
//! A match is four rounds of four frames between a home and an away team. Each
//! captain's client runs its own [`GameFlow`] against the shared [`MatchRecord`]:
//! rounds are scored and locked, substitutions are checked for eligibility,
//! both captains confirm the next lineup, and the match advances.

pub mod logic;
pub mod models;

pub use logic::{
    check_eligibility, derive_state, eligible_candidates, is_eligible, Confirmations, GameFlow,
    GameFlowError, GameFlowEvent, GameFlowState, GamePhase, Ineligible, MatchSession, MatchStore,
    MemoryStore, Subscription, SyncError,
};
pub use models::{
    FieldUpdate, Frame, Lineup, LineupHistory, MatchError, MatchId, MatchPatch, MatchRecord,
    MatchStatus, PlayerId, Position, RoundIndex, RoundLineup, SubstitutionRecord, TeamSide,
};
