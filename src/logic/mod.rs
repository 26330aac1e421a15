//! Match flow logic: eligibility, confirmations, the state machine and its store binding.

mod confirmation;
mod eligibility;
mod game_flow;
mod session;
mod store;

pub use confirmation::{confirmation_update, reset_updates, Confirmations};
pub use eligibility::{check_eligibility, eligible_candidates, is_eligible, Ineligible};
pub use game_flow::{
    derive_state, GameFlow, GameFlowError, GameFlowEvent, GameFlowState, GamePhase,
};
pub use session::MatchSession;
pub use store::{MatchStore, MemoryStore, Subscription, SyncError};
