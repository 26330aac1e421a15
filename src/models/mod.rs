//! Data structures for a league match: rounds, frames, lineups and the shared record.

mod frame;
mod lineup;
mod match_record;
mod patch;
mod player;
mod round;

pub use frame::{Frame, SubstitutionRecord};
pub use lineup::{Lineup, LineupHistory, RoundLineup};
pub use match_record::{MatchError, MatchId, MatchRecord, MatchStatus};
pub use patch::{FieldUpdate, MatchPatch};
pub use player::{PlayerId, TeamSide};
pub use round::{IndexOutOfRange, Position, RoundIndex, POSITIONS, ROUNDS};
