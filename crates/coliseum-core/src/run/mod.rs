//! Attempt-scoped run analytics: the tick-aligned sampling series, the
//! per-channel pair-run detector, and the session aggregate tying them to
//! the ledger.

mod pair;
mod series;
mod session;

pub use pair::{ActivePairRun, PairDetector, PairRunState};
pub use series::ChannelSeries;
pub use session::{
    is_valid_count, AttemptSummary, FinalizedAttempt, RunSession, RunStatus, ScoreEntry,
};
