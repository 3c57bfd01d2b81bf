//! # Coliseum Core Library
//!
//! Core business logic for Coliseum, a run-analytics engine for timed
//! group counting attempts. It ingests a stream of count events, tracks an
//! active attempt, samples throughput at fixed intervals, detects and times
//! two-person collaboration sub-runs, and finalizes each attempt into
//! durable per-team history with derived statistics.
//!
//! ## Architecture
//!
//! - **Run Session**: a deterministic state machine owning all
//!   attempt-scoped state; every method takes the current timestamp from
//!   the caller
//! - **Tracker**: the async coordinator serializing ingestion, sampler
//!   ticks, the attempt timeout, and finalization behind one lock
//! - **Storage**: JSON-based attempt history and lifetime ledger, plus
//!   TOML-based configuration
//! - **Leaderboards**: read-only query operations over persisted history
//!
//! ## Key Components
//!
//! - [`RunSession`]: attempt state machine and counter ledger
//! - [`RunTracker`]: concurrent coordinator and public entry point
//! - [`HistoryStore`]: durable history and lifetime totals
//! - [`Config`]: application configuration management

pub mod error;
pub mod events;
pub mod leaderboard;
pub mod roster;
pub mod run;
pub mod storage;
pub mod tracker;

pub use error::{ConfigError, StoreError};
pub use events::Event;
pub use roster::{ChannelId, ParticipantId, Roster, RosterConfig, TeamName};
pub use run::{AttemptSummary, RunSession, RunStatus, ScoreEntry};
pub use storage::{AttemptRecord, Config, HistoryStore, PairRunRecord, TrackerConfig};
pub use tracker::{RunTracker, StartOutcome};
