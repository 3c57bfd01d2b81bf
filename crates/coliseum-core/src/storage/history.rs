//! Durable attempt history and lifetime counter ledger.
//!
//! The store is one JSON document: lifetime totals per canonical
//! participant plus the append-only attempt history grouped by team. It is
//! the only state that survives attempt finalization and process restarts.
//!
//! Saving is atomic: the document is serialized fully, written to a temp
//! file, then renamed over the live file, so a failed write never commits a
//! partial snapshot. Loading is lenient: a missing or malformed file yields
//! empty defaults.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::data_dir;
use crate::error::StoreError;
use crate::roster::{ChannelId, ParticipantId, TeamName};

/// One finalized two-person collaboration sub-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRunRecord {
    pub channel: ChannelId,
    /// The two canonical participant ids, sorted.
    pub pair: [ParticipantId; 2],
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: u64,
}

/// Immutable summary of one finalized attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: Uuid,
    /// Sum of per-participant counts.
    pub correct: u64,
    /// Sum of per-team mistake counts.
    pub incorrect: u64,
    /// correct / (correct + incorrect) * 100; None when nothing was counted.
    pub accuracy: Option<f64>,
    /// Best sliding-window delta across every tracked channel.
    pub best_window: u64,
    /// Offset of that window from the attempt start, in seconds.
    pub best_window_start_secs: u64,
    /// Up to two top contributing display names of the bound team.
    pub top_names: Vec<String>,
    /// Every pair run observed during the attempt, flattened across channels.
    pub pair_runs: Vec<PairRunRecord>,
    pub recorded_at: DateTime<Utc>,
}

impl AttemptRecord {
    /// Longest pair run within this attempt, if any.
    pub fn longest_pair_run(&self) -> Option<&PairRunRecord> {
        self.pair_runs.iter().max_by_key(|r| r.duration_secs)
    }
}

/// Persistent state: lifetime ledger plus attempt history by team.
///
/// Maps are ordered so the serialized form is stable and save/load
/// round-trips byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStore {
    #[serde(default)]
    pub lifetime_totals: BTreeMap<ParticipantId, u64>,
    #[serde(default)]
    pub history_by_team: BTreeMap<TeamName, Vec<AttemptRecord>>,
}

impl HistoryStore {
    /// Default on-disk location: `run_data.json` in the data directory.
    pub fn default_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        Ok(data_dir()?.join("run_data.json"))
    }

    /// Load from `path`. Missing or malformed files yield an empty store
    /// rather than an error: prior history is simply absent.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Persist to `path` atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write/rename fails. The
    /// caller's in-memory store stays authoritative either way.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(self).map_err(StoreError::EncodeFailed)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|source| StoreError::WriteFailed {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| StoreError::CommitFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Increment a participant's lifetime total.
    pub fn add_lifetime(&mut self, id: &str) {
        *self.lifetime_totals.entry(id.to_string()).or_insert(0) += 1;
    }

    /// Decrement a participant's lifetime total, floored at zero.
    pub fn subtract_lifetime(&mut self, id: &str) {
        if let Some(total) = self.lifetime_totals.get_mut(id) {
            *total = total.saturating_sub(1);
        }
    }

    /// Append a finalized attempt to a team's history and return the
    /// attempt number within that team.
    pub fn append_attempt(&mut self, team: &str, record: AttemptRecord) -> usize {
        let runs = self.history_by_team.entry(team.to_string()).or_default();
        runs.push(record);
        runs.len()
    }

    /// Iterate (team, attempt number, record) over all history.
    pub fn attempts(&self) -> impl Iterator<Item = (&TeamName, usize, &AttemptRecord)> {
        self.history_by_team.iter().flat_map(|(team, runs)| {
            runs.iter()
                .enumerate()
                .map(move |(idx, run)| (team, idx + 1, run))
        })
    }
}
