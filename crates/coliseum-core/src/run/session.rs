//! The session aggregate: counter ledger, event ingestor, and attempt
//! finalizer.
//!
//! All attempt-scoped state lives in one [`RunSession`] so a single
//! exclusive section keeps the ledger, "last contributor" signal, team
//! binding, series, and pair detectors mutually consistent. Every method is
//! synchronous and takes the current timestamp as a parameter; the async
//! coordinator in [`crate::tracker`] owns the lock and the clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::events::Event;
use crate::roster::{ChannelId, ParticipantId, Roster, TeamName};
use crate::run::pair::PairDetector;
use crate::run::series::ChannelSeries;
use crate::storage::{AttemptRecord, HistoryStore, PairRunRecord, TrackerConfig};

/// One participant's line on a leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub name: String,
    pub count: u64,
}

/// Read-only snapshot of the live attempt for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub active: bool,
    pub elapsed_secs: u64,
    pub correct: u64,
    pub incorrect: u64,
    pub accuracy: Option<f64>,
    pub leaderboard: Vec<ScoreEntry>,
}

/// Everything derived from one finalized attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub team: Option<TeamName>,
    /// Attempt number within the team's history (1 when teamless).
    pub attempt_number: usize,
    pub record: AttemptRecord,
    /// Per-participant counts, descending.
    pub leaderboard: Vec<ScoreEntry>,
    /// Up to two display names contributing most inside the best window.
    pub best_window_names: Vec<String>,
    pub longest_pair: Option<PairRunRecord>,
}

/// Result of [`RunSession::finalize`]: the summary plus the notification
/// events produced while force-closing pair runs.
#[derive(Debug, Clone)]
pub struct FinalizedAttempt {
    pub summary: AttemptSummary,
    pub events: Vec<Event>,
}

/// Whether message text is a valid count: trimmed, the first
/// whitespace-delimited token all digits. No sign, no decimals.
pub fn is_valid_count(text: &str) -> bool {
    let first = text.split_whitespace().next().unwrap_or("");
    !first.is_empty() && first.chars().all(|c| c.is_ascii_digit())
}

/// The concurrent state machine tracking one attempt, plus the lifetime
/// ledger it feeds.
#[derive(Debug)]
pub struct RunSession {
    config: TrackerConfig,
    roster: Roster,
    store: HistoryStore,

    active: bool,
    started_at: Option<DateTime<Utc>>,
    team: Option<TeamName>,
    last_contributor: Option<ParticipantId>,
    counts_by_participant: BTreeMap<ParticipantId, u64>,
    mistakes_by_team: BTreeMap<TeamName, u64>,
    counts_by_channel: BTreeMap<ChannelId, u64>,
    participant_counts_by_channel: BTreeMap<ChannelId, BTreeMap<ParticipantId, u64>>,
    series: BTreeMap<ChannelId, ChannelSeries>,
    detectors: BTreeMap<ChannelId, PairDetector>,
    ticks_taken: usize,
}

impl RunSession {
    pub fn new(config: TrackerConfig, roster: Roster, store: HistoryStore) -> Self {
        Self {
            config,
            roster,
            store,
            active: false,
            started_at: None,
            team: None,
            last_contributor: None,
            counts_by_participant: BTreeMap::new(),
            mistakes_by_team: BTreeMap::new(),
            counts_by_channel: BTreeMap::new(),
            participant_counts_by_channel: BTreeMap::new(),
            series: BTreeMap::new(),
            detectors: BTreeMap::new(),
            ticks_taken: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// The persistent state (lifetime ledger + history).
    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Start a new attempt. Returns true when one is already active, in
    /// which case nothing changes.
    pub fn begin(&mut self, now: DateTime<Utc>) -> bool {
        if self.active {
            return true;
        }
        self.reset_attempt_state();
        self.active = true;
        self.started_at = Some(now);
        for channel in self.config.tracked_channels.clone() {
            self.series.insert(channel.clone(), ChannelSeries::default());
            self.detectors.insert(
                channel.clone(),
                PairDetector::new(channel, self.config.detection_window_size),
            );
        }
        false
    }

    /// Apply one valid-count candidate. No-op (empty events) when no
    /// attempt is active, the channel is untracked, or the text does not
    /// parse as a count.
    pub fn record_count(
        &mut self,
        raw_id: &str,
        channel: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Vec<Event> {
        if !self.active || !self.series.contains_key(channel) || !is_valid_count(text) {
            return Vec::new();
        }

        let id = self.roster.resolve(raw_id);
        self.last_contributor = Some(id.clone());
        if self.team.is_none() {
            self.team = self.roster.team_of(&id).cloned();
        }

        *self.counts_by_participant.entry(id.clone()).or_insert(0) += 1;
        self.store.add_lifetime(&id);
        *self
            .counts_by_channel
            .entry(channel.to_string())
            .or_insert(0) += 1;
        *self
            .participant_counts_by_channel
            .entry(channel.to_string())
            .or_default()
            .entry(id.clone())
            .or_insert(0) += 1;

        match self.detectors.get_mut(channel) {
            Some(detector) => detector.push_sender(&id, now),
            None => Vec::new(),
        }
    }

    /// Apply a correction: the most recent valid contributor loses one
    /// count (attempt and lifetime, floored at zero) and their team gains a
    /// mistake. Returns false when there is no prior contributor.
    pub fn record_correction(&mut self) -> bool {
        if !self.active {
            return false;
        }
        let Some(id) = self.last_contributor.clone() else {
            return false;
        };
        if let Some(count) = self.counts_by_participant.get_mut(&id) {
            *count = count.saturating_sub(1);
        }
        self.store.subtract_lifetime(&id);
        if let Some(team) = self.roster.team_of(&id).cloned() {
            *self.mistakes_by_team.entry(team).or_insert(0) += 1;
        }
        true
    }

    /// Append one snapshot to every tracked channel's series, then run the
    /// pair-run warning and termination checks. One atomic unit of work.
    pub fn sample_tick(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        if !self.active || self.ticks_taken > self.config.max_ticks() {
            return Vec::new();
        }
        static EMPTY: BTreeMap<ParticipantId, u64> = BTreeMap::new();
        for (channel, series) in self.series.iter_mut() {
            let total = self.counts_by_channel.get(channel).copied().unwrap_or(0);
            let totals = self
                .participant_counts_by_channel
                .get(channel)
                .unwrap_or(&EMPTY);
            series.sample(total, totals);
        }
        self.ticks_taken += 1;

        let mut events = Vec::new();
        for (channel, detector) in self.detectors.iter_mut() {
            if let Some(series) = self.series.get(channel) {
                events.extend(detector.check_activity(series, &self.config, now));
            }
        }
        events
    }

    /// Live status for read-only display.
    pub fn status(&self, now: DateTime<Utc>) -> RunStatus {
        let correct: u64 = self.counts_by_participant.values().sum();
        let incorrect: u64 = self.mistakes_by_team.values().sum();
        RunStatus {
            active: self.active,
            elapsed_secs: self
                .started_at
                .map(|start| (now - start).num_seconds().max(0) as u64)
                .unwrap_or(0),
            correct,
            incorrect,
            accuracy: accuracy_pct(correct, incorrect),
            leaderboard: self.leaderboard(),
        }
    }

    /// Close out the attempt: derive statistics, record history, reset all
    /// attempt-scoped state. Idempotent: a second caller observes the
    /// inactive attempt and gets None.
    pub fn finalize(&mut self, now: DateTime<Utc>, persist: bool) -> Option<FinalizedAttempt> {
        if !self.active {
            return None;
        }
        self.active = false;

        let leaderboard = self.leaderboard();
        let correct: u64 = self.counts_by_participant.values().sum();
        let incorrect: u64 = self.mistakes_by_team.values().sum();
        let accuracy = accuracy_pct(correct, incorrect);

        // Best fixed-duration window across all channels. Strict comparison
        // keeps the first maximum: lowest start index, first channel in
        // sorted order.
        let window_ticks = self.config.best_window_ticks();
        let mut best: Option<(&ChannelId, usize, u64)> = None;
        for (channel, series) in &self.series {
            if let Some((start, delta)) = series.best_window(window_ticks) {
                if delta > best.map_or(0, |(_, _, d)| d) {
                    best = Some((channel, start, delta));
                }
            }
        }
        let (best_window, best_window_start_secs, best_window_names) = match best {
            Some((channel, start, delta)) => {
                let names = self.series[channel]
                    .window_contributors(start, window_ticks)
                    .into_iter()
                    .take(2)
                    .map(|(id, _)| self.roster.display_name(&id))
                    .collect();
                (delta, start as u64 * self.config.tick_interval_secs, names)
            }
            None => (0, 0, Vec::new()),
        };

        let top_names: Vec<String> = match &self.team {
            Some(team) => self
                .counts_sorted()
                .into_iter()
                .filter(|(id, _)| self.roster.team_of(id) == Some(team))
                .take(2)
                .map(|(id, _)| self.roster.display_name(&id))
                .collect(),
            None => Vec::new(),
        };

        // Force-close any still-active pair runs before flattening.
        let mut events = Vec::new();
        for detector in self.detectors.values_mut() {
            if let Some(ended) = detector.force_finalize(now) {
                events.push(ended);
            }
        }
        let pair_runs: Vec<PairRunRecord> = self
            .detectors
            .values()
            .flat_map(|d| d.history().iter().cloned())
            .collect();

        let record = AttemptRecord {
            id: Uuid::new_v4(),
            correct,
            incorrect,
            accuracy,
            best_window,
            best_window_start_secs,
            top_names,
            pair_runs,
            recorded_at: now,
        };
        let longest_pair = record.longest_pair_run().cloned();

        let team = self.team.clone();
        let attempt_number = match (&team, persist) {
            (Some(team), true) => self.store.append_attempt(team, record.clone()),
            (Some(team), false) => {
                self.store
                    .history_by_team
                    .get(team.as_str())
                    .map_or(0, Vec::len)
                    + 1
            }
            (None, _) => 1,
        };

        self.reset_attempt_state();

        Some(FinalizedAttempt {
            summary: AttemptSummary {
                team,
                attempt_number,
                record,
                leaderboard,
                best_window_names,
                longest_pair,
            },
            events,
        })
    }

    fn leaderboard(&self) -> Vec<ScoreEntry> {
        self.counts_sorted()
            .into_iter()
            .map(|(id, count)| ScoreEntry {
                name: self.roster.display_name(&id),
                count,
            })
            .collect()
    }

    fn counts_sorted(&self) -> Vec<(ParticipantId, u64)> {
        let mut items: Vec<(ParticipantId, u64)> = self
            .counts_by_participant
            .iter()
            .map(|(id, &count)| (id.clone(), count))
            .collect();
        items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        items
    }

    fn reset_attempt_state(&mut self) {
        self.started_at = None;
        self.team = None;
        self.last_contributor = None;
        self.counts_by_participant.clear();
        self.mistakes_by_team.clear();
        self.counts_by_channel.clear();
        self.participant_counts_by_channel.clear();
        self.series.clear();
        self.detectors.clear();
        self.ticks_taken = 0;
    }
}

fn accuracy_pct(correct: u64, incorrect: u64) -> Option<f64> {
    let total = correct + incorrect;
    if total == 0 {
        None
    } else {
        Some(correct as f64 / total as f64 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::RosterConfig;

    fn make_session() -> RunSession {
        let config = TrackerConfig {
            tracked_channels: vec!["classic".into(), "contando".into()],
            detection_window_size: 4,
            ..TrackerConfig::default()
        };
        let mut roster_cfg = RosterConfig::default();
        roster_cfg
            .teams
            .insert("Alpha".into(), vec!["alice".into(), "bob".into()]);
        roster_cfg
            .teams
            .insert("Beta".into(), vec!["carol".into()]);
        roster_cfg.aliases.insert("alice-alt".into(), "alice".into());
        roster_cfg.nicknames.insert("alice".into(), "Alice".into());
        RunSession::new(config, Roster::new(roster_cfg), HistoryStore::default())
    }

    #[test]
    fn count_token_validation() {
        assert!(is_valid_count("12"));
        assert!(is_valid_count("  12"));
        assert!(is_valid_count("12 that was close"));
        assert!(!is_valid_count(""));
        assert!(!is_valid_count("   "));
        assert!(!is_valid_count("+12"));
        assert!(!is_valid_count("12.5"));
        assert!(!is_valid_count("twelve"));
        assert!(!is_valid_count("a12"));
    }

    #[test]
    fn counts_ignored_without_active_attempt() {
        let mut session = make_session();
        session.record_count("alice", "classic", "1", Utc::now());
        assert!(session.store().lifetime_totals.is_empty());
    }

    #[test]
    fn counts_ignored_for_untracked_channel_and_bad_text() {
        let mut session = make_session();
        let now = Utc::now();
        session.begin(now);
        session.record_count("alice", "lobby", "1", now);
        session.record_count("alice", "classic", "one", now);
        assert_eq!(session.status(now).correct, 0);
    }

    #[test]
    fn begin_twice_reports_already_active() {
        let mut session = make_session();
        let now = Utc::now();
        assert!(!session.begin(now));
        assert!(session.begin(now));
    }

    #[test]
    fn aliases_accumulate_into_one_counter() {
        let mut session = make_session();
        let now = Utc::now();
        session.begin(now);
        session.record_count("alice", "classic", "1", now);
        session.record_count("alice-alt", "classic", "2", now);
        assert_eq!(session.store().lifetime_totals["alice"], 2);
        assert_eq!(session.status(now).correct, 2);
        assert_eq!(session.status(now).leaderboard.len(), 1);
    }

    #[test]
    fn sum_of_counts_equals_number_of_valid_events() {
        let mut session = make_session();
        let now = Utc::now();
        session.begin(now);
        let senders = ["alice", "bob", "carol", "alice-alt", "dave"];
        for (i, sender) in senders.iter().cycle().take(25).enumerate() {
            session.record_count(sender, "classic", &format!("{i}"), now);
        }
        let status = session.status(now);
        assert_eq!(status.correct, 25);
        let lifetime: u64 = session.store().lifetime_totals.values().sum();
        assert_eq!(lifetime, 25);
    }

    #[test]
    fn team_binds_on_first_valid_count_and_stays() {
        let mut session = make_session();
        let now = Utc::now();
        session.begin(now);
        session.record_count("carol", "classic", "1", now);
        session.record_count("alice", "classic", "2", now);
        let done = session.finalize(now, false).unwrap();
        assert_eq!(done.summary.team.as_deref(), Some("Beta"));
    }

    #[test]
    fn correction_hits_last_contributor_and_team_mistakes() {
        let mut session = make_session();
        let now = Utc::now();
        session.begin(now);
        session.record_count("alice", "classic", "1", now);
        session.record_count("bob", "classic", "2", now);
        assert!(session.record_correction());

        let status = session.status(now);
        assert_eq!(status.correct, 1);
        assert_eq!(status.incorrect, 1);
        assert_eq!(session.store().lifetime_totals["bob"], 0);
        assert_eq!(session.store().lifetime_totals["alice"], 1);
    }

    #[test]
    fn correction_without_contributor_is_noop() {
        let mut session = make_session();
        session.begin(Utc::now());
        assert!(!session.record_correction());
    }

    #[test]
    fn correction_floors_at_zero() {
        let mut session = make_session();
        let now = Utc::now();
        session.begin(now);
        session.record_count("alice", "classic", "1", now);
        assert!(session.record_correction());
        assert!(session.record_correction());
        let status = session.status(now);
        assert_eq!(status.correct, 0);
        assert_eq!(status.incorrect, 2);
        assert_eq!(session.store().lifetime_totals["alice"], 0);
    }

    #[test]
    fn sampling_builds_equal_length_series_and_detects_pairs() {
        let mut session = make_session();
        let now = Utc::now();
        session.begin(now);
        session.sample_tick(now);

        let mut events = Vec::new();
        for i in 0..4 {
            let sender = if i % 2 == 0 { "alice" } else { "bob" };
            events.extend(session.record_count(sender, "classic", "1", now));
        }
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::PairRunStarted { .. })));
    }

    #[test]
    fn finalize_computes_scenario_statistics() {
        let mut session = make_session();
        let now = Utc::now();
        session.begin(now);
        for text in ["1", "2", "3"] {
            session.record_count("alice", "classic", text, now);
        }
        let done = session.finalize(now, true).unwrap();

        assert_eq!(done.summary.record.correct, 3);
        assert_eq!(done.summary.record.incorrect, 0);
        assert_eq!(done.summary.record.accuracy, Some(100.0));
        assert_eq!(done.summary.team.as_deref(), Some("Alpha"));
        assert_eq!(done.summary.attempt_number, 1);
        assert_eq!(done.summary.record.top_names, vec!["Alice".to_string()]);
        assert_eq!(session.store().history_by_team["Alpha"].len(), 1);
    }

    #[test]
    fn finalize_twice_appends_exactly_one_record() {
        let mut session = make_session();
        let now = Utc::now();
        session.begin(now);
        session.record_count("alice", "classic", "1", now);
        assert!(session.finalize(now, true).is_some());
        assert!(session.finalize(now, true).is_none());
        assert_eq!(session.store().history_by_team["Alpha"].len(), 1);
    }

    #[test]
    fn finalize_without_persist_keeps_history_untouched() {
        let mut session = make_session();
        let now = Utc::now();
        session.begin(now);
        session.record_count("alice", "classic", "1", now);
        let done = session.finalize(now, false).unwrap();
        assert_eq!(done.summary.attempt_number, 1);
        assert!(session.store().history_by_team.is_empty());
        // Lifetime ledger mutations are not rolled back.
        assert_eq!(session.store().lifetime_totals["alice"], 1);
    }

    #[test]
    fn finalize_closes_active_pair_runs_into_the_record() {
        let mut session = make_session();
        let now = Utc::now();
        session.begin(now);
        for i in 0..4 {
            let sender = if i % 2 == 0 { "alice" } else { "bob" };
            session.record_count(sender, "classic", "1", now);
        }
        let end = now + chrono::Duration::seconds(120);
        let done = session.finalize(end, true).unwrap();

        assert_eq!(done.summary.record.pair_runs.len(), 1);
        assert_eq!(done.summary.record.pair_runs[0].duration_secs, 120);
        assert!(done
            .events
            .iter()
            .any(|e| matches!(e, Event::PairRunEnded { .. })));
        assert_eq!(
            done.summary.longest_pair.as_ref().map(|r| r.duration_secs),
            Some(120)
        );
    }

    #[test]
    fn best_window_prefers_first_seen_channel_on_lower_delta() {
        let mut session = make_session();
        let config = TrackerConfig {
            tracked_channels: vec!["classic".into(), "contando".into()],
            best_window_secs: 20,
            tick_interval_secs: 10,
            ..TrackerConfig::default()
        };
        session.config = config;
        let now = Utc::now();
        session.begin(now);

        // classic ramps faster than contando.
        for i in 0..6u64 {
            for _ in 0..(i * 3) {
                session.record_count("alice", "classic", "1", now);
            }
            for _ in 0..i {
                session.record_count("carol", "contando", "1", now);
            }
            session.sample_tick(now);
        }
        let done = session.finalize(now, false).unwrap();
        assert!(done.summary.record.best_window > 0);
        assert_eq!(done.summary.best_window_names, vec!["Alice".to_string()]);
    }

    proptest::proptest! {
        #[test]
        fn ledger_and_lifetime_totals_stay_in_sync(
            ops in proptest::collection::vec((0usize..4, proptest::bool::ANY), 0..60),
        ) {
            let mut session = make_session();
            let now = Utc::now();
            session.begin(now);
            let senders = ["alice", "bob", "carol", "alice-alt"];
            let mut valid = 0u64;
            for (idx, correction) in ops {
                if correction {
                    session.record_correction();
                } else {
                    session.record_count(senders[idx], "classic", "1", now);
                    valid += 1;
                }
            }
            let status = session.status(now);
            let lifetime: u64 = session.store().lifetime_totals.values().sum();
            proptest::prop_assert_eq!(status.correct, lifetime);
            proptest::prop_assert!(status.correct <= valid);
        }
    }

    #[test]
    fn accuracy_is_none_when_nothing_counted() {
        let mut session = make_session();
        let now = Utc::now();
        session.begin(now);
        let done = session.finalize(now, true).unwrap();
        assert_eq!(done.summary.record.accuracy, None);
        assert!(done.summary.team.is_none());
        // Teamless attempts are never persisted.
        assert!(session.store().history_by_team.is_empty());
    }
}
