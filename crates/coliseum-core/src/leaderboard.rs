//! Read-only leaderboard queries over persisted history.
//!
//! All functions here are pure over [`HistoryStore`] and [`Roster`]; they
//! never mutate state. Rankings are stable sorts, so equal values keep
//! team-alphabetical, attempt-chronological order.

use serde::Serialize;

use crate::roster::{Roster, TeamName};
use crate::storage::HistoryStore;

/// Lifetime totals line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifetimeEntry {
    pub name: String,
    pub team: Option<TeamName>,
    pub total: u64,
}

/// Per-attempt accuracy line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyEntry {
    pub team: TeamName,
    pub attempt: usize,
    pub accuracy: f64,
}

/// Per-attempt correct-count line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumbersEntry {
    pub team: TeamName,
    pub attempt: usize,
    pub correct: u64,
}

/// Per-attempt best-window line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FastestEntry {
    pub team: TeamName,
    pub attempt: usize,
    pub best_window: u64,
    pub top_names: Vec<String>,
}

/// Per-attempt longest-pair-run line (the single longest within the
/// attempt).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongestEntry {
    pub team: TeamName,
    pub attempt: usize,
    pub duration_secs: u64,
    pub pair_names: Vec<String>,
}

/// One recorded attempt in the full history listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptLine {
    pub team: TeamName,
    pub attempt: usize,
    pub correct: u64,
    pub accuracy: Option<f64>,
    pub best_window: u64,
    pub longest_pair_secs: Option<u64>,
}

/// Composite points line: current category winners tallied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointsEntry {
    pub team: TeamName,
    pub points: u32,
    pub categories: Vec<&'static str>,
}

/// Lifetime counts per canonical participant, descending.
pub fn lifetime_board(store: &HistoryStore, roster: &Roster) -> Vec<LifetimeEntry> {
    let mut entries: Vec<LifetimeEntry> = store
        .lifetime_totals
        .iter()
        .map(|(id, &total)| LifetimeEntry {
            name: roster.display_name(id),
            team: roster.team_of(id).cloned(),
            total,
        })
        .collect();
    entries.sort_by(|a, b| b.total.cmp(&a.total));
    entries
}

/// Accuracy of every recorded attempt, descending. Attempts where nothing
/// was counted (accuracy undefined) are skipped.
pub fn accuracy_board(store: &HistoryStore) -> Vec<AccuracyEntry> {
    let mut entries: Vec<AccuracyEntry> = store
        .attempts()
        .filter_map(|(team, attempt, record)| {
            record.accuracy.map(|accuracy| AccuracyEntry {
                team: team.clone(),
                attempt,
                accuracy,
            })
        })
        .collect();
    entries.sort_by(|a, b| b.accuracy.total_cmp(&a.accuracy));
    entries
}

/// Correct counts of every recorded attempt, descending.
pub fn numbers_board(store: &HistoryStore) -> Vec<NumbersEntry> {
    let mut entries: Vec<NumbersEntry> = store
        .attempts()
        .map(|(team, attempt, record)| NumbersEntry {
            team: team.clone(),
            attempt,
            correct: record.correct,
        })
        .collect();
    entries.sort_by(|a, b| b.correct.cmp(&a.correct));
    entries
}

/// Best sliding-window throughput per attempt, descending. Attempts with
/// no positive window are skipped.
pub fn fastest_board(store: &HistoryStore) -> Vec<FastestEntry> {
    let mut entries: Vec<FastestEntry> = store
        .attempts()
        .filter(|(_, _, record)| record.best_window > 0)
        .map(|(team, attempt, record)| FastestEntry {
            team: team.clone(),
            attempt,
            best_window: record.best_window,
            top_names: record.top_names.clone(),
        })
        .collect();
    entries.sort_by(|a, b| b.best_window.cmp(&a.best_window));
    entries
}

/// Longest pair run per attempt, descending. Attempts without pair runs
/// are skipped.
pub fn longest_board(store: &HistoryStore, roster: &Roster) -> Vec<LongestEntry> {
    let mut entries: Vec<LongestEntry> = store
        .attempts()
        .filter_map(|(team, attempt, record)| {
            record.longest_pair_run().map(|run| LongestEntry {
                team: team.clone(),
                attempt,
                duration_secs: run.duration_secs,
                pair_names: run.pair.iter().map(|id| roster.display_name(id)).collect(),
            })
        })
        .collect();
    entries.sort_by(|a, b| b.duration_secs.cmp(&a.duration_secs));
    entries
}

/// Every recorded attempt, teams alphabetical, attempts chronological
/// within each team.
pub fn attempts_board(store: &HistoryStore) -> Vec<AttemptLine> {
    store
        .attempts()
        .map(|(team, attempt, record)| AttemptLine {
            team: team.clone(),
            attempt,
            correct: record.correct,
            accuracy: record.accuracy,
            best_window: record.best_window,
            longest_pair_secs: record.longest_pair_run().map(|r| r.duration_secs),
        })
        .collect()
}

/// Composite points tally across the four categories. The numbers winner
/// takes 2 points, the other category winners 1 each; ordering is points
/// descending, ties broken by team name.
pub fn points_board(store: &HistoryStore, roster: &Roster) -> Vec<PointsEntry> {
    let mut tallies: Vec<PointsEntry> = Vec::new();
    let mut award = |team: Option<TeamName>, points: u32, category: &'static str| {
        let Some(team) = team else { return };
        match tallies.iter_mut().find(|e| e.team == team) {
            Some(entry) => {
                entry.points += points;
                entry.categories.push(category);
            }
            None => tallies.push(PointsEntry {
                team,
                points,
                categories: vec![category],
            }),
        }
    };

    award(
        fastest_board(store).first().map(|e| e.team.clone()),
        1,
        "Fastest Run",
    );
    award(
        numbers_board(store)
            .iter()
            .find(|e| e.correct > 0)
            .map(|e| e.team.clone()),
        2,
        "Numbers Counted",
    );
    award(
        accuracy_board(store).first().map(|e| e.team.clone()),
        1,
        "Accuracy",
    );
    award(
        longest_board(store, roster)
            .iter()
            .find(|e| e.duration_secs > 0)
            .map(|e| e.team.clone()),
        1,
        "Longest Run",
    );

    tallies.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.team.cmp(&b.team)));
    tallies
}

/// `HH:MM:SS`.
pub fn format_duration(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

/// `HH:MM`, for the longest-run board.
pub fn format_duration_hours_minutes(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    format!("{h:02}:{m:02}")
}

/// Percent display: exact `100%`, zero-padded three decimals otherwise,
/// `N/A` when undefined.
pub fn format_accuracy(accuracy: Option<f64>) -> String {
    match accuracy {
        None => "N/A".to_string(),
        Some(v) if v == 100.0 => "100%".to_string(),
        Some(v) => format!("{v:06.3}%"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::RosterConfig;
    use crate::storage::{AttemptRecord, PairRunRecord};
    use chrono::Utc;
    use uuid::Uuid;

    fn record(
        correct: u64,
        incorrect: u64,
        best_window: u64,
        longest_secs: Option<u64>,
    ) -> AttemptRecord {
        let pair_runs = longest_secs
            .map(|secs| {
                vec![
                    PairRunRecord {
                        channel: "classic".into(),
                        pair: ["alice".into(), "bob".into()],
                        started_at: Utc::now(),
                        ended_at: Utc::now(),
                        duration_secs: secs / 2,
                    },
                    PairRunRecord {
                        channel: "classic".into(),
                        pair: ["alice".into(), "bob".into()],
                        started_at: Utc::now(),
                        ended_at: Utc::now(),
                        duration_secs: secs,
                    },
                ]
            })
            .unwrap_or_default();
        let total = correct + incorrect;
        AttemptRecord {
            id: Uuid::new_v4(),
            correct,
            incorrect,
            accuracy: (total > 0).then(|| correct as f64 / total as f64 * 100.0),
            best_window,
            best_window_start_secs: 0,
            top_names: vec!["Alice".into()],
            pair_runs,
            recorded_at: Utc::now(),
        }
    }

    fn make_store() -> HistoryStore {
        let mut store = HistoryStore::default();
        store.append_attempt("Alpha", record(100, 0, 50, Some(600)));
        store.append_attempt("Alpha", record(80, 20, 70, None));
        store.append_attempt("Beta", record(150, 50, 60, Some(900)));
        store
    }

    fn make_roster() -> Roster {
        let mut cfg = RosterConfig::default();
        cfg.teams.insert("Alpha".into(), vec!["alice".into()]);
        cfg.nicknames.insert("alice".into(), "Alice".into());
        Roster::new(cfg)
    }

    #[test]
    fn lifetime_board_sorted_descending_with_team() {
        let mut store = HistoryStore::default();
        store.lifetime_totals.insert("alice".into(), 5);
        store.lifetime_totals.insert("zed".into(), 12);
        let board = lifetime_board(&store, &make_roster());
        assert_eq!(board[0].name, "zed");
        assert_eq!(board[0].team, None);
        assert_eq!(board[1].name, "Alice");
        assert_eq!(board[1].team.as_deref(), Some("Alpha"));
    }

    #[test]
    fn accuracy_board_ranks_and_skips_undefined() {
        let mut store = make_store();
        store.append_attempt("Gamma", record(0, 0, 0, None));
        let board = accuracy_board(&store);
        assert_eq!(board.len(), 3);
        assert_eq!(board[0].team, "Alpha");
        assert_eq!(board[0].accuracy, 100.0);
        assert_eq!(board[1].team, "Alpha");
        assert_eq!(board[1].attempt, 2);
    }

    #[test]
    fn numbers_board_ranks_by_correct() {
        let board = numbers_board(&make_store());
        assert_eq!(board[0].team, "Beta");
        assert_eq!(board[0].correct, 150);
    }

    #[test]
    fn fastest_board_ranks_and_carries_top_names() {
        let board = fastest_board(&make_store());
        assert_eq!(board[0].best_window, 70);
        assert_eq!(board[0].top_names, vec!["Alice".to_string()]);
    }

    #[test]
    fn longest_board_takes_best_run_per_attempt() {
        let board = longest_board(&make_store(), &make_roster());
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].team, "Beta");
        assert_eq!(board[0].duration_secs, 900);
        assert_eq!(
            board[1].pair_names,
            vec!["Alice".to_string(), "bob".to_string()]
        );
    }

    #[test]
    fn attempts_board_lists_every_attempt_in_order() {
        let board = attempts_board(&make_store());
        assert_eq!(board.len(), 3);
        assert_eq!((board[0].team.as_str(), board[0].attempt), ("Alpha", 1));
        assert_eq!((board[1].team.as_str(), board[1].attempt), ("Alpha", 2));
        assert_eq!((board[2].team.as_str(), board[2].attempt), ("Beta", 1));
        assert_eq!(board[2].correct, 150);
        assert_eq!(board[2].longest_pair_secs, Some(900));
        // Attempt without pair runs still appears, just with no run length.
        assert_eq!(board[1].longest_pair_secs, None);
    }

    #[test]
    fn points_board_weights_numbers_double() {
        // Alpha wins fastest (70) and accuracy (100%); Beta wins numbers
        // (150, 2 pts) and longest (900s).
        let board = points_board(&make_store(), &make_roster());
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].team, "Beta");
        assert_eq!(board[0].points, 3);
        assert_eq!(board[0].categories, vec!["Numbers Counted", "Longest Run"]);
        assert_eq!(board[1].team, "Alpha");
        assert_eq!(board[1].points, 2);
    }

    #[test]
    fn points_ties_break_by_team_name() {
        let mut store = HistoryStore::default();
        // Zulu wins numbers (2 pts); Alpha wins fastest and accuracy (2 pts).
        store.append_attempt("Zulu", record(200, 100, 0, None));
        store.append_attempt("Alpha", record(10, 0, 99, None));
        let board = points_board(&store, &make_roster());
        assert_eq!(board[0].team, "Alpha");
        assert_eq!(board[1].team, "Zulu");
        assert_eq!(board[0].points, board[1].points);
    }

    #[test]
    fn empty_store_yields_empty_boards() {
        let store = HistoryStore::default();
        let roster = make_roster();
        assert!(lifetime_board(&store, &roster).is_empty());
        assert!(accuracy_board(&store).is_empty());
        assert!(points_board(&store, &roster).is_empty());
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(0), "00:00:00");
        assert_eq!(format_duration(3 * 3600 + 25 * 60 + 9), "03:25:09");
        assert_eq!(format_duration_hours_minutes(26 * 3600 + 90), "26:01");
    }

    #[test]
    fn accuracy_formatting() {
        assert_eq!(format_accuracy(None), "N/A");
        assert_eq!(format_accuracy(Some(100.0)), "100%");
        assert_eq!(format_accuracy(Some(97.5)), "97.500%");
        assert_eq!(format_accuracy(Some(8.25)), "08.250%");
    }
}
