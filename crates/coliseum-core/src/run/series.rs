//! Tick-aligned cumulative count series for one tracked channel.
//!
//! The sampler appends one snapshot per tick: the channel's running total
//! and, for every participant who has ever contributed in the channel, their
//! cumulative total. Carry-forward is written at sample time, so every
//! series has the same length at every tick and window deltas are plain
//! O(1) index subtractions: the delta over a window of `W` ticks starting at
//! index `i` is `series[i + W] - series[i]`.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::roster::ParticipantId;

/// Append-only snapshot series for a channel and its participants.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChannelSeries {
    total: Vec<u64>,
    by_participant: BTreeMap<ParticipantId, Vec<u64>>,
}

impl ChannelSeries {
    /// Number of ticks sampled so far.
    pub fn ticks(&self) -> usize {
        self.total.len()
    }

    /// Append one snapshot. `participant_totals` holds the cumulative count
    /// of every participant who has contributed in this channel; a
    /// participant first seen at this tick is backfilled with zeros, and one
    /// absent from the map carries its last value forward.
    pub fn sample(
        &mut self,
        channel_total: u64,
        participant_totals: &BTreeMap<ParticipantId, u64>,
    ) {
        let prior_ticks = self.total.len();
        self.total.push(channel_total);

        for (id, &count) in participant_totals {
            self.by_participant
                .entry(id.clone())
                .or_insert_with(|| vec![0; prior_ticks])
                .push(count);
        }
        for series in self.by_participant.values_mut() {
            if series.len() == prior_ticks {
                let last = series.last().copied().unwrap_or(0);
                series.push(last);
            }
        }
    }

    /// Samples recorded for one participant (equal to `ticks()` once seen).
    pub fn participant_samples(&self, id: &str) -> usize {
        self.by_participant.get(id).map_or(0, Vec::len)
    }

    /// Delta of a participant's count over the trailing `window_ticks`
    /// ticks. None until the participant has at least `window_ticks + 1`
    /// samples.
    pub fn trailing_delta(&self, id: &str, window_ticks: usize) -> Option<u64> {
        let series = self.by_participant.get(id)?;
        if series.len() <= window_ticks {
            return None;
        }
        let curr = series[series.len() - 1];
        let prev = series[series.len() - 1 - window_ticks];
        Some(curr - prev)
    }

    /// Best channel-total delta over any window of `window_ticks` ticks.
    /// Returns `(start_index, delta)` of the maximum; ties keep the lowest
    /// start index. None until more than `window_ticks` samples exist.
    pub fn best_window(&self, window_ticks: usize) -> Option<(usize, u64)> {
        let n = self.total.len();
        if window_ticks == 0 || n <= window_ticks {
            return None;
        }
        let mut best = (0usize, 0u64);
        for i in 0..(n - window_ticks) {
            let delta = self.total[i + window_ticks] - self.total[i];
            if delta > best.1 {
                best = (i, delta);
            }
        }
        Some(best)
    }

    /// Participants ranked by their delta inside the window starting at
    /// `start`. Zero deltas are skipped.
    pub fn window_contributors(&self, start: usize, window_ticks: usize) -> Vec<(ParticipantId, u64)> {
        let end = start + window_ticks;
        let mut deltas: Vec<(ParticipantId, u64)> = self
            .by_participant
            .iter()
            .filter_map(|(id, series)| {
                if series.len() > end {
                    let delta = series[end] - series[start];
                    (delta > 0).then(|| (id.clone(), delta))
                } else {
                    None
                }
            })
            .collect();
        deltas.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        deltas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(pairs: &[(&str, u64)]) -> BTreeMap<ParticipantId, u64> {
        pairs
            .iter()
            .map(|(id, n)| (id.to_string(), *n))
            .collect()
    }

    #[test]
    fn series_stay_equal_length_with_late_joiner() {
        let mut series = ChannelSeries::default();
        series.sample(0, &totals(&[]));
        series.sample(3, &totals(&[("alice", 3)]));
        // Bob first contributes at tick 2: backfilled with zeros.
        series.sample(7, &totals(&[("alice", 5), ("bob", 2)]));

        assert_eq!(series.ticks(), 3);
        assert_eq!(series.participant_samples("alice"), 3);
        assert_eq!(series.participant_samples("bob"), 3);
        assert_eq!(series.trailing_delta("bob", 2), Some(2));
    }

    #[test]
    fn carry_forward_when_participant_is_idle() {
        let mut series = ChannelSeries::default();
        series.sample(4, &totals(&[("alice", 4)]));
        series.sample(4, &totals(&[]));
        series.sample(4, &totals(&[]));
        assert_eq!(series.participant_samples("alice"), 3);
        assert_eq!(series.trailing_delta("alice", 2), Some(0));
    }

    #[test]
    fn trailing_delta_requires_enough_samples() {
        let mut series = ChannelSeries::default();
        series.sample(1, &totals(&[("alice", 1)]));
        series.sample(2, &totals(&[("alice", 2)]));
        // Two samples support a window of 1 tick, not 2.
        assert_eq!(series.trailing_delta("alice", 1), Some(1));
        assert_eq!(series.trailing_delta("alice", 2), None);
        assert_eq!(series.trailing_delta("ghost", 1), None);
    }

    #[test]
    fn best_window_picks_maximum_delta() {
        let mut series = ChannelSeries::default();
        for total in [0u64, 5, 12, 20, 35, 40] {
            series.sample(total, &totals(&[]));
        }
        // Window of 3 ticks: deltas are 20-0, 35-5, 40-12 -> max 30 at index 1.
        assert_eq!(series.best_window(3), Some((1, 30)));
        // Window of 2 ticks: deltas 12, 15, 23, 20 -> max 23 at index 2.
        assert_eq!(series.best_window(2), Some((2, 23)));
    }

    #[test]
    fn best_window_ties_keep_lowest_index() {
        let mut series = ChannelSeries::default();
        for total in [0u64, 10, 20, 30] {
            series.sample(total, &totals(&[]));
        }
        assert_eq!(series.best_window(1), Some((0, 10)));
    }

    #[test]
    fn best_window_needs_more_samples_than_window() {
        let mut series = ChannelSeries::default();
        series.sample(0, &totals(&[]));
        series.sample(9, &totals(&[]));
        assert_eq!(series.best_window(2), None);
        assert_eq!(series.best_window(1), Some((0, 9)));
    }

    proptest::proptest! {
        #[test]
        fn best_window_matches_naive_scan(
            increments in proptest::collection::vec(0u64..50, 2..40),
            window in 1usize..10,
        ) {
            let mut series = ChannelSeries::default();
            let mut running = 0u64;
            let mut cumulative = Vec::new();
            for inc in &increments {
                running += inc;
                cumulative.push(running);
                series.sample(running, &totals(&[]));
            }

            let expected = if cumulative.len() > window {
                let mut best = (0usize, 0u64);
                for i in 0..(cumulative.len() - window) {
                    let delta = cumulative[i + window] - cumulative[i];
                    if delta > best.1 {
                        best = (i, delta);
                    }
                }
                Some(best)
            } else {
                None
            };
            proptest::prop_assert_eq!(series.best_window(window), expected);
            if let Some((_, delta)) = series.best_window(window) {
                proptest::prop_assert!(delta <= running);
            }
        }
    }

    #[test]
    fn window_contributors_ranked_and_nonzero() {
        let mut series = ChannelSeries::default();
        series.sample(0, &totals(&[("alice", 0), ("bob", 0), ("carol", 0)]));
        series.sample(10, &totals(&[("alice", 6), ("bob", 4), ("carol", 0)]));
        series.sample(15, &totals(&[("alice", 7), ("bob", 8), ("carol", 0)]));

        let ranked = series.window_contributors(0, 2);
        assert_eq!(
            ranked,
            vec![("bob".to_string(), 8), ("alice".to_string(), 7)]
        );
    }
}
