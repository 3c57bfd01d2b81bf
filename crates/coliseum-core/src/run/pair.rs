//! Two-person pair-run detection.
//!
//! Each tracked channel owns one detector: a bounded buffer of the most
//! recent senders plus a state machine that is either `Inactive` or
//! tracking an `Active` pair. A pair run starts when the buffer is full and
//! holds exactly two distinct participants; it ends on a pair switch, on
//! the inactivity rule, or when the attempt is finalized.
//!
//! A pair switch keeps the buffer so the incoming pair is recognized
//! immediately; an inactivity termination clears it so a new pair must be
//! freshly observed.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, VecDeque};

use crate::events::Event;
use crate::roster::{ChannelId, ParticipantId};
use crate::run::series::ChannelSeries;
use crate::storage::{PairRunRecord, TrackerConfig};

/// State of the per-channel pair-run machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairRunState {
    Inactive,
    Active(ActivePairRun),
}

/// An in-progress pair run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePairRun {
    /// The two canonical participant ids, sorted.
    pub pair: [ParticipantId; 2],
    pub started_at: DateTime<Utc>,
    /// One-shot inactivity warning already sent.
    pub warned: bool,
}

/// Pair-run detector for one channel.
#[derive(Debug, Clone)]
pub struct PairDetector {
    channel: ChannelId,
    capacity: usize,
    recent: VecDeque<ParticipantId>,
    state: PairRunState,
    history: Vec<PairRunRecord>,
}

impl PairDetector {
    pub fn new(channel: ChannelId, capacity: usize) -> Self {
        Self {
            channel,
            capacity,
            recent: VecDeque::with_capacity(capacity),
            state: PairRunState::Inactive,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> &PairRunState {
        &self.state
    }

    /// Pair runs finalized in this channel during the attempt.
    pub fn history(&self) -> &[PairRunRecord] {
        &self.history
    }

    /// Record a valid count from `sender` and run detection.
    pub fn push_sender(&mut self, sender: &str, now: DateTime<Utc>) -> Vec<Event> {
        if self.capacity == 0 {
            return Vec::new();
        }
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(sender.to_string());

        if self.recent.len() < self.capacity {
            return Vec::new();
        }

        let unique: BTreeSet<&ParticipantId> = self.recent.iter().collect();
        if unique.len() != 2 {
            return Vec::new();
        }
        let mut ids = unique.into_iter().cloned();
        let pair = [ids.next().unwrap_or_default(), ids.next().unwrap_or_default()];
        drop(ids);

        match &self.state {
            PairRunState::Inactive => vec![self.start_run(pair, now)],
            PairRunState::Active(active) if active.pair != pair => {
                // Pair switch: close the old run, start the new one at once.
                // The buffer is kept so detection continues uninterrupted.
                let mut events = Vec::with_capacity(2);
                if let Some(ended) = self.end_active(now, false) {
                    events.push(ended);
                }
                events.push(self.start_run(pair, now));
                events
            }
            PairRunState::Active(_) => Vec::new(),
        }
    }

    /// Apply the warning and termination rules. Called once per sampler
    /// tick, after the series has been extended.
    pub fn check_activity(
        &mut self,
        series: &ChannelSeries,
        config: &TrackerConfig,
        now: DateTime<Utc>,
    ) -> Vec<Event> {
        let active = match &self.state {
            PairRunState::Active(active) => active.clone(),
            PairRunState::Inactive => return Vec::new(),
        };
        let age_secs = (now - active.started_at).num_seconds().max(0) as u64;
        let mut events = Vec::new();

        if age_secs >= config.warning_threshold_secs && !active.warned {
            let ticks = config.warning_window_ticks();
            if let (Some(d1), Some(d2)) = (
                series.trailing_delta(&active.pair[0], ticks),
                series.trailing_delta(&active.pair[1], ticks),
            ) {
                if d1 + d2 < config.min_activity_count {
                    events.push(Event::InactivityWarning {
                        channel: self.channel.clone(),
                        pair: active.pair.clone(),
                        at: now,
                    });
                    if let PairRunState::Active(a) = &mut self.state {
                        a.warned = true;
                    }
                }
            }
        }

        if age_secs >= config.check_threshold_secs {
            let ticks = config.check_window_ticks();
            if let (Some(d1), Some(d2)) = (
                series.trailing_delta(&active.pair[0], ticks),
                series.trailing_delta(&active.pair[1], ticks),
            ) {
                if d1 + d2 < config.min_activity_count || d1 == 0 || d2 == 0 {
                    if let Some(ended) = self.end_active(now, true) {
                        events.push(ended);
                    }
                }
            }
        }

        events
    }

    /// Close a still-active run at attempt finalization.
    pub fn force_finalize(&mut self, now: DateTime<Utc>) -> Option<Event> {
        self.end_active(now, true)
    }

    fn start_run(&mut self, pair: [ParticipantId; 2], now: DateTime<Utc>) -> Event {
        self.state = PairRunState::Active(ActivePairRun {
            pair: pair.clone(),
            started_at: now,
            warned: false,
        });
        Event::PairRunStarted {
            channel: self.channel.clone(),
            pair,
            at: now,
        }
    }

    fn end_active(&mut self, now: DateTime<Utc>, clear_buffer: bool) -> Option<Event> {
        let active = match std::mem::replace(&mut self.state, PairRunState::Inactive) {
            PairRunState::Active(active) => active,
            PairRunState::Inactive => return None,
        };
        let duration_secs = (now - active.started_at).num_seconds().max(0) as u64;
        self.history.push(PairRunRecord {
            channel: self.channel.clone(),
            pair: active.pair.clone(),
            started_at: active.started_at,
            ended_at: now,
            duration_secs,
        });
        if clear_buffer {
            self.recent.clear();
        }
        Some(Event::PairRunEnded {
            channel: self.channel.clone(),
            pair: active.pair,
            duration_secs,
            at: now,
        })
    }
}
