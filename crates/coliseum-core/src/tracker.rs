//! Concurrent coordinator for the run session.
//!
//! One `tokio::sync::Mutex` around the [`RunSession`] serializes every
//! mutator: event ingestion, sampler ticks, the attempt timeout, the
//! periodic durability flush, and finalization. Background tasks suspend
//! only between ticks or while waiting for the lock, never mid-mutation,
//! so aborting them at a suspension point cannot leave partial state.
//!
//! Notification events are delivered fire-and-forget over an unbounded
//! channel; a receiver that has gone away is ignored.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::StoreError;
use crate::events::Event;
use crate::roster::Roster;
use crate::run::{AttemptSummary, RunSession, RunStatus};
use crate::storage::{Config, HistoryStore};

/// Outcome of a start request.
#[derive(Debug, Clone)]
pub enum StartOutcome {
    /// A new attempt began collecting stats.
    Started,
    /// An attempt was already live; its read-only status is returned for
    /// display instead.
    AlreadyActive(RunStatus),
}

/// Public entry point to the engine: owns the session lock, the event
/// channel, and the background task handles.
pub struct RunTracker {
    session: Arc<Mutex<RunSession>>,
    store_path: PathBuf,
    events: UnboundedSender<Event>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RunTracker {
    /// Build a tracker and the receiving end of its notification channel.
    pub fn new(config: Config, store: HistoryStore, store_path: PathBuf) -> (Self, UnboundedReceiver<Event>) {
        let (events, rx) = mpsc::unbounded_channel();
        let session = RunSession::new(config.tracker, Roster::new(config.roster), store);
        (
            Self {
                session: Arc::new(Mutex::new(session)),
                store_path,
                events,
                tasks: Mutex::new(Vec::new()),
            },
            rx,
        )
    }

    /// Feed one raw event from the delivery layer. `is_correction_signal`
    /// marks messages from designated non-participant sources; they are
    /// matched against the configured correction badges and never counted.
    pub async fn ingest(&self, raw_id: &str, channel: &str, text: &str, is_correction_signal: bool) {
        let batch = {
            let mut session = self.session.lock().await;
            if is_correction_signal {
                if session.config().is_correction_signal(raw_id, text) {
                    session.record_correction();
                }
                return;
            }
            session.record_count(raw_id, channel, text, Utc::now())
        };
        self.emit_all(batch);
    }

    /// Begin a new attempt, spawning the sampler, timeout, and autosave
    /// tasks. When an attempt is already live, returns its status instead.
    pub async fn start_attempt(&self) -> StartOutcome {
        let now = Utc::now();
        let (tick_secs, max_ticks, timeout_secs, autosave_secs) = {
            let mut session = self.session.lock().await;
            if session.begin(now) {
                return StartOutcome::AlreadyActive(session.status(now));
            }
            let cfg = session.config();
            (
                cfg.tick_interval_secs,
                cfg.max_ticks(),
                cfg.max_attempt_duration_secs,
                cfg.autosave_interval_secs,
            )
        };
        self.emit(Event::AttemptStarted { at: now });

        let mut tasks = self.tasks.lock().await;
        // Handles from a previous, already-finalized attempt.
        for task in tasks.drain(..) {
            task.abort();
        }
        tasks.push(tokio::spawn(sampler_loop(
            Arc::clone(&self.session),
            self.events.clone(),
            tick_secs,
            max_ticks,
        )));
        tasks.push(tokio::spawn(timeout_task(
            Arc::clone(&self.session),
            self.events.clone(),
            self.store_path.clone(),
            timeout_secs,
        )));
        tasks.push(tokio::spawn(autosave_loop(
            Arc::clone(&self.session),
            self.store_path.clone(),
            autosave_secs,
        )));
        StartOutcome::Started
    }

    /// Finalize the attempt early. `persist` controls whether the attempt
    /// record is written to history; ledger mutations made during the
    /// attempt stand either way. Returns None when no attempt is active
    /// (including when a timeout finalized it first).
    pub async fn stop_attempt(&self, persist: bool) -> Option<AttemptSummary> {
        // Cancel background tasks first so no tick interleaves with the
        // finalization below. Tasks only suspend between ticks, so abort
        // cannot interrupt a mutation.
        {
            let mut tasks = self.tasks.lock().await;
            for task in tasks.drain(..) {
                task.abort();
            }
        }

        let now = Utc::now();
        let (done, save_result) = {
            let mut session = self.session.lock().await;
            let Some(done) = session.finalize(now, persist) else {
                return None;
            };
            let save_result = if persist {
                Some(session.store().save(&self.store_path))
            } else {
                None
            };
            (done, save_result)
        };
        if let Some(Err(err)) = save_result {
            // Soft failure: in-memory state stays authoritative.
            eprintln!("warning: history store save failed: {err}");
        }

        self.emit_all(done.events);
        self.emit(Event::AttemptFinalized {
            summary: done.summary.clone(),
            at: now,
        });
        Some(done.summary)
    }

    /// Read-only live status.
    pub async fn status(&self) -> RunStatus {
        self.session.lock().await.status(Utc::now())
    }

    /// Snapshot of the full persistent state.
    pub async fn export(&self) -> HistoryStore {
        self.session.lock().await.store().clone()
    }

    /// Persist the store now.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let session = self.session.lock().await;
        session.store().save(&self.store_path)
    }

    fn emit(&self, event: Event) {
        let _ = self.events.send(event);
    }

    fn emit_all(&self, events: Vec<Event>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// Samples every tracked channel on the tick interval, bounded by the
/// attempt duration. The first tick fires immediately so the series start
/// with a time-zero snapshot.
async fn sampler_loop(
    session: Arc<Mutex<RunSession>>,
    events: UnboundedSender<Event>,
    tick_secs: u64,
    max_ticks: usize,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(tick_secs.max(1)));
    for _ in 0..=max_ticks {
        interval.tick().await;
        let batch = {
            let mut session = session.lock().await;
            if !session.is_active() {
                break;
            }
            session.sample_tick(Utc::now())
        };
        for event in batch {
            let _ = events.send(event);
        }
    }
}

/// Finalizes the attempt when the maximum duration elapses. A racing
/// explicit stop wins: finalize observes the inactive session and no-ops.
async fn timeout_task(
    session: Arc<Mutex<RunSession>>,
    events: UnboundedSender<Event>,
    store_path: PathBuf,
    timeout_secs: u64,
) {
    tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
    let now = Utc::now();
    let done = {
        let mut session = session.lock().await;
        let done = session.finalize(now, true);
        if done.is_some() {
            if let Err(err) = session.store().save(&store_path) {
                eprintln!("warning: history store save failed: {err}");
            }
        }
        done
    };
    if let Some(done) = done {
        for event in done.events {
            let _ = events.send(event);
        }
        let _ = events.send(Event::AttemptFinalized {
            summary: done.summary,
            at: now,
        });
    }
}

/// Best-effort periodic durability flush while the attempt is live. A
/// failed write is reported and retried on the next tick.
async fn autosave_loop(session: Arc<Mutex<RunSession>>, store_path: PathBuf, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    interval.tick().await;
    loop {
        interval.tick().await;
        let session = session.lock().await;
        if !session.is_active() {
            break;
        }
        if let Err(err) = session.store().save(&store_path) {
            eprintln!("warning: history store save failed: {err}");
        }
    }
}
