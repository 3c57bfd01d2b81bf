use std::path::Path;

use coliseum_core::storage::{Config, HistoryStore};
use coliseum_core::tracker::{RunTracker, StartOutcome};
use serde::Deserialize;

/// One line of a replay log.
#[derive(Deserialize)]
#[serde(untagged)]
enum LogLine {
    Correction {
        correction: bool,
        source: String,
        text: String,
    },
    Count {
        participant: String,
        channel: String,
        text: String,
    },
}

/// Drive a complete attempt from a JSONL event log and print what the
/// engine emitted along the way.
pub fn run(file: &Path, no_save: bool) -> Result<(), Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(file)?;
    let config = Config::load()?;
    let store_path = HistoryStore::default_path()?;
    let store = HistoryStore::load(&store_path);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let (tracker, mut events) = RunTracker::new(config, store, store_path);
        if let StartOutcome::AlreadyActive(_) = tracker.start_attempt().await {
            return Err::<_, Box<dyn std::error::Error>>("attempt already active".into());
        }

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let parsed: LogLine = serde_json::from_str(line)
                .map_err(|e| format!("line {}: {e}", lineno + 1))?;
            match parsed {
                LogLine::Correction {
                    correction,
                    source,
                    text,
                } => {
                    if correction {
                        tracker.ingest(&source, "", &text, true).await;
                    }
                }
                LogLine::Count {
                    participant,
                    channel,
                    text,
                } => {
                    tracker.ingest(&participant, &channel, &text, false).await;
                }
            }
        }

        let summary = tracker.stop_attempt(!no_save).await;
        while let Ok(event) = events.try_recv() {
            println!("{}", serde_json::to_string(&event)?);
        }
        if let Some(summary) = summary {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Ok(())
    })
}
