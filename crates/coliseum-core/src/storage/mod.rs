pub mod config;
pub mod history;

pub use config::{Config, CorrectionBadge, TrackerConfig};
pub use history::{AttemptRecord, HistoryStore, PairRunRecord};

use std::path::PathBuf;

/// Returns `~/.config/coliseum[-dev]/` based on COLISEUM_ENV.
///
/// Set COLISEUM_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("COLISEUM_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("coliseum-dev")
    } else {
        base_dir.join("coliseum")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
