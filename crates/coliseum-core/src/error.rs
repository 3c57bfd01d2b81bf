//! Error types for coliseum-core.
//!
//! This module defines the error hierarchy using thiserror so callers can
//! match on failure classes (store, config) instead of strings.

use std::path::PathBuf;
use thiserror::Error;

/// History-store-specific errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to serialize the store before writing.
    /// Raised before anything touches disk so a bad snapshot is never committed.
    #[error("Failed to encode history store: {0}")]
    EncodeFailed(#[source] serde_json::Error),

    /// Failed to write the store to disk
    #[error("Failed to write history store to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to atomically replace the store file
    #[error("Failed to commit history store at {path}: {source}")]
    CommitFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse a configuration value
    #[error("Failed to parse configuration value: {0}")]
    ParseFailed(String),
}
