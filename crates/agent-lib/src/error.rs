//! Error types for the agent core

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the reading store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open reading store at {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to prepare reading store directory {path}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to ensure reading schema")]
    Schema(#[source] rusqlite::Error),

    #[error("store schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: i32, supported: i32 },

    #[error("failed to append reading")]
    Append(#[source] rusqlite::Error),

    #[error("failed to query readings")]
    Query(#[source] rusqlite::Error),

    #[error("invalid timestamp '{value}' in reading {id}")]
    Timestamp { id: i64, value: String },
}

/// Failures that end the agent loop
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
