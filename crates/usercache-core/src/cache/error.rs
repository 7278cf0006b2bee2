use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open snapshot store at {}: {message}", .path.display())]
    Open { path: PathBuf, message: String },

    #[error("Snapshot store is at version {found}, newer than supported version {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("Snapshot transaction failed ({context}): {message}")]
    Transaction {
        context: &'static str,
        message: String,
    },

    #[error("Stored record {key} is corrupt: {message}")]
    Corrupt { key: String, message: String },

    #[error("Failed to serialize user {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),

    #[error("Snapshot store task failed: {0}")]
    Background(String),
}

impl StoreError {
    pub(crate) fn open(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        StoreError::Open {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn transaction(context: &'static str, err: impl std::fmt::Display) -> Self {
        StoreError::Transaction {
            context,
            message: err.to_string(),
        }
    }
}
