//! Data source trait definitions

use super::records::WorkshopRecords;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while reading or importing workshop data
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Workshop not found: {workshop_id} ({run_type})")]
    WorkshopNotFound { workshop_id: String, run_type: String },

    #[error("Invalid workshop data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One workshop run known to a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopSummary {
    pub workshop_id: String,
    pub run_type: String,
    pub session_count: usize,
}

/// Supplies the raw records a graph build starts from.
///
/// Implementations must be thread-safe (Send + Sync); one source serves
/// many concurrent builds.
pub trait InsightSource: Send + Sync {
    /// All completed sessions of a workshop run.
    ///
    /// An unknown workshop/run is `StorageError::WorkshopNotFound`.
    fn load_workshop(&self, workshop_id: &str, run_type: &str) -> StorageResult<WorkshopRecords>;

    /// Every workshop run with at least one session, ordered by id then run.
    fn list_workshops(&self) -> StorageResult<Vec<WorkshopSummary>>;
}

/// Extension trait for opening sources from paths
pub trait OpenSource: InsightSource + Sized {
    /// Open or create a source at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory source (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
