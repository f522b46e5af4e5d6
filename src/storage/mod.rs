//! Insight sources for hemisphere builds
//!
//! Builds read workshop data through the `InsightSource` trait. The
//! persistent implementation is `SqliteSource`; `MemorySource` serves tests
//! and embedding callers.

mod memory;
mod records;
mod sqlite;
mod traits;

pub use memory::MemorySource;
pub use records::{
    as_text, AnswerRecord, KeyInsightRecord, PhaseNotesRecord, SessionRecords, StructuredInsightRecord,
    WorkshopRecords,
};
pub use sqlite::SqliteSource;
pub use traits::{InsightSource, OpenSource, StorageError, StorageResult, WorkshopSummary};
