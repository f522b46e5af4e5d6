//! Hemisphere: cross-participant insight graph synthesis
//!
//! Builds a single layered graph from the completed interview sessions of a
//! workshop run. Insights from every participant are merged by identity,
//! linked by similarity and co-occurrence, ranked by a composite centrality
//! score, and rooted under one "core truth" sentence.
//!
//! # Pipeline
//!
//! - **Ingest**: session records become typed fragments and canonical nodes
//! - **Merge**: nodes with the same identity collapse across participants
//! - **Link**: enrichments add `SIMILAR` and `COOCCUR` edges
//! - **Rank**: drivers are scored by weight, severity, reach and degree
//! - **Synthesize**: a narrative service (or the offline fallback) writes the
//!   core truth sentence
//! - **Finalize**: the core truth node is attached with `CAUSE_HINT` edges
//!
//! # Example
//!
//! ```
//! use hemisphere::{GraphAssembler, MemorySource, HemisphereApi};
//! use std::sync::Arc;
//!
//! let api = HemisphereApi::new(
//!     Arc::new(MemorySource::new()),
//!     Arc::new(GraphAssembler::offline()),
//! );
//! let response = tokio_test::block_on(api.hemisphere_graph("w1", "live"));
//! assert!(!response.is_ok());
//! ```

pub mod adapter;
pub mod analysis;
pub mod api;
pub mod assembler;
pub mod config;
pub mod graph;
pub mod mcp;
pub mod narrative;
pub mod storage;
pub mod synthesis;

pub use adapter::CancellationToken;
pub use api::{GraphEnvelope, HemisphereApi, HemisphereResponse, DEFAULT_RUN_TYPE, GENERIC_ERROR};
pub use assembler::{BuildOutput, BuildStats, GraphAssembler, HemisphereError, CORE_TRUTH_NODE_ID};
pub use config::{ConfigError, HemisphereConfig, Limits, NarrativeConfig, SentencePolicy};
pub use graph::{
    Edge, EdgeKind, EdgeSet, HemisphereGraph, Layer, Node, NodeId, NodeRegistry, NodeType,
    SourceRef,
};
pub use narrative::{HttpNarrativeClient, NarrativeClient, NarrativeError};
pub use storage::{
    InsightSource, MemorySource, OpenSource, SqliteSource, StorageError, StorageResult,
    WorkshopRecords,
};
pub use synthesis::{CoreTruth, CoreTruthOrigin, CoreTruthSynthesizer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
