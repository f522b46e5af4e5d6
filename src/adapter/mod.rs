//! Ingestion and enrichment layer
//!
//! Turns raw session records into canonical graph nodes (`fragment`),
//! attaches participant quotes (`evidence`), and runs the LINK-stage
//! enrichments that add relationship edges over the merged registry.

pub mod cancel;
pub mod cooccurrence;
pub mod enrichment;
pub mod evidence;
pub mod fragment;
pub mod similarity;
pub mod text_analysis;

pub use cancel::CancellationToken;
pub use cooccurrence::CoOccurrenceEnrichment;
pub use enrichment::{Enrichment, EnrichmentRegistry, EnrichmentReport};
pub use evidence::{collect_quotes, select_evidence};
pub use fragment::{session_fragments, FragmentError, FragmentKind, InsightFragment, SourceKind};
pub use similarity::SimilarityEnrichment;
