//! Edge enrichment trait and registry
//!
//! Enrichments read the merged node registry and write edges into a shared
//! `EdgeSet`. They are independent of each other, so the registry runs them
//! on separate threads; the edge set's keep-max merge makes the result
//! independent of scheduling.

use crate::graph::{EdgeSet, NodeRegistry};
use std::collections::HashSet;
use std::sync::Arc;

/// A component that derives edges from the merged nodes.
pub trait Enrichment: Send + Sync {
    /// Stable identifier for logging and deduplication.
    fn id(&self) -> &str;

    /// Write derived edges into `edges`. Returns the number of writes that
    /// changed the set.
    fn enrich(&self, registry: &NodeRegistry, edges: &EdgeSet) -> usize;
}

/// Outcome of one enrichment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub enrichment_id: String,
    pub edges_written: usize,
}

/// Registry of enrichments, deduplicated by `id()`.
pub struct EnrichmentRegistry {
    enrichments: Vec<Arc<dyn Enrichment>>,
}

impl EnrichmentRegistry {
    /// Create a registry with the given enrichments, deduplicated by id.
    pub fn new(enrichments: Vec<Arc<dyn Enrichment>>) -> Self {
        let mut seen = HashSet::new();
        let deduped: Vec<_> = enrichments
            .into_iter()
            .filter(|e| seen.insert(e.id().to_string()))
            .collect();
        Self { enrichments: deduped }
    }

    pub fn empty() -> Self {
        Self {
            enrichments: Vec::new(),
        }
    }

    pub fn enrichments(&self) -> &[Arc<dyn Enrichment>] {
        &self.enrichments
    }

    /// Run every enrichment concurrently against the same registry and edge
    /// set. Reports come back in registration order.
    pub fn run_all(&self, registry: &NodeRegistry, edges: &EdgeSet) -> Vec<EnrichmentReport> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .enrichments
                .iter()
                .map(|enrichment| {
                    let enrichment = Arc::clone(enrichment);
                    scope.spawn(move || EnrichmentReport {
                        enrichment_id: enrichment.id().to_string(),
                        edges_written: enrichment.enrich(registry, edges),
                    })
                })
                .collect();

            handles
                .into_iter()
                .zip(&self.enrichments)
                .map(|(handle, enrichment)| {
                    handle.join().unwrap_or_else(|_| {
                        tracing::warn!(enrichment = enrichment.id(), "enrichment thread panicked");
                        EnrichmentReport {
                            enrichment_id: enrichment.id().to_string(),
                            edges_written: 0,
                        }
                    })
                })
                .collect()
        })
    }
}
