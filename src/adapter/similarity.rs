//! SimilarityEnrichment: token-overlap links between thematic nodes
//!
//! Compares every unordered pair of the heaviest non-evidence nodes and
//! emits a SIMILAR edge whose strength is the Jaccard index of their token
//! sets. Pairs are gated by layer: same layer, or the H2/H3 bridge between
//! challenges/frictions and constraints/enablers. No other cross-layer pair
//! is ever compared.

use crate::adapter::enrichment::Enrichment;
use crate::adapter::text_analysis::{jaccard, tokenize};
use crate::graph::{Edge, EdgeKind, EdgeSet, Layer, NodeRegistry};

/// Default cap on compared nodes; the pass is quadratic in this.
pub const DEFAULT_NODE_CAP: usize = 140;

/// Default minimum Jaccard index for an edge.
pub const DEFAULT_THRESHOLD: f64 = 0.22;

pub struct SimilarityEnrichment {
    node_cap: usize,
    threshold: f64,
}

impl SimilarityEnrichment {
    pub fn new() -> Self {
        Self {
            node_cap: DEFAULT_NODE_CAP,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_limits(node_cap: usize, threshold: f64) -> Self {
        Self { node_cap, threshold }
    }
}

impl Default for SimilarityEnrichment {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether two layers may be linked by similarity.
pub fn layers_compatible(a: Layer, b: Layer) -> bool {
    a == b || matches!((a, b), (Layer::H2, Layer::H3) | (Layer::H3, Layer::H2))
}

impl Enrichment for SimilarityEnrichment {
    fn id(&self) -> &str {
        "similarity:jaccard"
    }

    fn enrich(&self, registry: &NodeRegistry, edges: &EdgeSet) -> usize {
        let mut candidates = registry.thematic_by_weight();
        candidates.truncate(self.node_cap);

        let tokens: Vec<_> = candidates
            .iter()
            .map(|n| tokenize(&format!("{} {}", n.label, n.summary)))
            .collect();

        let mut written = 0;
        for i in 0..candidates.len() {
            for j in (i + 1)..candidates.len() {
                let (a, b) = (candidates[i], candidates[j]);
                if !layers_compatible(a.layer, b.layer) {
                    continue;
                }
                if tokens[i].is_empty() || tokens[j].is_empty() {
                    continue;
                }
                let similarity = jaccard(&tokens[i], &tokens[j]);
                if similarity < self.threshold {
                    continue;
                }
                let edge = Edge::undirected(a.id.clone(), b.id.clone(), EdgeKind::Similar, similarity);
                if edges.upsert_max(edge) {
                    written += 1;
                }
            }
        }
        written
    }
}
