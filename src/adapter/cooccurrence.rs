//! CoOccurrenceEnrichment: same-session co-occurrence
//!
//! Two thematic nodes raised in the same participant session are linked
//! with a fixed-strength COOCCUR edge. Only the heaviest nodes of each
//! session take part, which bounds the pair count per session.
//!
//! Weight ordering uses the merged, workshop-wide weight, so a theme many
//! participants raised stays in every session's window.

use crate::adapter::enrichment::Enrichment;
use crate::graph::{sort_by_weight_desc, Edge, EdgeKind, EdgeSet, Node, NodeRegistry};
use std::collections::BTreeMap;

/// Default per-session window.
pub const DEFAULT_PER_SESSION_CAP: usize = 18;

/// Default COOCCUR edge strength.
pub const DEFAULT_STRENGTH: f64 = 0.25;

pub struct CoOccurrenceEnrichment {
    per_session_cap: usize,
    strength: f64,
}

impl CoOccurrenceEnrichment {
    pub fn new() -> Self {
        Self {
            per_session_cap: DEFAULT_PER_SESSION_CAP,
            strength: DEFAULT_STRENGTH,
        }
    }

    pub fn with_limits(per_session_cap: usize, strength: f64) -> Self {
        Self {
            per_session_cap,
            strength,
        }
    }
}

impl Default for CoOccurrenceEnrichment {
    fn default() -> Self {
        Self::new()
    }
}

impl Enrichment for CoOccurrenceEnrichment {
    fn id(&self) -> &str {
        "co_occurrence:session"
    }

    fn enrich(&self, registry: &NodeRegistry, edges: &EdgeSet) -> usize {
        let mut written = 0;
        for (session_id, mut members) in group_by_session(registry) {
            sort_by_weight_desc(&mut members);
            members.truncate(self.per_session_cap);
            tracing::trace!(session = session_id, members = members.len(), "co-occurrence window");

            for i in 0..members.len() {
                for j in (i + 1)..members.len() {
                    let edge = Edge::undirected(
                        members[i].id.clone(),
                        members[j].id.clone(),
                        EdgeKind::Cooccur,
                        self.strength,
                    );
                    if edges.upsert_max(edge) {
                        written += 1;
                    }
                }
            }
        }
        written
    }
}

/// Non-evidence nodes grouped by each session that contributed to them.
fn group_by_session(registry: &NodeRegistry) -> BTreeMap<&str, Vec<&Node>> {
    let mut groups: BTreeMap<&str, Vec<&Node>> = BTreeMap::new();
    for node in registry.nodes().filter(|n| !n.is_evidence()) {
        for source in &node.sources {
            let members = groups.entry(source.session_id.as_str()).or_default();
            if !members.iter().any(|m| m.id == node.id) {
                members.push(node);
            }
        }
    }
    groups
}
