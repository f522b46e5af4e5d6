//! Composite centrality scoring and driver selection
//!
//! Scores every thematic node from its own weight and severity, the number
//! of interview phases it appeared in, and the strength of its incident
//! edges. The top of the ranking are the drivers that seed the Core Truth;
//! a slightly longer prefix are the central nodes the root links to.

use crate::graph::{EdgeSet, Node, NodeId, NodeRegistry};
use serde::Serialize;
use std::collections::HashMap;

const SEVERITY_FACTOR: f64 = 1.6;
const BREADTH_FACTOR: f64 = 0.45;
const MAX_EXTRA_DOMAINS: usize = 3;
const DEGREE_FACTOR: f64 = 2.5;
const DEFAULT_SEVERITY_NORM: f64 = 0.5;

/// A node with its score inputs and composite score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredNode {
    pub node_id: NodeId,
    pub score: f64,
    pub degree: f64,
    pub cross_domain: usize,
    pub weight: f64,
}

/// Severity on the 1–5 scale mapped to [0, 1]; absent severity is neutral.
pub fn severity_norm(severity: Option<f64>) -> f64 {
    match severity {
        Some(s) => ((s - 1.0) / 4.0).clamp(0.0, 1.0),
        None => DEFAULT_SEVERITY_NORM,
    }
}

/// `weight * (1 + 1.6*sev) * (1 + 0.45*min(3, max(0, cd-1))) + degree*2.5`
pub fn composite_score(weight: f64, severity: Option<f64>, cross_domain: usize, degree: f64) -> f64 {
    let extra_domains = cross_domain.saturating_sub(1).min(MAX_EXTRA_DOMAINS) as f64;
    weight
        * (1.0 + SEVERITY_FACTOR * severity_norm(severity))
        * (1.0 + BREADTH_FACTOR * extra_domains)
        + degree * DEGREE_FACTOR
}

fn score_node(node: &Node, degree: f64) -> ScoredNode {
    let cross_domain = node.cross_domain_count();
    ScoredNode {
        node_id: node.id.clone(),
        score: composite_score(node.weight, node.severity, cross_domain, degree),
        degree,
        cross_domain,
        weight: node.weight,
    }
}

/// Thematic nodes ordered by composite score.
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    ranked: Vec<ScoredNode>,
}

impl Ranking {
    /// Score all non-evidence nodes against the current edge set.
    ///
    /// Order: score desc, then degree desc, then weight desc, then id asc.
    pub fn compute(registry: &NodeRegistry, edges: &EdgeSet) -> Self {
        let degrees: HashMap<NodeId, f64> = edges.degrees();
        let mut ranked: Vec<ScoredNode> = registry
            .nodes()
            .filter(|n| !n.is_evidence())
            .map(|n| score_node(n, degrees.get(&n.id).copied().unwrap_or(0.0)))
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.degree.total_cmp(&a.degree))
                .then_with(|| b.weight.total_cmp(&a.weight))
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        Self { ranked }
    }

    pub fn ranked(&self) -> &[ScoredNode] {
        &self.ranked
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// The top `n` nodes that seed the Core Truth.
    pub fn drivers(&self, n: usize) -> &[ScoredNode] {
        &self.ranked[..n.min(self.ranked.len())]
    }

    /// The top `n` nodes the root links to.
    pub fn central(&self, n: usize) -> &[ScoredNode] {
        self.drivers(n)
    }

    pub fn score_of(&self, id: &NodeId) -> Option<f64> {
        self.ranked.iter().find(|s| &s.node_id == id).map(|s| s.score)
    }
}
