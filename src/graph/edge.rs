//! Edge representation
//!
//! Edge identity ignores direction: the same endpoint pair and kind always
//! produce the same `EdgeId`, so undirected duplicates collapse.

use super::node::NodeId;
use serde::{Deserialize, Serialize};

/// Kind of relationship an edge expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// Token overlap between node texts
    Similar,
    /// Observed together in one participant session
    Cooccur,
    /// Root → central node, ranked by centrality
    CauseHint,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Similar => "SIMILAR",
            Self::Cooccur => "COOCCUR",
            Self::CauseHint => "CAUSE_HINT",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order-independent edge identifier: `{min}|{max}|{kind}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    pub fn between(a: &NodeId, b: &NodeId, kind: EdgeKind) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{}|{}|{}", lo, hi, kind))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An edge in the hemisphere graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    /// Relationship strength in [0, 1]
    pub strength: f64,
    pub kind: EdgeKind,
}

impl Edge {
    /// Undirected edge. Endpoints are stored in id order so two computations
    /// of the same pair are indistinguishable.
    pub fn undirected(a: NodeId, b: NodeId, kind: EdgeKind, strength: f64) -> Self {
        let (source, target) = if a <= b { (a, b) } else { (b, a) };
        Self {
            id: EdgeId::between(&source, &target, kind),
            source,
            target,
            strength: strength.clamp(0.0, 1.0),
            kind,
        }
    }

    /// Directed edge; direction is kept but identity still ignores it.
    pub fn directed(source: NodeId, target: NodeId, kind: EdgeKind, strength: f64) -> Self {
        Self {
            id: EdgeId::between(&source, &target, kind),
            source,
            target,
            strength: strength.clamp(0.0, 1.0),
            kind,
        }
    }

    pub fn touches(&self, node: &NodeId) -> bool {
        &self.source == node || &self.target == node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_id_ignores_direction() {
        let a = NodeId::from("friction:slow-handoffs");
        let b = NodeId::from("constraint:approval-process");
        assert_eq!(
            EdgeId::between(&a, &b, EdgeKind::Similar),
            EdgeId::between(&b, &a, EdgeKind::Similar)
        );
    }

    #[test]
    fn edge_id_distinguishes_kind() {
        let a = NodeId::from("a");
        let b = NodeId::from("b");
        assert_ne!(
            EdgeId::between(&a, &b, EdgeKind::Similar),
            EdgeId::between(&a, &b, EdgeKind::Cooccur)
        );
    }

    #[test]
    fn undirected_edges_normalize_endpoint_order() {
        let e1 = Edge::undirected(NodeId::from("b"), NodeId::from("a"), EdgeKind::Cooccur, 0.25);
        let e2 = Edge::undirected(NodeId::from("a"), NodeId::from("b"), EdgeKind::Cooccur, 0.25);
        assert_eq!(e1, e2);
        assert_eq!(e1.source.as_str(), "a");
    }

    #[test]
    fn strength_is_clamped() {
        let e = Edge::directed(NodeId::from("root"), NodeId::from("x"), EdgeKind::CauseHint, 1.7);
        assert_eq!(e.strength, 1.0);
        assert_eq!(e.source.as_str(), "root");
    }
}
