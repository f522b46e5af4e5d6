//! NodeRegistry and EdgeSet: the per-build mutable state
//!
//! One registry and one edge set are created for each graph build and
//! dropped with it. Nothing here is global.

use super::edge::{Edge, EdgeId, EdgeKind};
use super::node::{Node, NodeId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;

/// Canonicalizes incoming node observations by id and merges duplicates.
#[derive(Debug, Default, Clone)]
pub struct NodeRegistry {
    nodes: HashMap<NodeId, Node>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the node, or fold it into the existing node with the same id.
    pub fn upsert(&mut self, node: Node) {
        match self.nodes.get_mut(&node.id) {
            Some(existing) => existing.absorb(node),
            None => {
                self.nodes.insert(node.id.clone(), node);
            }
        }
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Nodes ordered by id, for deterministic output.
    pub fn sorted_nodes(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// Non-evidence nodes, heaviest first (ties by id).
    pub fn thematic_by_weight(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes.values().filter(|n| !n.is_evidence()).collect();
        sort_by_weight_desc(&mut nodes);
        nodes
    }

    pub fn into_nodes(self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.nodes.into_values().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }
}

/// Sort heaviest first; equal weights fall back to id order.
pub fn sort_by_weight_desc(nodes: &mut [&Node]) {
    nodes.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.id.cmp(&b.id)));
}

/// Keep-max edge map, safe to write from several builder threads.
///
/// Each write locks only the shard owning the edge id, and the merge keeps
/// the larger strength. Max is commutative, so the final contents do not
/// depend on write order.
#[derive(Debug, Default)]
pub struct EdgeSet {
    edges: DashMap<EdgeId, Edge>,
}

impl EdgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the edge, or raise the strength of the existing edge with the
    /// same id. Returns true when the set changed.
    pub fn upsert_max(&self, edge: Edge) -> bool {
        match self.edges.entry(edge.id.clone()) {
            Entry::Occupied(mut slot) => {
                if edge.strength > slot.get().strength {
                    slot.insert(edge);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(edge);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn count_kind(&self, kind: EdgeKind) -> usize {
        self.edges.iter().filter(|e| e.kind == kind).count()
    }

    /// Sum of incident edge strengths per node.
    pub fn degrees(&self) -> HashMap<NodeId, f64> {
        let mut degrees: HashMap<NodeId, f64> = HashMap::new();
        for edge in self.edges.iter() {
            *degrees.entry(edge.source.clone()).or_insert(0.0) += edge.strength;
            *degrees.entry(edge.target.clone()).or_insert(0.0) += edge.strength;
        }
        degrees
    }

    /// Snapshot ordered by edge id.
    pub fn to_sorted_vec(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self.edges.iter().map(|e| e.value().clone()).collect();
        edges.sort_by(|a, b| a.id.cmp(&b.id));
        edges
    }
}
