//! HemisphereGraph: the finished node/edge set handed to callers

use super::edge::{Edge, EdgeKind};
use super::node::{Layer, Node, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The assembled insight graph with its synthetic core truth root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HemisphereGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub core_truth_node_id: NodeId,
}

impl HemisphereGraph {
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// The synthetic root. Always present in an assembled graph.
    pub fn core_truth(&self) -> Option<&Node> {
        self.node(&self.core_truth_node_id)
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    /// Find the edge of `kind` between two nodes, in either direction.
    pub fn edge_between(&self, a: &NodeId, b: &NodeId, kind: EdgeKind) -> Option<&Edge> {
        self.edges_of_kind(kind).find(|e| {
            (&e.source == a && &e.target == b) || (&e.source == b && &e.target == a)
        })
    }

    pub fn node_count_by_layer(&self) -> BTreeMap<Layer, usize> {
        let mut counts = BTreeMap::new();
        for node in &self.nodes {
            *counts.entry(node.layer).or_insert(0) += 1;
        }
        counts
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
