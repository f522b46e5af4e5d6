//! Node representation in the hemisphere graph

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maximum number of evidence quotes carried by a single node.
pub const EVIDENCE_CAP: usize = 12;

/// Unique identifier for a node
///
/// Deterministic: `{type}:{identity-key}` for thematic nodes,
/// `evidence:{session}:{answer-key}` for evidence nodes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a NodeId from a string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identity of a thematic node: type prefix plus normalized label key.
    pub fn thematic(node_type: NodeType, key: &str) -> Self {
        Self(format!("{}:{}", node_type.prefix(), key))
    }

    /// Identity of an evidence node, stable per originating answer.
    pub fn evidence(session_id: &str, source_key: &str) -> Self {
        Self(format!("evidence:{}:{}", session_id, source_key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Thematic classification of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Vision,
    Belief,
    Challenge,
    Friction,
    Constraint,
    Enabler,
    Evidence,
    /// The synthetic root carrying the core truth sentence.
    CoreTruth,
}

impl NodeType {
    /// Depth layer; a pure function of the type.
    pub fn layer(self) -> Layer {
        match self {
            Self::CoreTruth => Layer::H0,
            Self::Vision | Self::Belief => Layer::H1,
            Self::Challenge | Self::Friction => Layer::H2,
            Self::Constraint | Self::Enabler => Layer::H3,
            Self::Evidence => Layer::H4,
        }
    }

    /// Lowercase id prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Vision => "vision",
            Self::Belief => "belief",
            Self::Challenge => "challenge",
            Self::Friction => "friction",
            Self::Constraint => "constraint",
            Self::Enabler => "enabler",
            Self::Evidence => "evidence",
            Self::CoreTruth => "core-truth",
        }
    }

    /// Parse a loosely-formatted type name, including the synonyms upstream
    /// classifiers emit ("pain point", "strength", "barrier", ...).
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let key: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        let parsed = match key.as_str() {
            "vision" | "aspiration" | "future" | "ambition" | "goal" => Self::Vision,
            "belief" | "assumption" | "mindset" | "value" => Self::Belief,
            "challenge" | "gap" | "risk" | "issue" | "problem" => Self::Challenge,
            "friction" | "painpoint" | "frustration" | "pain" => Self::Friction,
            "constraint" | "barrier" | "blocker" | "limitation" => Self::Constraint,
            "enabler" | "strength" | "working" | "whatworks" | "support" | "asset" => {
                Self::Enabler
            }
            "evidence" => Self::Evidence,
            _ => return None,
        };
        Some(parsed)
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix().to_uppercase().replace('-', "_"))
    }
}

/// Coarse depth classification, from aspiration (H1) to raw evidence (H4).
/// H0 holds only the synthetic core truth root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Layer {
    H0,
    H1,
    H2,
    H3,
    H4,
}

/// A participant session a node was observed in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub session_id: String,
    pub participant_name: String,
}

impl SourceRef {
    pub fn new(session_id: impl Into<String>, participant_name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            participant_name: participant_name.into(),
        }
    }
}

/// A running weighted mean that stays order-independent under merge.
///
/// `weight` counts only contributions that carried a value, so a fragment
/// without a severity never dilutes the mean.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightedMean {
    value: Option<f64>,
    weight: f64,
}

impl WeightedMean {
    pub fn observed(value: Option<f64>, weight: f64) -> Self {
        match value {
            Some(v) => Self { value: Some(v), weight },
            None => Self::default(),
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// `(prev*prevWeight + next*nextWeight) / (prevWeight + nextWeight)`;
    /// an absent side keeps the other.
    pub fn merge(&mut self, other: WeightedMean) {
        match (self.value, other.value) {
            (_, None) => {}
            (None, Some(_)) => *self = other,
            (Some(prev), Some(next)) => {
                let total = self.weight + other.weight;
                if total > 0.0 {
                    self.value = Some((prev * self.weight + next * other.weight) / total);
                }
                self.weight = total;
            }
        }
    }
}

/// A node in the hemisphere graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Summary of at most eight words
    pub label: String,
    /// Full text
    pub summary: String,
    pub phase_tags: BTreeSet<String>,
    pub layer: Layer,
    pub weight: f64,
    pub severity: Option<f64>,
    pub confidence: Option<f64>,
    pub sources: BTreeSet<SourceRef>,
    pub evidence: Vec<String>,
    /// Composite centrality score, set once the graph is scored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centrality: Option<f64>,
    #[serde(skip)]
    severity_mean: WeightedMean,
    #[serde(skip)]
    confidence_mean: WeightedMean,
}

impl Node {
    /// Create a node with weight 1 and no observations.
    pub fn new(
        id: NodeId,
        node_type: NodeType,
        label: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id,
            node_type,
            label: label.into(),
            summary: summary.into(),
            phase_tags: BTreeSet::new(),
            layer: node_type.layer(),
            weight: 1.0,
            severity: None,
            confidence: None,
            sources: BTreeSet::new(),
            evidence: Vec::new(),
            centrality: None,
            severity_mean: WeightedMean::default(),
            confidence_mean: WeightedMean::default(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self.severity_mean = WeightedMean::observed(self.severity, weight);
        self.confidence_mean = WeightedMean::observed(self.confidence, weight);
        self
    }

    pub fn with_severity(mut self, severity: f64) -> Self {
        self.severity = Some(severity);
        self.severity_mean = WeightedMean::observed(Some(severity), self.weight);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self.confidence_mean = WeightedMean::observed(Some(confidence), self.weight);
        self
    }

    pub fn with_phase_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !tag.trim().is_empty() {
            self.phase_tags.insert(tag);
        }
        self
    }

    pub fn with_source(mut self, source: SourceRef) -> Self {
        self.sources.insert(source);
        self
    }

    /// Append a quote unless it is already present or the cap is reached.
    pub fn push_evidence(&mut self, quote: impl Into<String>) -> bool {
        let quote = quote.into();
        if quote.is_empty() || self.evidence.len() >= EVIDENCE_CAP || self.evidence.contains(&quote) {
            return false;
        }
        self.evidence.push(quote);
        true
    }

    pub fn with_evidence(mut self, quote: impl Into<String>) -> Self {
        self.push_evidence(quote);
        self
    }

    /// Fold another observation of the same node into this one.
    ///
    /// Weight adds, phase tags and sources union, severity and confidence
    /// take weighted means, evidence appends up to the cap. Label and summary
    /// of the first observation are kept.
    pub fn absorb(&mut self, incoming: Node) {
        self.weight += incoming.weight;
        self.phase_tags.extend(incoming.phase_tags);
        self.sources.extend(incoming.sources);

        self.severity_mean.merge(incoming.severity_mean);
        self.severity = self.severity_mean.value();
        self.confidence_mean.merge(incoming.confidence_mean);
        self.confidence = self.confidence_mean.value();

        for quote in incoming.evidence {
            self.push_evidence(quote);
        }
    }

    /// Distinct phase tags, case-insensitively.
    pub fn cross_domain_count(&self) -> usize {
        self.phase_tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn is_evidence(&self) -> bool {
        self.node_type == NodeType::Evidence
    }

    /// Session ids this node was observed in.
    pub fn session_ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.session_id.as_str())
    }
}
