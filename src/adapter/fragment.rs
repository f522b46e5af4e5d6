//! InsightFragment: the validated ingestion boundary
//!
//! Every raw record (structured insight, key insight, phase note, evidence
//! answer) is checked and normalized here exactly once. Downstream code only
//! ever sees `InsightFragment`, a closed type with one `FragmentKind` variant
//! per source kind, and turns it into a `Node` with `into_node()`.
//!
//! A record that fails validation yields a `FragmentError` and is skipped by
//! the caller; it never aborts a build.

use crate::adapter::text_analysis::{clean_text, identity_key, summarize_label};
use crate::graph::{Node, NodeId, NodeType, SourceRef};
use crate::storage::{as_text, KeyInsightRecord, SessionRecords, StructuredInsightRecord};
use serde_json::Value;
use thiserror::Error;

/// Phase tag given to key-insight fragments, which carry no interview phase.
pub const KEY_INSIGHT_PHASE: &str = "key-insight";

/// Why a raw record was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FragmentError {
    #[error("missing text")]
    MissingText,

    #[error("text is not a string")]
    TextNotString,

    #[error("unknown insight type: {0}")]
    UnknownType(String),

    #[error("unknown note bucket: {0}")]
    UnknownBucket(String),

    #[error("invalid {field}: {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("text has no identifying words")]
    EmptyIdentity,
}

/// Where a fragment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    StructuredInsight,
    KeyInsight,
    PhaseNote,
    EvidenceExcerpt,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::StructuredInsight => "structured-insight",
            Self::KeyInsight => "key-insight",
            Self::PhaseNote => "phase-note",
            Self::EvidenceExcerpt => "evidence-excerpt",
        })
    }
}

/// Source-specific payload of a validated fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentKind {
    StructuredInsight { node_type: NodeType },
    KeyInsight { node_type: NodeType, evidence: Vec<String> },
    PhaseNote { node_type: NodeType, bucket: String },
    /// Keyed by the originating answer; never merges with other fragments.
    EvidenceExcerpt { excerpt_key: String },
}

/// A validated, normalized fragment ready to become a node.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightFragment {
    pub kind: FragmentKind,
    /// Full cleaned text
    pub text: String,
    /// Short label; for thematic fragments its identity key is non-empty
    pub label: String,
    pub phase: String,
    /// 1..=5
    pub severity: Option<f64>,
    /// 0..=1
    pub confidence: Option<f64>,
    pub source: SourceRef,
    pub weight: f64,
}

impl InsightFragment {
    pub fn source_kind(&self) -> SourceKind {
        match self.kind {
            FragmentKind::StructuredInsight { .. } => SourceKind::StructuredInsight,
            FragmentKind::KeyInsight { .. } => SourceKind::KeyInsight,
            FragmentKind::PhaseNote { .. } => SourceKind::PhaseNote,
            FragmentKind::EvidenceExcerpt { .. } => SourceKind::EvidenceExcerpt,
        }
    }

    pub fn node_type(&self) -> NodeType {
        match &self.kind {
            FragmentKind::StructuredInsight { node_type }
            | FragmentKind::KeyInsight { node_type, .. }
            | FragmentKind::PhaseNote { node_type, .. } => *node_type,
            FragmentKind::EvidenceExcerpt { .. } => NodeType::Evidence,
        }
    }

    /// Deterministic node identity.
    pub fn node_id(&self) -> NodeId {
        match &self.kind {
            FragmentKind::EvidenceExcerpt { excerpt_key } => {
                NodeId::evidence(&self.source.session_id, excerpt_key)
            }
            _ => NodeId::thematic(self.node_type(), &identity_key(&self.label)),
        }
    }

    /// A thematic fragment, validated from already-typed parts.
    pub fn thematic(
        kind: FragmentKind,
        text: &str,
        label_source: Option<&str>,
        phase: &str,
        source: SourceRef,
    ) -> Result<Self, FragmentError> {
        let text = clean_text(text);
        if text.is_empty() {
            return Err(FragmentError::MissingText);
        }
        let label = summarize_label(&clean_text(label_source.unwrap_or(&text)));
        let label = if identity_key(&label).is_empty() {
            summarize_label(&text)
        } else {
            label
        };
        if identity_key(&label).is_empty() {
            return Err(FragmentError::EmptyIdentity);
        }
        Ok(Self {
            kind,
            text,
            label,
            phase: phase.trim().to_string(),
            severity: None,
            confidence: None,
            source,
            weight: 1.0,
        })
    }

    /// An evidence excerpt keyed by its answer key.
    pub fn evidence(
        text: &str,
        excerpt_key: &str,
        phase: &str,
        source: SourceRef,
    ) -> Result<Self, FragmentError> {
        let text = clean_text(text);
        if text.is_empty() {
            return Err(FragmentError::MissingText);
        }
        Ok(Self {
            kind: FragmentKind::EvidenceExcerpt {
                excerpt_key: excerpt_key.to_string(),
            },
            label: summarize_label(&text),
            text,
            phase: phase.trim().to_string(),
            severity: None,
            confidence: None,
            source,
            weight: 1.0,
        })
    }

    pub fn with_severity(mut self, severity: Option<f64>) -> Self {
        self.severity = severity.map(|s| s.clamp(1.0, 5.0));
        self
    }

    pub fn with_confidence(mut self, confidence: Option<f64>) -> Self {
        self.confidence = confidence.map(|c| c.clamp(0.0, 1.0));
        self
    }

    /// Convert into a single-observation node.
    pub fn into_node(self) -> Node {
        let node_type = self.node_type();
        let mut node = Node::new(self.node_id(), node_type, self.label, self.text)
            .with_weight(self.weight)
            .with_phase_tag(self.phase)
            .with_source(self.source);
        if let Some(severity) = self.severity {
            node = node.with_severity(severity);
        }
        if let Some(confidence) = self.confidence {
            node = node.with_confidence(confidence);
        }
        if let FragmentKind::KeyInsight { evidence, .. } = self.kind {
            for quote in evidence {
                node.push_evidence(quote);
            }
        }
        node
    }
}

// --- Validation from raw records ---

/// The session's identity as a `SourceRef`.
pub fn session_source(session: &SessionRecords) -> SourceRef {
    SourceRef::new(
        session.session_id.clone(),
        session.participant().map(str::trim).unwrap_or_default(),
    )
}

fn text_value(value: Option<&Value>) -> Result<&str, FragmentError> {
    match value {
        None | Some(Value::Null) => Err(FragmentError::MissingText),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(FragmentError::TextNotString),
    }
}

/// A short string field such as the insight type. Absent is fine; any
/// non-string is a type error.
fn name_value<'a>(field: &'static str, value: Option<&'a Value>) -> Result<Option<&'a str>, FragmentError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(v) => Err(FragmentError::InvalidField {
            field,
            value: v.to_string(),
        }),
    }
}

/// Numbers, numeric strings, or absent. Anything else is a type error.
fn number_value(field: &'static str, value: Option<&Value>) -> Result<Option<f64>, FragmentError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(v) => {
            let parsed = match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            parsed
                .filter(|f| f.is_finite())
                .map(Some)
                .ok_or_else(|| FragmentError::InvalidField {
                    field,
                    value: v.to_string(),
                })
        }
    }
}

/// Confidence as a number in [0, 1], a percentage, or a high/medium/low label.
fn confidence_value(value: Option<&Value>) -> Result<Option<f64>, FragmentError> {
    if let Some(Value::String(label)) = value {
        match label.trim().to_lowercase().as_str() {
            "high" => return Ok(Some(0.85)),
            "medium" | "med" | "moderate" => return Ok(Some(0.6)),
            "low" => return Ok(Some(0.35)),
            _ => {}
        }
    }
    Ok(number_value("confidence", value)?.map(|c| if c > 1.0 && c <= 100.0 { c / 100.0 } else { c }))
}

/// Validate one structured insight record.
pub fn from_structured(
    record: &StructuredInsightRecord,
    source: &SourceRef,
) -> Result<InsightFragment, FragmentError> {
    let text = text_value(record.text.as_ref())?;
    let raw_type = name_value("type", record.insight_type.as_ref())?.unwrap_or_default();
    let node_type = match NodeType::parse_loose(raw_type) {
        Some(NodeType::Evidence) | Some(NodeType::CoreTruth) | None => {
            return Err(FragmentError::UnknownType(raw_type.to_string()))
        }
        Some(t) => t,
    };
    let severity = number_value("severity", record.severity.as_ref())?;
    let confidence = confidence_value(record.confidence.as_ref())?;
    let phase = as_text(record.category.as_ref()).unwrap_or_default();

    Ok(InsightFragment::thematic(
        FragmentKind::StructuredInsight { node_type },
        text,
        None,
        phase,
        source.clone(),
    )?
    .with_severity(severity)
    .with_confidence(confidence))
}

/// Validate one key-insight summary. The theme is inferred from its words.
pub fn from_key_insight(
    record: &KeyInsightRecord,
    source: &SourceRef,
) -> Result<InsightFragment, FragmentError> {
    let title = as_text(record.title.as_ref())
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let text = match (record.insight.as_ref(), title) {
        (None | Some(Value::Null), Some(title)) => title,
        (value, _) => text_value(value)?,
    };
    let node_type = classify_theme(&format!("{} {}", title.unwrap_or_default(), text));
    let confidence = confidence_value(record.confidence.as_ref())?;
    let evidence = record
        .evidence
        .iter()
        .filter_map(|v| v.as_str())
        .map(clean_text)
        .filter(|q| !q.is_empty())
        .collect();

    Ok(InsightFragment::thematic(
        FragmentKind::KeyInsight { node_type, evidence },
        text,
        title,
        KEY_INSIGHT_PHASE,
        source.clone(),
    )?
    .with_confidence(confidence))
}

/// Map a phase-note bucket name onto a node type.
pub fn bucket_type(bucket: &str) -> Option<NodeType> {
    let key: String = bucket
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    match key.as_str() {
        "future" | "vision" | "aspirations" => Some(NodeType::Vision),
        "beliefs" => Some(NodeType::Belief),
        "gaps" | "challenges" => Some(NodeType::Challenge),
        "frictions" | "painpoints" => Some(NodeType::Friction),
        "constraints" | "barriers" => Some(NodeType::Constraint),
        "strengths" | "working" | "support" | "enablers" => Some(NodeType::Enabler),
        _ => None,
    }
}

/// Validate one phase-note entry.
pub fn from_phase_note(
    phase: &str,
    bucket: &str,
    entry: &Value,
    source: &SourceRef,
) -> Result<InsightFragment, FragmentError> {
    let node_type = bucket_type(bucket).ok_or_else(|| FragmentError::UnknownBucket(bucket.to_string()))?;
    let text = text_value(Some(entry))?;
    InsightFragment::thematic(
        FragmentKind::PhaseNote {
            node_type,
            bucket: bucket.to_string(),
        },
        text,
        None,
        phase,
        source.clone(),
    )
}

const CONSTRAINT_CUES: &[&str] = &[
    "constrain", "barrier", "block", "bottleneck", "approval", "budget", "regulat", "complian",
    "legacy", "limit", "capacity", "headcount", "policy", "sign-off",
];
const FRICTION_CUES: &[&str] = &[
    "friction", "pain", "frustrat", "slow", "manual", "rework", "handoff", "hand-off", "delay",
    "duplicat", "workaround", "waiting",
];
const ENABLER_CUES: &[&str] = &[
    "enabl", "strength", "works well", "working well", "support", "asset", "capabilit", "trust",
    "collaborat", "automat", "empower",
];
const VISION_CUES: &[&str] = &["vision", "future", "aspir", "ambition", "goal", "north star", "want to be"];
const BELIEF_CUES: &[&str] = &["believe", "belief", "assum", "mindset", "culture", "perceiv", "feel that"];

/// Keyword-based theme for untyped text. Constraint cues win over friction,
/// friction over enabler, and so on; text with no cue is a challenge.
pub fn classify_theme(text: &str) -> NodeType {
    let lower = text.to_lowercase();
    let hit = |cues: &[&str]| cues.iter().any(|c| lower.contains(c));
    if hit(CONSTRAINT_CUES) {
        NodeType::Constraint
    } else if hit(FRICTION_CUES) {
        NodeType::Friction
    } else if hit(ENABLER_CUES) {
        NodeType::Enabler
    } else if hit(VISION_CUES) {
        NodeType::Vision
    } else if hit(BELIEF_CUES) {
        NodeType::Belief
    } else {
        NodeType::Challenge
    }
}

/// Validated thematic fragments of one session, plus the rejections.
///
/// Evidence answers are not included; they are selected across the whole
/// workshop by `adapter::evidence`.
pub fn session_fragments(
    session: &SessionRecords,
) -> (Vec<InsightFragment>, Vec<(SourceKind, FragmentError)>) {
    let source = session_source(session);
    let mut fragments = Vec::new();
    let mut rejected = Vec::new();

    let mut push = |kind: SourceKind, result: Result<InsightFragment, FragmentError>| match result {
        Ok(fragment) => fragments.push(fragment),
        Err(e) => rejected.push((kind, e)),
    };

    for record in &session.structured_insights {
        push(SourceKind::StructuredInsight, from_structured(record, &source));
    }
    for record in &session.key_insights {
        push(SourceKind::KeyInsight, from_key_insight(record, &source));
    }
    for notes in &session.phase_notes {
        for (bucket, entries) in &notes.buckets {
            match entries {
                Value::Array(items) => {
                    for entry in items {
                        push(
                            SourceKind::PhaseNote,
                            from_phase_note(&notes.phase, bucket, entry, &source),
                        );
                    }
                }
                Value::Null => {}
                single => push(
                    SourceKind::PhaseNote,
                    from_phase_note(&notes.phase, bucket, single, &source),
                ),
            }
        }
    }

    (fragments, rejected)
}
