//! Raw records as supplied by the data source
//!
//! These mirror what upstream writers store and are deliberately loose:
//! optional text, numbers that may arrive as strings, free-form note
//! buckets. Validation happens once, at the fragment boundary
//! (`adapter::fragment`), never downstream.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// String content of a loosely typed field; any other JSON type reads as absent.
pub fn as_text(value: Option<&Value>) -> Option<&str> {
    match value {
        Some(Value::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

/// A record list that drops entries of the wrong shape instead of failing
/// the whole session. A non-array reads as empty.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => {
            tracing::debug!(value = %other, "record list is not an array, ignored");
            Vec::new()
        }
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(error = %e, "skipped malformed record");
                None
            }
        })
        .collect())
}

/// All completed sessions of one workshop run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkshopRecords {
    pub workshop_id: String,
    #[serde(default)]
    pub run_type: String,
    #[serde(default)]
    pub sessions: Vec<SessionRecords>,
}

impl WorkshopRecords {
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Distinct participants; sessions without a name count individually.
    pub fn participant_count(&self) -> usize {
        self.sessions
            .iter()
            .map(|s| match s.participant().map(str::trim) {
                Some(name) if !name.is_empty() => format!("name:{}", name.to_lowercase()),
                _ => format!("session:{}", s.session_id),
            })
            .collect::<std::collections::BTreeSet<_>>()
            .len()
    }
}

/// One completed participant session and everything recorded for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecords {
    pub session_id: String,
    #[serde(default)]
    pub participant_name: Option<Value>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub structured_insights: Vec<StructuredInsightRecord>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub key_insights: Vec<KeyInsightRecord>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub phase_notes: Vec<PhaseNotesRecord>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub answers: Vec<AnswerRecord>,
}

impl SessionRecords {
    /// The participant's name, when recorded as a string.
    pub fn participant(&self) -> Option<&str> {
        as_text(self.participant_name.as_ref())
    }
}

/// A classified insight (`type`, `category`, `text`, `severity`, `confidence`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredInsightRecord {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, rename = "type")]
    pub insight_type: Option<Value>,
    #[serde(default)]
    pub category: Option<Value>,
    #[serde(default)]
    pub text: Option<Value>,
    #[serde(default)]
    pub severity: Option<Value>,
    #[serde(default)]
    pub confidence: Option<Value>,
}

/// A key-insight summary from a participant report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyInsightRecord {
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub insight: Option<Value>,
    /// A label ("high" / "medium" / "low") or a number
    #[serde(default)]
    pub confidence: Option<Value>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub evidence: Vec<Value>,
}

/// Narrative notes for one interview phase, keyed by bucket
/// (`future`, `frictions`, `constraints`, `strengths`, `working`, `gaps`,
/// `painPoints`, `barriers`, `support`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseNotesRecord {
    pub phase: String,
    #[serde(flatten)]
    pub buckets: BTreeMap<String, Value>,
}

/// A free-text answer keyed `phase:tag:index`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub key: String,
    #[serde(default)]
    pub text: Option<Value>,
}
