//! Core Truth synthesis
//!
//! Turns the top-ranked drivers into a single causal sentence. The
//! narrative service is tried first; any failure (disabled, unreachable,
//! timed out, malformed, empty or rejected by the sentence policy) falls
//! back to a fixed template over the driver labels, so synthesis always
//! yields a sentence.
//!
//! Service output is untrusted: it is parsed leniently, stripped down to
//! one clean sentence, and only then checked against the policy.

use crate::config::{NarrativeConfig, SentencePolicy};
use crate::narrative::{DriverDescriptor, NarrativeClient, NarrativeError, NarrativeRequest};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const MAX_SENTENCE_CHARS: usize = 400;
const STRICT_MIN_WORDS: usize = 16;
const STRICT_MAX_WORDS: usize = 28;

const SENTENCE_KEYS: &[&str] = &["coreTruth", "core_truth", "sentence"];

const PLACEHOLDER_LABELS: [&str; 3] = [
    "Limited shared insight",
    "fragmented priorities",
    "slow organisational change",
];

const CAUSAL_CONNECTIVES: &[&str] = &[
    "because",
    "drives",
    "driving",
    "driven by",
    "leads to",
    "leading to",
    "causes",
    "caused by",
    "so that",
    "therefore",
    "resulting in",
    "results in",
    "which means",
    "as a result",
    "due to",
    "fuels",
    "fuelling",
    "fueling",
    "undermines",
    "prevents",
    "amplifies",
    "amplifying",
    "blocks",
    "creates",
];

const META_WORDS: &[&str] = &["driver", "drivers", "node", "nodes", "graph", "graphs"];

/// Why the service sentence was not used.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("narrative service disabled")]
    Disabled,
    #[error("no driver nodes to describe")]
    NoDrivers,
    #[error("narrative service unavailable")]
    Unavailable,
    #[error("narrative service timed out after {0:?}")]
    Timeout(Duration),
    #[error("narrative service failed: {0}")]
    Service(#[from] NarrativeError),
    #[error("narrative service returned no usable sentence")]
    Empty,
    #[error("sentence rejected: {0}")]
    Rejected(String),
}

impl SynthesisError {
    /// Short, stable reason code for diagnostics.
    pub fn reason(&self) -> &'static str {
        match self {
            SynthesisError::Disabled => "disabled",
            SynthesisError::NoDrivers => "no_drivers",
            SynthesisError::Unavailable => "unavailable",
            SynthesisError::Timeout(_) => "timeout",
            SynthesisError::Service(_) => "service_error",
            SynthesisError::Empty => "empty",
            SynthesisError::Rejected(_) => "rejected",
        }
    }
}

/// Where the Core Truth sentence came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "origin")]
pub enum CoreTruthOrigin {
    Narrative,
    Fallback { reason: String },
}

impl CoreTruthOrigin {
    pub fn is_fallback(&self) -> bool {
        matches!(self, CoreTruthOrigin::Fallback { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreTruth {
    pub sentence: String,
    pub origin: CoreTruthOrigin,
}

/// Inputs to one synthesis.
#[derive(Debug, Clone, Default)]
pub struct SynthesisInput {
    /// Ranked drivers, most central first
    pub drivers: Vec<DriverDescriptor>,
    /// Labels of the central nodes, most central first
    pub central_labels: Vec<String>,
    pub quotes: Vec<String>,
}

pub struct CoreTruthSynthesizer {
    client: Option<Arc<dyn NarrativeClient>>,
    timeout: Duration,
    policy: SentencePolicy,
}

impl CoreTruthSynthesizer {
    /// A synthesizer that never calls out and always uses the template.
    pub fn fallback_only() -> Self {
        Self {
            client: None,
            timeout: NarrativeConfig::default().timeout(),
            policy: SentencePolicy::default(),
        }
    }

    pub fn new(client: Arc<dyn NarrativeClient>) -> Self {
        Self {
            client: Some(client),
            ..Self::fallback_only()
        }
    }

    /// Client from config when enabled, fallback-only otherwise.
    pub fn from_config(config: &NarrativeConfig, client: Option<Arc<dyn NarrativeClient>>) -> Self {
        let client = if config.enabled { client } else { None };
        Self {
            client,
            timeout: config.timeout(),
            policy: config.sentence_policy,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: SentencePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Try the narrative service once. No retry.
    pub async fn attempt(&self, input: &SynthesisInput) -> Result<String, SynthesisError> {
        let client = self.client.as_ref().ok_or(SynthesisError::Disabled)?;
        if input.drivers.is_empty() {
            return Err(SynthesisError::NoDrivers);
        }
        if !client.is_available().await {
            return Err(SynthesisError::Unavailable);
        }

        let request = NarrativeRequest {
            drivers: input.drivers.clone(),
            quotes: input.quotes.clone(),
        };
        let raw = tokio::time::timeout(self.timeout, client.compose(&request))
            .await
            .map_err(|_| SynthesisError::Timeout(self.timeout))??;

        let sentence = sanitize_response(&raw).ok_or(SynthesisError::Empty)?;
        validate_sentence(&sentence, self.policy)?;
        Ok(sentence)
    }

    /// Always produces a sentence: the service's when usable, the
    /// template's otherwise.
    pub async fn synthesize(&self, input: &SynthesisInput) -> CoreTruth {
        match self.attempt(input).await {
            Ok(sentence) => CoreTruth {
                sentence,
                origin: CoreTruthOrigin::Narrative,
            },
            Err(err) => {
                match &err {
                    SynthesisError::Disabled | SynthesisError::NoDrivers => {
                        tracing::debug!(reason = err.reason(), "using fallback core truth")
                    }
                    _ => tracing::warn!(reason = err.reason(), error = %err, "narrative failed, using fallback core truth"),
                }
                CoreTruth {
                    sentence: fallback_sentence(input),
                    origin: CoreTruthOrigin::Fallback {
                        reason: err.reason().to_string(),
                    },
                }
            }
        }
    }
}

/// `"{a} is driving {b}, amplifying {c}."` over driver labels, topped up
/// from central labels and then generic placeholders.
pub fn fallback_sentence(input: &SynthesisInput) -> String {
    let mut labels: Vec<String> = Vec::with_capacity(3);
    let candidates = input
        .drivers
        .iter()
        .map(|d| d.label.as_str())
        .chain(input.central_labels.iter().map(String::as_str));

    for label in candidates {
        if labels.len() == 3 {
            break;
        }
        let label = trim_label(label);
        if label.is_empty() || labels.iter().any(|l| l.eq_ignore_ascii_case(&label)) {
            continue;
        }
        labels.push(label);
    }
    for placeholder in PLACEHOLDER_LABELS.iter().skip(labels.len()) {
        labels.push(placeholder.to_string());
    }

    format!(
        "{} is driving {}, amplifying {}.",
        capitalize_first(&labels[0]),
        lower_first(&labels[1]),
        lower_first(&labels[2]),
    )
}

fn trim_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(|c: char| matches!(c, '.' | '!' | '?' | ',' | ';' | ':'))
        .to_string()
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercase the first letter unless the first word is an acronym.
fn lower_first(s: &str) -> String {
    let first_word = s.split_whitespace().next().unwrap_or_default();
    let is_acronym = first_word.chars().filter(|c| c.is_alphabetic()).count() > 1
        && first_word.chars().filter(|c| c.is_alphabetic()).all(char::is_uppercase);
    if is_acronym {
        return s.to_string();
    }
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Extract a JSON object from service output.
///
/// Tries a direct parse, then a fenced code block, then the span from the
/// first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();

    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if v.is_object() {
            return Some(v);
        }
    }

    let fenced = if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        after.find("```").map(|end| &after[..end])
    } else if let Some(start) = trimmed.find("```\n") {
        let after = &trimmed[start + 4..];
        after.find("```").map(|end| &after[..end])
    } else {
        None
    };
    if let Some(block) = fenced {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(block.trim()) {
            if v.is_object() {
                return Some(v);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(v) = serde_json::from_str::<serde_json::Value>(&trimmed[start..=end]) {
                if v.is_object() {
                    return Some(v);
                }
            }
        }
    }

    None
}

/// Raw service output to one clean sentence, or `None` if nothing usable
/// remains. A reply without a JSON object is taken as the sentence itself.
pub fn sanitize_response(raw: &str) -> Option<String> {
    let text = match extract_json(raw) {
        Some(object) => SENTENCE_KEYS
            .iter()
            .find_map(|key| object.get(*key).and_then(|v| v.as_str()))?
            .to_string(),
        None => raw.to_string(),
    };
    let sentence = clean_sentence(&text);
    (!sentence.is_empty()).then_some(sentence)
}

/// Strip control characters, wrapping quotes and list markers; keep the
/// first sentence; cap the length; end with punctuation.
pub fn clean_sentence(text: &str) -> String {
    let collapsed = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let unbulleted = strip_wrapping(strip_list_marker(strip_wrapping(&collapsed)));

    let first = first_sentence(unbulleted);
    let capped: String = first.chars().take(MAX_SENTENCE_CHARS).collect();
    let body = capped
        .trim()
        .trim_end_matches(|c: char| matches!(c, ',' | ';' | ':' | '-' | '"' | '\'' | '`'))
        .trim_end();

    if body.chars().all(|c| !c.is_alphanumeric()) {
        return String::new();
    }
    if body.ends_with(|c: char| matches!(c, '.' | '!' | '?')) {
        body.to_string()
    } else {
        format!("{}.", body)
    }
}

fn strip_wrapping(text: &str) -> &str {
    text.trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '“' | '”') || c.is_whitespace())
}

fn strip_list_marker(text: &str) -> &str {
    let text = text.trim_start_matches(|c: char| matches!(c, '-' | '*' | '•' | '>' | '#') || c.is_whitespace());
    let digits = text.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &text[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            if stripped.starts_with(' ') {
                return stripped.trim_start();
            }
        }
    }
    text
}

fn first_sentence(text: &str) -> &str {
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            match chars.peek() {
                None => return text,
                Some((_, next)) if next.is_whitespace() => return &text[..i + c.len_utf8()],
                _ => {}
            }
        }
    }
    text
}

/// Policy check on an already cleaned sentence.
pub fn validate_sentence(sentence: &str, policy: SentencePolicy) -> Result<(), SynthesisError> {
    if sentence.trim().is_empty() {
        return Err(SynthesisError::Empty);
    }
    if policy == SentencePolicy::Permissive {
        return Ok(());
    }

    let words = sentence.split_whitespace().count();
    if !(STRICT_MIN_WORDS..=STRICT_MAX_WORDS).contains(&words) {
        return Err(SynthesisError::Rejected(format!(
            "{} words, expected {}-{}",
            words, STRICT_MIN_WORDS, STRICT_MAX_WORDS
        )));
    }

    let normalized: String = sentence
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect();
    let padded = format!(" {} ", normalized.split_whitespace().collect::<Vec<_>>().join(" "));

    if !CAUSAL_CONNECTIVES.iter().any(|c| padded.contains(&format!(" {} ", c))) {
        return Err(SynthesisError::Rejected("no causal connective".to_string()));
    }
    if let Some(word) = META_WORDS.iter().find(|w| padded.contains(&format!(" {} ", w))) {
        return Err(SynthesisError::Rejected(format!("meta-reference '{}'", word)));
    }
    Ok(())
}
