//! Evidence excerpt selection
//!
//! Long free-text answers become EVIDENCE nodes. Answers are keyed
//! `phase:tag:index`; rating answers and short answers are dropped, and the
//! longest answers across the whole workshop are kept.

use crate::adapter::fragment::{session_source, InsightFragment};
use crate::adapter::text_analysis::{clean_text, word_count};
use crate::graph::Node;
use crate::storage::{as_text, SessionRecords};

/// A parsed `phase:tag:index` answer key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerKey<'a> {
    pub phase: &'a str,
    pub tag: &'a str,
    pub index: u32,
}

/// Parse `phase:tag:index`. All three parts are required.
pub fn parse_answer_key(key: &str) -> Option<AnswerKey<'_>> {
    let mut parts = key.split(':');
    let phase = parts.next()?.trim();
    let tag = parts.next()?.trim();
    let index = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() || phase.is_empty() || tag.is_empty() {
        return None;
    }
    Some(AnswerKey { phase, tag, index })
}

/// Tags holding numeric self-assessments rather than narrative.
pub fn is_rating_tag(tag: &str) -> bool {
    let tag = tag.to_lowercase();
    tag == "score" || tag == "scale" || tag.ends_with("rating")
}

/// Pick the evidence excerpts for a workshop.
///
/// Keeps non-rating answers with at least `min_words` words, ranks them by
/// word count (ties by session id, then key) and returns the top `limit` as
/// evidence fragments.
pub fn select_evidence(
    sessions: &[SessionRecords],
    limit: usize,
    min_words: usize,
) -> Vec<InsightFragment> {
    let mut candidates: Vec<(usize, &str, &str, InsightFragment)> = Vec::new();

    for session in sessions {
        let source = session_source(session);
        for answer in &session.answers {
            let Some(key) = parse_answer_key(&answer.key) else {
                continue;
            };
            if is_rating_tag(key.tag) {
                continue;
            }
            let text = clean_text(as_text(answer.text.as_ref()).unwrap_or_default());
            let words = word_count(&text);
            if words < min_words {
                continue;
            }
            if let Ok(fragment) =
                InsightFragment::evidence(&text, &answer.key, key.phase, source.clone())
            {
                candidates.push((words, session.session_id.as_str(), answer.key.as_str(), fragment));
            }
        }
    }

    candidates.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| a.1.cmp(b.1))
            .then_with(|| a.2.cmp(b.2))
    });
    candidates.truncate(limit);
    candidates.into_iter().map(|(_, _, _, f)| f).collect()
}

/// Quotes for the narrative prompt: the drivers' own evidence first, then
/// evidence node text, de-duplicated, at most `limit`.
pub fn collect_quotes<'a>(
    drivers: impl IntoIterator<Item = &'a Node>,
    evidence_nodes: impl IntoIterator<Item = &'a Node>,
    limit: usize,
) -> Vec<String> {
    let mut quotes: Vec<String> = Vec::new();
    let driver_quotes = drivers.into_iter().flat_map(|n| n.evidence.iter().cloned());
    let excerpt_quotes = evidence_nodes.into_iter().map(|n| n.summary.clone());

    for quote in driver_quotes.chain(excerpt_quotes) {
        if quotes.len() >= limit {
            break;
        }
        if !quote.is_empty() && !quotes.contains(&quote) {
            quotes.push(quote);
        }
    }
    quotes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeId, NodeType};
    use crate::storage::AnswerRecord;
    use serde_json::Value;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ")
    }

    fn session(id: &str, answers: Vec<(&str, String)>) -> SessionRecords {
        SessionRecords {
            session_id: id.to_string(),
            participant_name: Some(Value::String(format!("P-{}", id))),
            answers: answers
                .into_iter()
                .map(|(key, text)| AnswerRecord {
                    key: key.to_string(),
                    text: Some(Value::String(text)),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn parses_answer_keys() {
        assert_eq!(
            parse_answer_key("delivery:story:2"),
            Some(AnswerKey {
                phase: "delivery",
                tag: "story",
                index: 2
            })
        );
        assert_eq!(parse_answer_key("delivery:story"), None);
        assert_eq!(parse_answer_key("delivery:story:x"), None);
        assert_eq!(parse_answer_key("a:b:1:extra"), None);
        assert_eq!(parse_answer_key(":story:1"), None);
    }

    #[test]
    fn rating_tags_are_recognized() {
        assert!(is_rating_tag("rating"));
        assert!(is_rating_tag("confidence_rating"));
        assert!(is_rating_tag("Score"));
        assert!(!is_rating_tag("story"));
        assert!(!is_rating_tag("example"));
    }

    #[test]
    fn selects_long_non_rating_answers_longest_first() {
        let sessions = vec![
            session(
                "S1",
                vec![
                    ("delivery:story:0", words(20)),
                    ("delivery:rating:0", words(40)),
                    ("delivery:story:1", words(10)),
                ],
            ),
            session("S2", vec![("people:example:0", words(30)), ("malformed", words(50))]),
        ];

        let selected = select_evidence(&sessions, 45, 18);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].source.session_id, "S2");
        assert_eq!(selected[0].phase, "people");
        assert_eq!(selected[1].node_id(), NodeId::evidence("S1", "delivery:story:0"));
        assert!(selected.iter().all(|f| f.node_type() == NodeType::Evidence));
    }

    #[test]
    fn selection_respects_limit() {
        let answers: Vec<(String, String)> = (0..10)
            .map(|i| (format!("delivery:story:{}", i), words(18 + i)))
            .collect();
        let sessions = vec![session(
            "S1",
            answers.iter().map(|(k, t)| (k.as_str(), t.clone())).collect(),
        )];
        let selected = select_evidence(&sessions, 3, 18);
        assert_eq!(selected.len(), 3);
        // Longest is index 9 (27 words).
        assert_eq!(selected[0].node_id(), NodeId::evidence("S1", "delivery:story:9"));
    }

    #[test]
    fn quotes_prefer_driver_evidence_and_dedupe() {
        let driver = Node::new(NodeId::from("friction:x"), NodeType::Friction, "x", "x")
            .with_evidence("We wait weeks.")
            .with_evidence("Nobody owns it.");
        let excerpt = Node::new(
            NodeId::evidence("S1", "a:b:0"),
            NodeType::Evidence,
            "We wait weeks.",
            "We wait weeks.",
        );
        let other = Node::new(NodeId::evidence("S1", "a:b:1"), NodeType::Evidence, "q", "Long story.");

        let quotes = collect_quotes([&driver], [&excerpt, &other], 10);
        assert_eq!(quotes, vec!["We wait weeks.", "Nobody owns it.", "Long story."]);

        let capped = collect_quotes([&driver], [&excerpt, &other], 2);
        assert_eq!(capped.len(), 2);
    }
}
