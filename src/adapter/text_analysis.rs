//! Text normalization shared by the ingestion boundary and the edge builders.
//!
//! Node identity hangs off `identity_key()`, so any change to it changes which
//! fragments merge. Similarity hangs off `tokenize()`.

use std::collections::BTreeSet;

/// Maximum number of words in a node label.
pub const LABEL_WORDS: usize = 8;

/// Minimum token length (in chars) considered by the similarity builder.
const MIN_TOKEN_LEN: usize = 3;

/// Words carrying no thematic signal. Compared after lowercasing.
const STOPWORDS: &[&str] = &[
    // English function words.
    "about", "above", "after", "again", "against", "all", "also", "and", "any", "are",
    "because", "been", "before", "being", "below", "between", "both", "but", "can",
    "could", "did", "does", "doing", "down", "during", "each", "even", "every", "few",
    "for", "from", "further", "get", "gets", "got", "had", "has", "have", "having",
    "her", "here", "hers", "him", "his", "how", "into", "its", "itself", "just", "let",
    "lot", "lots", "many", "more", "most", "much", "must", "not", "now", "off", "once",
    "one", "only", "other", "our", "ours", "out", "over", "own", "same", "she",
    "should", "some", "such", "than", "that", "the", "their", "theirs", "them", "then",
    "there", "these", "they", "this", "those", "through", "too", "under", "until",
    "very", "was", "way", "were", "what", "when", "where", "which", "while", "who",
    "whom", "why", "will", "with", "within", "without", "would", "yet", "you", "your",
    "yours",
    // Interview filler.
    "really", "thing", "things", "think", "kind", "sort", "quite", "actually",
    "basically", "maybe", "bit", "like", "well", "yeah", "okay",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Trim, drop control characters and collapse internal whitespace.
pub fn clean_text(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Short label: the first `LABEL_WORDS` words with trailing punctuation removed.
pub fn summarize_label(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().take(LABEL_WORDS).collect();
    words
        .join(" ")
        .trim_end_matches(|c: char| c.is_ascii_punctuation() && c != ')' && c != '%')
        .to_string()
}

/// Identity key for merge: lowercase alphanumeric words joined by `-`.
///
/// Case, punctuation and spacing differences collapse onto the same key, so
/// "Approval process blocks releases." and "approval process, blocks releases"
/// merge.
pub fn identity_key(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Thematic token set: lowercased alphanumeric+hyphen runs of at least three
/// chars, stopwords removed.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .map(|t| t.trim_matches('-'))
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .filter(|t| !is_stopword(t))
        .map(str::to_string)
        .collect()
}

/// Jaccard index of two token sets. Zero when either set is empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
