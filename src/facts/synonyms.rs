//! Query tokenization and synonym expansion for keyword search.

use std::collections::BTreeSet;

/// Static expansion table: a query word on the left also matches every word on
/// the right.
pub const SYNONYMS: &[(&str, &[&str])] = &[
    ("birthday", &["born", "age", "bday"]),
    ("favorite", &["favourite", "fav", "like", "prefer", "love"]),
    ("favourite", &["favorite", "fav", "like", "prefer", "love"]),
    ("pizza", &["pie"]),
    ("food", &["eat", "meal", "dish"]),
    ("game", &["gaming", "play"]),
    ("live", &["from", "location"]),
    ("name", &["called"]),
    ("job", &["work", "occupation"]),
    ("pet", &["dog", "cat"]),
];

/// Words carrying no retrieval signal. Matching is by substring, so these
/// would otherwise hit nearly every stored fact.
const STOPWORDS: &[&str] = &[
    "the", "and", "are", "was", "were", "what", "who", "whom", "whose", "where", "when",
    "why", "how", "which", "does", "did", "you", "your", "for", "about", "with", "have",
    "has", "that", "this", "tell", "know", "can", "could", "would", "should", "will",
    "remember", "any", "some", "there", "their", "they", "them", "its", "it's", "i'm",
    "user", "user's",
];

/// Split a query into lower-cased search tokens.
///
/// Tokens shorter than three characters and stopwords are dropped.
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Tokenize a query and add every synonym of every token.
pub fn expand_query(query: &str) -> BTreeSet<String> {
    let mut expanded = BTreeSet::new();
    for token in tokenize(query) {
        if let Some((_, extra)) = SYNONYMS.iter().find(|(word, _)| *word == token) {
            expanded.extend(extra.iter().map(|s| s.to_string()));
        }
        expanded.insert(token);
    }
    expanded
}
