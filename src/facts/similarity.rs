//! Heuristic "same fact" test used by the store's dedup path.
//!
//! Two texts are similar when, after lower-casing and trimming, they are equal,
//! one contains the other, or their word sets overlap by more than `threshold`
//! relative to the smaller set. False positives are preferred to duplicates,
//! except across owners: "user's birthday" and "user's dog's birthday" are
//! never the same fact, however many words they share.

use std::collections::HashSet;

/// Default word-overlap threshold. Pinned current behavior, not a tuned value.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Lower-case and trim a fact text for comparison.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Verbs that end the subject of a fact text.
const COPULAS: &[&str] = &["is", "are", "was", "were"];

/// Words of normalized text in order. Surrounding punctuation is dropped;
/// inner apostrophes are kept so `user's` and `user` stay distinct.
fn words(normalized: &str) -> impl Iterator<Item = &str> {
    normalized
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
}

/// Split normalized text into a word set.
pub fn word_set(normalized: &str) -> HashSet<&str> {
    words(normalized).collect()
}

/// Whose fact this is: the words before the first copula, up to and including
/// the last possessive. `user's sister maya's birthday is july 2` gives
/// `["user's", "sister", "maya's"]`. `None` when the text has no copula or no
/// possessive before it.
pub fn owner(normalized: &str) -> Option<Vec<&str>> {
    let words: Vec<&str> = words(normalized).collect();
    let copula = words.iter().position(|w| COPULAS.contains(w))?;
    let subject = &words[..copula];
    let last = subject.iter().rposition(|w| w.ends_with("'s"))?;
    Some(subject[..=last].to_vec())
}

/// Word overlap relative to the smaller set: `|A ∩ B| / min(|A|, |B|)`.
pub fn overlap_ratio(a: &str, b: &str) -> f64 {
    let words_a = word_set(a);
    let words_b = word_set(b);
    let smaller = words_a.len().min(words_b.len());
    if smaller == 0 {
        return 0.0;
    }
    let shared = words_a.intersection(&words_b).count();
    shared as f64 / smaller as f64
}

/// Symmetric similarity test between two raw fact texts.
pub fn is_similar(a: &str, b: &str, threshold: f64) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return a == b;
    }
    if let (Some(owner_a), Some(owner_b)) = (owner(&a), owner(&b)) {
        if owner_a != owner_b {
            return false;
        }
    }
    if a == b || a.contains(&b) || b.contains(&a) {
        return true;
    }
    overlap_ratio(&a, &b) > threshold
}
