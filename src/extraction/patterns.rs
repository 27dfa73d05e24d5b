//! Regex-template extraction: fast, deterministic, always available.
//!
//! Each [`PatternTemplate`] binds a regex to a category, a fixed confidence,
//! and a fact-text template whose `{capture}` placeholders are filled from the
//! regex's named groups.

use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;

use super::filter::{self, is_not_a_name, starts_with_pronoun};
use super::ExtractionEngine;
use crate::facts::{CandidateFact, Category};

/// One declarative extraction rule.
#[derive(Debug, Clone, Copy)]
pub struct PatternTemplate {
    pub name: &'static str,
    pub pattern: &'static str,
    pub category: Category,
    pub confidence: f64,
    pub template: &'static str,
}

/// Ordered rule table. Several rules may fire on one utterance.
pub const TEMPLATES: &[PatternTemplate] = &[
    PatternTemplate {
        name: "name",
        pattern: r"(?i)\b(?:my name is|my name's|call me)\s+(?P<name>[a-z]{2,})\b",
        category: Category::Identity,
        confidence: 0.95,
        template: "User's name is {name}",
    },
    PatternTemplate {
        name: "name_intro",
        pattern: r"(?i)^(?:i'm|i am)\s+(?P<name>[a-z]{2,})\s*(?:[.,!]|$)",
        category: Category::Identity,
        confidence: 0.88,
        template: "User's name is {name}",
    },
    PatternTemplate {
        name: "birthday",
        pattern: r"(?i)\b(?:my birthday is(?: on)?|i was born on)\s+(?P<date>[^.!?]+)",
        category: Category::Identity,
        confidence: 0.95,
        template: "User's birthday is {date}",
    },
    PatternTemplate {
        name: "named_relative_birthday",
        pattern: r"(?i)\bmy\s+(?P<who>dog|cat|pet|puppy|kitten|son|daughter|kid|wife|husband|partner|mom|mother|dad|father|brother|sister|friend|girlfriend|boyfriend|grandma|grandmother|grandpa|grandfather)\s+(?P<name>[a-z]+)'s\s+birthday\s+is(?: on)?\s+(?P<date>[^.!?]+)",
        category: Category::Relationships,
        confidence: 0.92,
        template: "User's {who} {name}'s birthday is {date}",
    },
    PatternTemplate {
        name: "relative_birthday",
        pattern: r"(?i)\bmy\s+(?P<who>dog|cat|pet|puppy|kitten|son|daughter|kid|wife|husband|partner|mom|mother|dad|father|brother|sister|friend|girlfriend|boyfriend|grandma|grandmother|grandpa|grandfather)'s\s+birthday\s+is(?: on)?\s+(?P<date>[^.!?]+)",
        category: Category::Relationships,
        confidence: 0.92,
        template: "User's {who}'s birthday is {date}",
    },
    PatternTemplate {
        name: "lives_in",
        pattern: r"(?i)\bi\s+live\s+in\s+(?P<place>[^.!?,]+)",
        category: Category::Identity,
        confidence: 0.9,
        template: "User lives in {place}",
    },
    PatternTemplate {
        name: "from",
        pattern: r"(?i)\b(?:i'm|i am)\s+from\s+(?P<place>[^.!?,]+)",
        category: Category::Identity,
        confidence: 0.9,
        template: "User is from {place}",
    },
    PatternTemplate {
        name: "works_as",
        pattern: r"(?i)\bi\s+work\s+as\s+(?P<role>[^.!?,]+)",
        category: Category::Identity,
        confidence: 0.9,
        template: "User works as {role}",
    },
    PatternTemplate {
        name: "favorite",
        pattern: r"(?i)\bmy\s+favou?rite\s+(?P<kind>[a-z][a-z ]{1,30}?)\s+is\s+(?P<value>[^.!?]+)",
        category: Category::Preferences,
        confidence: 0.92,
        template: "User's favorite {kind} is {value}",
    },
    PatternTemplate {
        name: "love",
        pattern: r"(?i)\bi\s+(?:really\s+|absolutely\s+)?love\s+(?P<thing>[^.!?]+)",
        category: Category::Preferences,
        confidence: 0.88,
        template: "User loves {thing}",
    },
    PatternTemplate {
        name: "prefer",
        pattern: r"(?i)\bi\s+(?:really\s+)?prefer\s+(?P<choice>[^.!?]+?)\s+(?:over|to)\s+(?P<other>[^.!?]+)",
        category: Category::Preferences,
        confidence: 0.88,
        template: "User prefers {choice} over {other}",
    },
    PatternTemplate {
        name: "enjoys",
        pattern: r"(?i)\b(?:i\s+enjoy|i'm\s+into|i\s+am\s+into|big\s+fan\s+of|passionate\s+about)\s+(?P<thing>[^.!?]+)",
        category: Category::Interests,
        confidence: 0.86,
        template: "User enjoys {thing}",
    },
    PatternTemplate {
        name: "goal",
        pattern: r"(?i)\bmy\s+goal\s+is\s+to\s+(?P<goal>[^.!?]+)",
        category: Category::Goals,
        confidence: 0.86,
        template: "User's goal is to {goal}",
    },
];

/// Clauses after these words usually start a second statement.
const CLAUSE_BREAKS: &[&str] = &[" and ", " but ", " because ", " so ", " though "];

/// Cut a capture at the first clause break and trim stray punctuation.
fn clean_capture(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    let end = CLAUSE_BREAKS
        .iter()
        .filter_map(|brk| lower.find(brk))
        .min()
        .unwrap_or(raw.len());
    raw[..end]
        .trim()
        .trim_end_matches(|c: char| matches!(c, ',' | ';' | ':' | '.' | '!' | '?'))
        .trim()
        .to_string()
}

/// Rule table compiled once.
static COMPILED: LazyLock<Vec<(PatternTemplate, Regex)>> = LazyLock::new(|| {
    TEMPLATES
        .iter()
        .filter_map(|t| match Regex::new(t.pattern) {
            Ok(re) => Some((*t, re)),
            Err(e) => {
                tracing::error!(template = t.name, error = %e, "invalid extraction pattern");
                None
            }
        })
        .collect()
});

/// Upper-case the first letter, leaving the rest as typed ("alex" → "Alex",
/// "DeShawn" unchanged).
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Apply one template to an utterance.
fn apply(template: &PatternTemplate, regex: &Regex, utterance: &str) -> Option<CandidateFact> {
    let caps = regex.captures(utterance)?;
    let mut text = template.template.to_string();
    for group in regex.capture_names().flatten() {
        let value = caps.name(group).map(|m| clean_capture(m.as_str()))?;
        if value.is_empty() {
            return None;
        }
        let value = if group == "name" {
            if is_not_a_name(&value) {
                return None;
            }
            capitalize(&value)
        } else if starts_with_pronoun(&value) {
            return None;
        } else {
            value
        };
        text = text.replace(&format!("{{{group}}}"), &value);
    }
    Some(CandidateFact::new(text, template.category, template.confidence))
}

/// Extraction engine over [`TEMPLATES`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternExtractor;

impl PatternExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous core, usable outside an async context.
    pub fn extract_sync(&self, utterance: &str) -> Vec<CandidateFact> {
        let utterance = utterance.replace('\u{2019}', "'");
        if let Err(reason) = filter::prefilter(&utterance) {
            tracing::trace!(reason = reason.as_str(), "pattern extractor skipped utterance");
            return Vec::new();
        }
        COMPILED
            .iter()
            .filter_map(|(template, regex)| apply(template, regex, &utterance))
            .collect()
    }
}

#[async_trait]
impl ExtractionEngine for PatternExtractor {
    fn name(&self) -> &'static str {
        "pattern"
    }

    async fn extract(&self, utterance: &str) -> Result<Vec<CandidateFact>> {
        Ok(self.extract_sync(utterance))
    }
}
