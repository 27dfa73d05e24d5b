//! Extraction through a language model.
//!
//! One completion call per utterance. The reply is scanned for the first
//! balanced JSON array; anything unparseable, late, or failing the quality
//! filters is dropped, so this engine never blocks learning.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use super::completion::CompletionService;
use super::filter::{self, contains_trivial_phrase};
use super::ExtractionEngine;
use crate::facts::{CandidateFact, Category};

/// Minimum length of an accepted fact text, in characters.
pub const MIN_FACT_CHARS: usize = 10;

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract durable personal facts about the user from a single chat message.

Reply with a JSON array only, no prose. Each element is an object:
  {"fact": "User's name is Alex", "category": "identity", "confidence": 0.95}

Categories: identity, interests, preferences, relationships, events, goals, routines, other.

Rules:
- Only facts the user explicitly stated or strongly implied about themselves or people and pets in their life.
- Always say whose fact it is. "My dog's birthday is June 5" becomes "User's dog's birthday is June 5" (relationships), never "User's birthday is June 5".
- Skip greetings, acknowledgements, small talk and generic statements ("okay", "sounds good", "I'm fine").
- Confidence is 0.0 to 1.0. Leave out anything below 0.85.
- Reply [] when there is nothing worth remembering."#;

/// One element of the model's reply before filtering.
#[derive(Debug, Deserialize)]
struct RawCandidate {
    #[serde(alias = "text", alias = "content")]
    fact: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    confidence: f64,
}

pub struct ModelAssistedExtractor {
    service: Arc<dyn CompletionService>,
    timeout: Duration,
    min_confidence: f64,
}

impl ModelAssistedExtractor {
    pub fn new(service: Arc<dyn CompletionService>, timeout: Duration, min_confidence: f64) -> Self {
        Self {
            service,
            timeout,
            min_confidence,
        }
    }

    fn accept(&self, raw: RawCandidate) -> Option<CandidateFact> {
        let text = raw.fact.trim();
        if raw.confidence < self.min_confidence
            || text.chars().count() < MIN_FACT_CHARS
            || contains_trivial_phrase(text)
        {
            return None;
        }
        Some(CandidateFact::new(
            text,
            Category::parse_lenient(&raw.category),
            raw.confidence,
        ))
    }
}

#[async_trait]
impl ExtractionEngine for ModelAssistedExtractor {
    fn name(&self) -> &'static str {
        "model"
    }

    async fn extract(&self, utterance: &str) -> Result<Vec<CandidateFact>> {
        if let Err(reason) = filter::prefilter(utterance) {
            tracing::trace!(reason = reason.as_str(), "model extractor skipped utterance");
            return Ok(Vec::new());
        }

        let prompt = format!("User said: \"{}\"", utterance.trim());
        let reply = match tokio::time::timeout(
            self.timeout,
            self.service.complete(EXTRACTION_SYSTEM_PROMPT, &prompt),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "completion service failed, no model facts this turn");
                return Ok(Vec::new());
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs_f64(), "completion timed out, no model facts this turn");
                return Ok(Vec::new());
            }
        };

        let Some(items) = first_json_array(&reply) else {
            tracing::debug!("no JSON array in completion reply");
            return Ok(Vec::new());
        };

        Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<RawCandidate>(item).ok())
            .filter_map(|raw| self.accept(raw))
            .collect())
    }
}

/// Find the first bracket-balanced `[...]` region that parses as a JSON array.
/// Brackets inside string literals are ignored.
pub fn first_json_array(text: &str) -> Option<Vec<serde_json::Value>> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(offset) = text[start..].find('[') {
        let open = start + offset;
        if let Some(close) = matching_bracket(bytes, open) {
            if let Ok(items) = serde_json::from_str::<Vec<serde_json::Value>>(&text[open..=close]) {
                return Some(items);
            }
        }
        start = open + 1;
    }
    None
}

/// Index of the `]` closing the `[` at `open`, or `None` if unbalanced.
fn matching_bracket(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
