//! Core fact type definitions.
//!
//! Defines [`Category`] (the eight fact categories), [`Fact`] (a stored record),
//! and [`CandidateFact`] (an extractor's proposal before gating and dedup).

use serde::{Deserialize, Deserializer, Serialize};

/// What a fact is about. Unknown labels collapse to [`Category::Other`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Name, age, birthday, location, occupation.
    Identity,
    Interests,
    Preferences,
    /// Family, friends, pets, and facts about them.
    Relationships,
    Events,
    Goals,
    Routines,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Self::Identity,
        Self::Interests,
        Self::Preferences,
        Self::Relationships,
        Self::Events,
        Self::Goals,
        Self::Routines,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Interests => "interests",
            Self::Preferences => "preferences",
            Self::Relationships => "relationships",
            Self::Events => "events",
            Self::Goals => "goals",
            Self::Routines => "routines",
            Self::Other => "other",
        }
    }

    /// Heading used when rendering context blocks (`"Identity"`, ...).
    pub fn title(&self) -> &'static str {
        match self {
            Self::Identity => "Identity",
            Self::Interests => "Interests",
            Self::Preferences => "Preferences",
            Self::Relationships => "Relationships",
            Self::Events => "Events",
            Self::Goals => "Goals",
            Self::Routines => "Routines",
            Self::Other => "Other",
        }
    }

    /// Map a free-form label to a category. Never fails.
    pub fn parse_lenient(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "identity" => Self::Identity,
            "interests" | "interest" => Self::Interests,
            "preferences" | "preference" => Self::Preferences,
            "relationships" | "relationship" => Self::Relationships,
            "events" | "event" => Self::Events,
            "goals" | "goal" => Self::Goals,
            "routines" | "routine" => Self::Routines,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Self::parse_lenient(&label))
    }
}

/// A stored fact, as written to the fact file and the training export.
///
/// Field names are part of the export format consumed by fine-tuning
/// pipelines; do not rename them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// UUID v7 assigned at first insert.
    #[serde(default)]
    pub id: String,
    /// The natural-language statement. Older files call this `fact`.
    #[serde(alias = "fact")]
    pub text: String,
    #[serde(default)]
    pub category: Category,
    /// Clamped to `[0.0, 1.0]` before storage.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// RFC 3339 insert timestamp.
    #[serde(default, alias = "timestamp")]
    pub created_at: String,
    #[serde(default)]
    pub last_accessed_at: Option<String>,
    #[serde(default)]
    pub access_count: u32,
    /// Which engine produced the fact (`pattern`, `model`, `manual`).
    #[serde(default)]
    pub source_engine: String,
    /// Truncated copy of the triggering message.
    #[serde(default)]
    pub source_utterance: String,
}

fn default_confidence() -> f64 {
    1.0
}

impl Fact {
    /// Build a fresh fact stamped with a new id and the current time.
    pub fn new(
        text: impl Into<String>,
        category: Category,
        confidence: f64,
        source_engine: impl Into<String>,
        source_utterance: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            text: text.into().trim().to_string(),
            category,
            confidence: clamp_confidence(confidence),
            created_at: now_timestamp(),
            last_accessed_at: None,
            access_count: 0,
            source_engine: source_engine.into(),
            source_utterance: source_utterance.into(),
        }
    }
}

/// A fact proposed by an extraction engine, before the confidence gate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFact {
    pub text: String,
    pub category: Category,
    pub confidence: f64,
}

impl CandidateFact {
    pub fn new(text: impl Into<String>, category: Category, confidence: f64) -> Self {
        Self {
            text: text.into(),
            category,
            confidence: clamp_confidence(confidence),
        }
    }
}

/// Clamp to `[0.0, 1.0]`; NaN becomes 0.0 so it can never pass a gate.
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Current UTC time as fixed-width RFC 3339, so timestamps sort as strings.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
