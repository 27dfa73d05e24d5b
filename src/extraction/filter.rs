//! Pre-filter shared by every extraction engine.
//!
//! Filler text ("okay", "sounds good") and questions never carry durable
//! facts, so they are rejected before any engine looks at them.

/// Acknowledgements and small talk. Matched case-insensitively on word
/// boundaries, so "ok" does not reject "Oklahoma".
pub const TRIVIAL_PHRASES: &[&str] = &[
    "okay",
    "ok",
    "okey",
    "thanks",
    "thank you",
    "thx",
    "sounds good",
    "sounds great",
    "got it",
    "alright",
    "all right",
    "i'm fine",
    "im fine",
    "i am fine",
    "i'm good",
    "i am good",
    "i'm okay",
    "i'm ok",
    "no problem",
    "no worries",
    "never mind",
    "nevermind",
    "you're welcome",
    "see you",
    "good night",
    "goodbye",
    "lol",
    "haha",
    "hmm",
    "not much",
];

/// Words that a name template must not accept as a name.
pub const NOT_A_NAME: &[&str] = &[
    "fine", "okay", "ok", "good", "great", "well", "sure", "alright", "tired", "sorry",
    "back", "here", "there", "not", "just", "so", "very", "really", "done", "ready", "busy",
    "happy", "sad", "glad", "hungry", "excited", "bored", "sick", "home", "going", "doing",
    "trying", "looking", "working", "thinking", "afraid", "also", "still", "from",
    "confused", "stressed", "lost", "late", "new", "sleepy", "exhausted", "awake",
    "serious", "kidding", "joking", "curious", "free", "alone", "cool", "the", "an",
    "secret", "private", "irrelevant", "unknown", "nothing", "none", "hi", "hey", "hello",
    "in", "at", "on", "with", "your", "yours", "you", "me", "it", "that", "this",
];

/// Captures starting with one of these point back into the conversation
/// ("I love you", "I love it") rather than naming something about the user.
pub const PRONOUN_OBJECTS: &[&str] = &[
    "you", "u", "ya", "it", "that", "this", "these", "those", "them", "him", "her", "me",
    "us", "everyone", "everything", "everybody", "all",
];

const INTERROGATIVES: &[&str] = &[
    "what", "who", "whom", "whose", "where", "when", "why", "how", "which", "do", "does",
    "did", "can", "could", "would", "should", "is", "are",
];

/// Why an utterance was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TooShort,
    Trivial,
    Question,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooShort => "too_short",
            Self::Trivial => "trivial",
            Self::Question => "question",
        }
    }
}

/// Lower-case, straighten curly apostrophes, and collapse the text into
/// space-separated words.
fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace('\u{2019}', "'")
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// True when `text` contains any [`TRIVIAL_PHRASES`] entry as whole words.
pub fn contains_trivial_phrase(text: &str) -> bool {
    let padded = format!(" {} ", words(text).join(" "));
    TRIVIAL_PHRASES
        .iter()
        .any(|phrase| padded.contains(&format!(" {phrase} ")))
}

/// True when `name` is a filler word rather than a plausible name.
pub fn is_not_a_name(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    NOT_A_NAME.contains(&lower.as_str())
}

/// True when the first word of a captured value is a bare pronoun.
pub fn starts_with_pronoun(value: &str) -> bool {
    words(value)
        .first()
        .is_some_and(|w| PRONOUN_OBJECTS.contains(&w.as_str()))
}

/// Decide whether an utterance is worth extracting from.
pub fn prefilter(utterance: &str) -> Result<(), Rejection> {
    let words = words(utterance);
    if utterance.split_whitespace().count() < 3 {
        return Err(Rejection::TooShort);
    }
    if contains_trivial_phrase(utterance) {
        return Err(Rejection::Trivial);
    }
    if words
        .first()
        .is_some_and(|w| INTERROGATIVES.contains(&w.as_str()))
    {
        return Err(Rejection::Question);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_utterances_are_rejected() {
        assert_eq!(prefilter("Pizza rules"), Err(Rejection::TooShort));
        assert_eq!(prefilter(""), Err(Rejection::TooShort));
    }

    #[test]
    fn trivial_phrases_are_rejected() {
        assert_eq!(prefilter("Okay that sounds good"), Err(Rejection::Trivial));
        assert_eq!(prefilter("I'm fine, thanks anyway"), Err(Rejection::Trivial));
        assert_eq!(prefilter("I\u{2019}m fine today really"), Err(Rejection::Trivial));
    }

    #[test]
    fn trivial_match_respects_word_boundaries() {
        assert!(!contains_trivial_phrase("I'm from Oklahoma City"));
        assert!(!contains_trivial_phrase("My kid is named Kenji"));
        assert!(contains_trivial_phrase("ok."));
    }

    #[test]
    fn questions_are_rejected() {
        assert_eq!(prefilter("What is my favorite food?"), Err(Rejection::Question));
        assert_eq!(prefilter("do you remember my dog"), Err(Rejection::Question));
    }

    #[test]
    fn statements_pass() {
        assert_eq!(prefilter("My name is Alex"), Ok(()));
        assert_eq!(prefilter("I live in Boston now"), Ok(()));
    }

    #[test]
    fn filler_is_not_a_name() {
        assert!(is_not_a_name("Fine"));
        assert!(is_not_a_name(" okay "));
        assert!(!is_not_a_name("Alex"));
    }

    #[test]
    fn pronoun_captures() {
        assert!(starts_with_pronoun("you so much"));
        assert!(starts_with_pronoun("It, honestly"));
        assert!(!starts_with_pronoun("youth football"));
        assert!(!starts_with_pronoun("pizza"));
    }
}
