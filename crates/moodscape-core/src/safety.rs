//! Harmful-content detection for journal entries.
//!
//! Matching is plain case-insensitive substring search against a fixed phrase
//! list, so "end it" also fires inside "spend it".

/// Phrases that flag an entry as potentially harmful. Always lowercase.
pub const HARMFUL_PHRASES: &[&str] = &[
    "kill myself",
    "suicide",
    "end it",
    "i want to die",
    "i want to hurt myself",
    "i'm done living",
    "i want to disappear",
    "self harm",
    "hurt myself",
    "cut myself",
    "i wish i was dead",
];

/// Longest slice of the entry kept alongside each harmful-word log row.
pub const LOG_CONTEXT_CHARS: usize = 300;

/// Every listed phrase contained in `text`, in list order.
pub fn find_harmful_phrases(text: &str) -> Vec<&'static str> {
    if text.is_empty() {
        return Vec::new();
    }

    let lowered = text.to_lowercase();
    HARMFUL_PHRASES
        .iter()
        .copied()
        .filter(|phrase| lowered.contains(phrase))
        .collect()
}

/// First `LOG_CONTEXT_CHARS` characters of an entry, cut on a char boundary.
pub fn log_context(text: &str) -> String {
    text.chars().take(LOG_CONTEXT_CHARS).collect()
}
