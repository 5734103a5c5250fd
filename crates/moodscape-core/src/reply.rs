//! Shaping of the supportive reply stored with each journal entry.

use lazy_static::lazy_static;
use regex::Regex;

/// Hard ceiling on reply length, in characters.
pub const MAX_REPLY_CHARS: usize = 320;
/// Replies are cut down to this many sentences.
pub const MAX_REPLY_SENTENCES: usize = 2;

lazy_static! {
    static ref URL_REGEX: Regex = Regex::new(r"https?://\S+").unwrap();
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
    static ref SENTENCE_REGEX: Regex = Regex::new(r"[^.!?]+[.!?]?").unwrap();
}

/// Strip links, keep the first two sentences and cap the length.
pub fn sanitize_and_shorten(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let without_links = URL_REGEX.replace_all(text, "");
    let collapsed = WHITESPACE_REGEX.replace_all(&without_links, " ");
    let clean = collapsed.trim();

    let short = SENTENCE_REGEX
        .find_iter(clean)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .take(MAX_REPLY_SENTENCES)
        .collect::<Vec<_>>()
        .join(" ");

    if short.chars().count() > MAX_REPLY_CHARS {
        let mut cut: String = short.chars().take(MAX_REPLY_CHARS - 3).collect();
        cut.push_str("...");
        cut
    } else {
        short
    }
}

pub fn crisis_response() -> &'static str {
    "I\u{2019}m really sorry you're feeling this way. Your safety matters. \
     If you feel unsafe, please talk to someone you trust or contact emergency services immediately."
}

pub fn supportive_response() -> &'static str {
    "Thank you for sharing that. I'm here with you, and we can work through this together."
}

/// The reply persisted with an entry. Harmful entries always get the crisis
/// message verbatim; everything else is the model output (or the supportive
/// fallback) run through [`sanitize_and_shorten`].
pub fn final_reply(harmful_detected: bool, llm_output: &str) -> String {
    if harmful_detected {
        return crisis_response().to_string();
    }

    let base = if llm_output.trim().is_empty() {
        supportive_response()
    } else {
        llm_output
    };
    sanitize_and_shorten(base)
}
