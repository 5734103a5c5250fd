//! Keyword mood heuristics used whenever the language model is unavailable
//! or returns something unusable, plus the per-user mood report.

use serde::{Deserialize, Serialize};

/// Labels the journal analyzer offers to the model.
pub const MOOD_LABELS: &[&str] = &[
    "very happy",
    "happy",
    "slightly happy",
    "neutral",
    "slightly sad",
    "sad",
    "very sad",
    "anxious",
    "stressed",
    "angry",
    "frustrated",
    "excited",
    "grateful",
    "hopeful",
    "proud",
    "content",
];

pub const NEUTRAL_MOOD: &str = "neutral";
pub const NEUTRAL_SCORE: i64 = 5;
pub const MIN_SCORE: i64 = 1;
pub const MAX_SCORE: i64 = 10;

const SAD_WORDS: &[&str] = &["sad", "depressed", "down", "miserable", "unhappy", "upset"];
const HAPPY_WORDS: &[&str] = &["happy", "joy", "excited", "great", "amazing", "wonderful"];
const POSITIVE_SCORE_WORDS: &[&str] = &[
    "happy", "joy", "excited", "great", "amazing", "wonderful", "good", "pleased",
];
const ANGRY_WORDS: &[&str] = &["angry", "mad", "frustrated", "annoyed", "irritated"];
const ANXIOUS_WORDS: &[&str] = &["anxious", "nervous", "worried", "stressed", "overwhelmed"];
const CRISIS_FRAGMENTS: &[&str] = &[
    "suicid",
    "kill myself",
    "end it all",
    "want to die",
    "no reason to live",
];

/// Result of analysing a journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalAnalysis {
    pub mood: String,
    pub mood_score: i64,
    pub ai_response: String,
    pub ai_report: Option<String>,
}

/// Result of the standalone mood analyzer. Shares its shape with the JSON
/// the model is asked to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodReading {
    pub mood_label: String,
    pub score: i64,
    pub summary: String,
}

pub fn clamp_score(score: i64) -> i64 {
    score.clamp(MIN_SCORE, MAX_SCORE)
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Coarse mood label read off free text.
pub fn label_from_text(text: &str) -> &'static str {
    if text.is_empty() {
        return NEUTRAL_MOOD;
    }

    let lower = text.to_lowercase();
    if contains_any(&lower, SAD_WORDS) {
        "sad"
    } else if contains_any(&lower, HAPPY_WORDS) {
        "happy"
    } else if contains_any(&lower, ANGRY_WORDS) {
        "angry"
    } else if contains_any(&lower, ANXIOUS_WORDS) {
        "anxious"
    } else {
        NEUTRAL_MOOD
    }
}

/// 1..=10 score read off free text. Crisis language pins the score to 1.
pub fn score_from_text(text: &str) -> i64 {
    if text.is_empty() {
        return NEUTRAL_SCORE;
    }

    let lower = text.to_lowercase();
    let mut score = NEUTRAL_SCORE;

    if contains_any(&lower, POSITIVE_SCORE_WORDS) {
        score += 3;
    }
    if contains_any(&lower, SAD_WORDS) {
        score -= 3;
    }
    if contains_any(&lower, ANGRY_WORDS) {
        score -= 2;
    }
    if contains_any(&lower, ANXIOUS_WORDS) {
        score -= 1;
    }
    if contains_any(&lower, CRISIS_FRAGMENTS) {
        score = MIN_SCORE;
    }

    clamp_score(score)
}

const COUNT_POSITIVE: &[&str] = &[
    "happy", "good", "great", "excited", "joy", "love", "amazing", "wonderful", "fantastic",
];
const COUNT_NEGATIVE: &[&str] = &[
    "sad", "bad", "terrible", "awful", "hate", "angry", "frustrated", "anxious", "stressed",
];

/// Offline analysis: half a point per positive or negative word.
pub fn word_count_analysis(content: &str) -> JournalAnalysis {
    let lower = content.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    let positive = words.iter().filter(|w| COUNT_POSITIVE.contains(w)).count() as f64;
    let negative = words.iter().filter(|w| COUNT_NEGATIVE.contains(w)).count() as f64;

    let raw = NEUTRAL_SCORE as f64 + positive * 0.5 - negative * 0.5;
    // Round half up, then clamp.
    let score = clamp_score((raw + 0.5).floor() as i64);

    let (label, tail) = match score {
        8.. => ("very happy", "I'm glad to hear you're feeling great! "),
        6..=7 => ("happy", "It sounds like you're in a good mood! "),
        4..=5 => (NEUTRAL_MOOD, "Thanks for sharing your thoughts. "),
        2..=3 => ("sad", "I'm sorry to hear you're feeling down. "),
        _ => ("very sad", "I'm really sorry you're feeling this way. "),
    };

    let response = format!(
        "Thanks for sharing your thoughts. {tail}Would you like to talk more about what's on your mind?"
    );

    JournalAnalysis {
        mood: label.to_string(),
        mood_score: score,
        ai_report: Some(format!(
            "Automated analysis detected mood as {label} ({score}/10). {response}"
        )),
        ai_response: response,
    }
}

const READING_FAMILIES: &[(&str, i64, &[&str])] = &[
    (
        "happy",
        8,
        &["happy", "joy", "great", "good", "amazing", "wonderful", "excited"],
    ),
    (
        "sad",
        3,
        &["sad", "unhappy", "depressed", "miserable", "upset", "cry", "crying"],
    ),
    ("angry", 2, &["angry", "mad", "furious", "annoyed", "frustrated"]),
    ("anxious", 4, &["anxious", "nervous", "worried", "stressed", "overwhelmed"]),
];

const READING_CRISIS: &[&str] = &["suicide", "kill myself", "end my life", "want to die"];

/// Fallback for the standalone mood analyzer.
pub fn keyword_reading(text: &str) -> MoodReading {
    if text.is_empty() {
        return MoodReading {
            mood_label: NEUTRAL_MOOD.to_string(),
            score: NEUTRAL_SCORE,
            summary: "No text provided".to_string(),
        };
    }

    let lower = text.to_lowercase();

    if contains_any(&lower, READING_CRISIS) {
        return MoodReading {
            mood_label: "crisis".to_string(),
            score: MIN_SCORE,
            summary: "I'm really sorry you're feeling this way. Please know that help is available. \
                      You're not alone, and there are people who care about you and want to help."
                .to_string(),
        };
    }

    let (mood, score) = READING_FAMILIES
        .iter()
        .find(|(_, _, words)| contains_any(&lower, words))
        .map(|(mood, score, _)| (*mood, *score))
        .unwrap_or((NEUTRAL_MOOD, NEUTRAL_SCORE));

    MoodReading {
        mood_label: mood.to_string(),
        score,
        summary: format!("I noticed you're feeling {mood}. Thank you for sharing your thoughts."),
    }
}

/// Summary of a user's mood over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MoodReport {
    Empty {
        analysis: String,
    },
    Summary {
        total_entries: usize,
        average_mood_score: f64,
        trend: String,
        recommended_action: String,
    },
}

impl MoodReport {
    /// Build a report from scores ordered oldest first.
    pub fn from_scores(scores: &[f64]) -> Self {
        let (Some(first), Some(last)) = (scores.first(), scores.last()) else {
            return MoodReport::Empty {
                analysis: "No entries yet.".to_string(),
            };
        };

        let average = scores.iter().sum::<f64>() / scores.len() as f64;
        let delta = last - first;

        let trend = if delta > 0.0 {
            "Improving emotional health"
        } else if delta < 0.0 {
            "Declining mood patterns"
        } else {
            "Stable mood"
        };
        let recommended_action = if delta < 0.0 {
            "Therapist intervention recommended."
        } else {
            "Keep journaling daily."
        };

        MoodReport::Summary {
            total_entries: scores.len(),
            average_mood_score: (average * 100.0).round() / 100.0,
            trend: trend.to_string(),
            recommended_action: recommended_action.to_string(),
        }
    }
}
