use crate::llm_provider::{ChatProvider, GenerationConfig, Message};
use moodscape_core::mood::{clamp_score, keyword_reading, MoodReading};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

const SYSTEM_PROMPT: &str = "Analyze the emotional tone of the user's text. Return a JSON object with these fields:
{
  \"moodLabel\": \"string (one of: happy, sad, angry, anxious, neutral, excited, grateful, hopeful, proud, content, crisis)\",
  \"score\": \"number (1-10 where 1 is very negative and 10 is very positive)\",
  \"summary\": \"string (a supportive 1-2 sentence response)\"
}
Be empathetic and understanding. If the user seems to be in crisis, respond with appropriate concern.";

fn strip_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

fn score_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| f.round() as i64),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    }
}

/// Parse the model's JSON. `moodLabel` and `score` are required.
pub fn parse_reading(raw: &str) -> Option<MoodReading> {
    let data: Value = serde_json::from_str(&strip_fences(raw)).ok()?;

    let mood_label = data
        .get("moodLabel")
        .and_then(Value::as_str)
        .filter(|label| !label.is_empty())?;
    let score = data.get("score").and_then(score_of)?;
    let summary = data
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Some(MoodReading {
        mood_label: mood_label.to_string(),
        score: clamp_score(score),
        summary: summary.to_string(),
    })
}

/// Standalone mood reading for arbitrary text.
#[derive(Clone)]
pub struct MoodAnalyzer {
    provider: Option<Arc<dyn ChatProvider>>,
}

impl MoodAnalyzer {
    pub fn new(provider: Option<Arc<dyn ChatProvider>>) -> Self {
        Self { provider }
    }

    pub async fn analyze(&self, text: &str) -> MoodReading {
        let Some(provider) = &self.provider else {
            return keyword_reading(text);
        };

        let messages = [Message::system(SYSTEM_PROMPT), Message::user(text)];
        let config = GenerationConfig {
            temperature: Some(0.7),
            max_tokens: Some(300),
            json_response: true,
        };

        match provider.generate_chat(&messages, &config).await {
            Ok(response) => parse_reading(&response.content).unwrap_or_else(|| {
                warn!("Mood analyzer output was not usable JSON, using keyword fallback");
                keyword_reading(text)
            }),
            Err(e) => {
                warn!(error = %e, "Mood analyzer request failed, using keyword fallback");
                keyword_reading(text)
            }
        }
    }
}
