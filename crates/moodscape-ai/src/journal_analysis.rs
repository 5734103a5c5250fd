//! Mood label, score and supportive reply for a journal entry.

use crate::llm_provider::{ChatProvider, GenerationConfig, Message};
use lazy_static::lazy_static;
use moodscape_core::mood::{
    clamp_score, label_from_text, score_from_text, word_count_analysis, JournalAnalysis,
    MOOD_LABELS, NEUTRAL_MOOD, NEUTRAL_SCORE,
};
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_AI_RESPONSE: &str = "Thank you for sharing your thoughts. I'm here to listen.";
const ERROR_AI_RESPONSE: &str = "Keep journaling to track your emotions!";

lazy_static! {
    static ref FENCED_JSON: Regex = Regex::new(r"(?s)```(?:json)?\n(.*?)\n```").unwrap();
}

fn system_prompt() -> String {
    format!(
        "You are a supportive and empathetic AI assistant. Analyze the user's journal entry and respond with a JSON object containing:\n\
         {{\n  \"mood\": \"string\",       // One of: {}\n  \"moodScore\": 1-10,      // 1=very negative, 10=very positive\n  \"aiResponse\": \"string\"  // A supportive and helpful response (1-2 sentences)\n}}\n\n\
         Be empathetic and understanding. If the user is sharing something difficult, acknowledge their feelings and offer support.",
        MOOD_LABELS.join(", ")
    )
}

/// Integer prefix of a JSON number or numeric string. Zero counts as missing.
fn parse_score(value: Option<&Value>) -> Option<i64> {
    let score = match value? {
        Value::Number(n) => n.as_f64().map(|f| f.trunc() as i64),
        Value::String(s) => {
            let s = s.trim();
            let end = s
                .char_indices()
                .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
                .map(|(i, _)| i)
                .unwrap_or(s.len());
            s[..end].parse::<i64>().ok()
        }
        _ => None,
    }?;
    (score != 0).then_some(score)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn from_json(parsed: &Value) -> JournalAnalysis {
    JournalAnalysis {
        mood: non_empty_str(parsed.get("mood"))
            .unwrap_or(NEUTRAL_MOOD)
            .to_lowercase(),
        mood_score: clamp_score(parse_score(parsed.get("moodScore")).unwrap_or(NEUTRAL_SCORE)),
        ai_response: non_empty_str(parsed.get("aiResponse"))
            .unwrap_or(DEFAULT_AI_RESPONSE)
            .to_string(),
        ai_report: non_empty_str(parsed.get("aiReport")).map(str::to_string),
    }
}

/// Interpret the raw model output. A fenced ```json block wins over the
/// whole text; anything that is not JSON becomes the reply itself.
pub fn parse_model_output(raw: &str) -> JournalAnalysis {
    let candidate = FENCED_JSON
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw);

    match serde_json::from_str::<Value>(candidate) {
        Ok(parsed) => from_json(&parsed),
        Err(_) => {
            debug!("Model returned non-JSON journal analysis, using text as reply");
            JournalAnalysis {
                mood: label_from_text(raw).to_string(),
                mood_score: score_from_text(raw),
                ai_response: raw.to_string(),
                ai_report: Some(raw.to_string()),
            }
        }
    }
}

#[derive(Clone)]
pub struct JournalAnalyzer {
    provider: Option<Arc<dyn ChatProvider>>,
}

impl JournalAnalyzer {
    pub fn new(provider: Option<Arc<dyn ChatProvider>>) -> Self {
        Self { provider }
    }

    pub async fn analyze(&self, content: &str) -> JournalAnalysis {
        let Some(provider) = &self.provider else {
            return word_count_analysis(content);
        };

        let messages = [Message::system(system_prompt()), Message::user(content)];
        let config = GenerationConfig {
            temperature: Some(0.7),
            max_tokens: Some(300),
            json_response: false,
        };

        match provider.generate_chat(&messages, &config).await {
            Ok(response) => parse_model_output(&response.content),
            Err(e) => {
                warn!(provider = provider.provider_name(), error = %e, "Journal analysis failed");
                JournalAnalysis {
                    mood: NEUTRAL_MOOD.to_string(),
                    mood_score: NEUTRAL_SCORE,
                    ai_response: ERROR_AI_RESPONSE.to_string(),
                    ai_report: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_provider::{LLMResponse, LLMResult, ProviderError};
    use async_trait::async_trait;

    struct Fixed(LLMResult<String>);

    #[async_trait]
    impl ChatProvider for Fixed {
        async fn generate_chat(
            &self,
            _messages: &[Message],
            _config: &GenerationConfig,
        ) -> LLMResult<LLMResponse> {
            self.0.clone().map(|content| LLMResponse {
                content,
                model: "fixed".into(),
                finish_reason: None,
                total_tokens: None,
            })
        }

        fn provider_name(&self) -> &str {
            "fixed"
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    fn analyzer(reply: LLMResult<String>) -> JournalAnalyzer {
        JournalAnalyzer::new(Some(Arc::new(Fixed(reply))))
    }

    #[test]
    fn fenced_json_is_preferred() {
        let raw = "Here you go:\n```json\n{\"mood\": \"Hopeful\", \"moodScore\": \"7\", \"aiResponse\": \"Nice.\"}\n```";
        let analysis = parse_model_output(raw);
        assert_eq!(analysis.mood, "hopeful");
        assert_eq!(analysis.mood_score, 7);
        assert_eq!(analysis.ai_response, "Nice.");
        assert_eq!(analysis.ai_report, None);
    }

    #[test]
    fn bare_json_gets_defaults_and_clamping() {
        let analysis = parse_model_output(r#"{"moodScore": 42}"#);
        assert_eq!(analysis.mood, "neutral");
        assert_eq!(analysis.mood_score, 10);
        assert_eq!(analysis.ai_response, DEFAULT_AI_RESPONSE);
    }

    #[test]
    fn unparseable_score_defaults_to_five() {
        assert_eq!(parse_model_output(r#"{"moodScore": "high"}"#).mood_score, 5);
        assert_eq!(parse_model_output(r#"{"moodScore": 0}"#).mood_score, 5);
        assert_eq!(parse_model_output(r#"{"moodScore": 6.9}"#).mood_score, 6);
    }

    #[test]
    fn plain_text_becomes_the_reply() {
        let raw = "You seem really happy today. Keep it up!";
        let analysis = parse_model_output(raw);
        assert_eq!(analysis.mood, "happy");
        assert_eq!(analysis.mood_score, 8);
        assert_eq!(analysis.ai_response, raw);
        assert_eq!(analysis.ai_report.as_deref(), Some(raw));
    }

    #[tokio::test]
    async fn no_provider_uses_word_counts() {
        let analysis = JournalAnalyzer::new(None).analyze("happy good great").await;
        assert_eq!(analysis, word_count_analysis("happy good great"));
    }

    #[tokio::test]
    async fn provider_error_gives_neutral_result() {
        let analysis = analyzer(Err(ProviderError::Authentication))
            .analyze("anything")
            .await;
        assert_eq!(analysis.mood, "neutral");
        assert_eq!(analysis.mood_score, 5);
        assert_eq!(analysis.ai_response, ERROR_AI_RESPONSE);
        assert_eq!(analysis.ai_report, None);
    }

    #[tokio::test]
    async fn provider_reply_is_parsed() {
        let analysis = analyzer(Ok(
            r#"{"mood":"sad","moodScore":3,"aiResponse":"I hear you."}"#.into()
        ))
        .analyze("rough day")
        .await;
        assert_eq!(analysis.mood, "sad");
        assert_eq!(analysis.mood_score, 3);
    }
}
