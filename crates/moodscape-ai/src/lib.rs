pub mod chat;
pub mod groq_provider;
pub mod journal_analysis;
pub mod llm_provider;
pub mod mood_analyzer;

pub use chat::ChatAssistant;
pub use groq_provider::{GroqConfig, GroqProvider};
pub use journal_analysis::JournalAnalyzer;
pub use llm_provider::*;
pub use mood_analyzer::MoodAnalyzer;

use moodscape_core::AiConfig;
use std::sync::Arc;

/// Build the configured chat provider, or `None` when AI is disabled.
pub fn provider_from_config(config: &AiConfig) -> LLMResult<Option<Arc<dyn ChatProvider>>> {
    match GroqConfig::from_ai_config(config) {
        Some(groq) => {
            let provider = GroqProvider::new(groq)?;
            tracing::info!(
                provider = provider.provider_name(),
                model = provider.model_name(),
                "AI provider ready"
            );
            Ok(Some(Arc::new(provider)))
        }
        None => {
            tracing::warn!("GROQ_API_KEY is not set; AI features use keyword fallbacks");
            Ok(None)
        }
    }
}
