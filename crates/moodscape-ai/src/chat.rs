use crate::llm_provider::{ChatProvider, GenerationConfig, LLMResult, Message, ProviderError};
use moodscape_core::{ChatRole, ConversationMessage};
use std::sync::Arc;

/// Conversational assistant over a user's stored chat history.
#[derive(Clone)]
pub struct ChatAssistant {
    provider: Option<Arc<dyn ChatProvider>>,
}

impl ChatAssistant {
    pub fn new(provider: Option<Arc<dyn ChatProvider>>) -> Self {
        Self { provider }
    }

    /// Assemble the prompt sent to the model. Error placeholders stored for
    /// failed turns are not part of the dialogue and are left out.
    pub fn build_messages(
        history: &[ConversationMessage],
        system_prompt: Option<&str>,
    ) -> Vec<Message> {
        let system = system_prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .map(Message::system);

        system
            .into_iter()
            .chain(history.iter().filter(|m| !m.is_error).map(|m| match m.role {
                ChatRole::User => Message::user(m.content.clone()),
                ChatRole::Assistant => Message::assistant(m.content.clone()),
            }))
            .collect()
    }

    pub async fn reply(
        &self,
        history: &[ConversationMessage],
        system_prompt: Option<&str>,
    ) -> LLMResult<String> {
        let provider = self.provider.as_ref().ok_or(ProviderError::NotConfigured)?;

        let messages = Self::build_messages(history, system_prompt);
        if messages.is_empty() {
            return Err(ProviderError::EmptyConversation);
        }

        let response = provider
            .generate_chat(&messages, &GenerationConfig::default())
            .await?;
        Ok(response.content)
    }
}
