use crate::llm_provider::*;
use async_trait::async_trait;
use moodscape_core::AiConfig;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(200);

/// Configuration for the Groq OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct GroqConfig {
    /// Base URL for the API (e.g. "https://api.groq.com/openai/v1")
    pub base_url: String,
    pub model: String,
    pub api_key: SecretString,
    /// Request timeout in seconds, per attempt
    pub timeout_secs: u64,
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each later one
    pub backoff_base: Duration,
}

impl GroqConfig {
    pub fn new(api_key: SecretString, base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            api_key,
            timeout_secs: 10,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }

    /// `None` when no API key is configured.
    pub fn from_ai_config(config: &AiConfig) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        let api_key = config.api_key.clone()?;
        Some(Self {
            timeout_secs: config.timeout_secs,
            ..Self::new(api_key, config.base_url.clone(), config.model.clone())
        })
    }
}

pub struct GroqProvider {
    config: GroqConfig,
    client: Client,
}

impl GroqProvider {
    pub fn new(config: GroqConfig) -> LLMResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Send a request with retry logic
    async fn send_request(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<ChatCompletionsResponse> {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.try_request(messages, config).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        provider = "groq",
                        attempt,
                        max_attempts,
                        error = %e,
                        "Chat completion failed"
                    );
                    if attempt < max_attempts {
                        let delay = self.config.backoff_base * 2u32.pow(attempt - 1);
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    tracing::error!(provider = "groq", error = %e, "Chat completion rejected");
                    return Err(e);
                }
            }
        }

        Err(ProviderError::RetriesExhausted {
            attempts: max_attempts,
        })
    }

    async fn try_request(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<ChatCompletionsResponse> {
        let request = ChatCompletionsRequest {
            model: self.config.model.clone(),
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.to_string(),
                    content: Some(m.content.clone()),
                })
                .collect(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            response_format: config.json_response.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(ProviderError::Authentication);
            }

            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: format!("Groq API error ({status}): {error_text}"),
            });
        }

        response
            .json::<ChatCompletionsResponse>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ChatProvider for GroqProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let response = self.send_request(messages, config).await?;

        let choice = response.choices.into_iter().next();
        let content = choice
            .as_ref()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(LLMResponse {
            content,
            model: response.model.unwrap_or_else(|| self.config.model.clone()),
            finish_reason: choice.and_then(|c| c.finish_reason),
            total_tokens: response.usage.map(|u| u.total_tokens),
        })
    }

    fn provider_name(&self) -> &str {
        "groq"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// API request/response types for the Chat Completions API

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn provider_for(server: &MockServer) -> GroqProvider {
        let mut config = GroqConfig::new(
            SecretString::from("gsk_test".to_string()),
            server.uri(),
            "test-model".to_string(),
        );
        config.backoff_base = Duration::from_millis(5);
        GroqProvider::new(config).unwrap()
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "model": "test-model",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
        })
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer gsk_test"))
            .and(body_partial_json(json!({"model": "test-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hello there.")))
            .expect(1)
            .mount(&server)
            .await;

        let response = provider_for(&server)
            .generate_chat(&[Message::user("hi")], &GenerationConfig::default())
            .await
            .unwrap();

        assert_eq!(response.content, "Hello there.");
        assert_eq!(response.total_tokens, Some(8));
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn json_mode_sets_response_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "response_format": {"type": "json_object"},
                "max_tokens": 300
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
            .expect(1)
            .mount(&server)
            .await;

        let config = GenerationConfig {
            temperature: Some(0.7),
            max_tokens: Some(300),
            json_response: true,
        };
        provider_for(&server)
            .generate_chat(&[Message::user("hi")], &config)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn server_errors_are_retried_three_times() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .generate_chat(&[Message::user("hi")], &GenerationConfig::default())
            .await
            .unwrap_err();

        assert_eq!(err, ProviderError::RetriesExhausted { attempts: 3 });
        assert_eq!(err.to_string(), "AI request failed after 3 attempts.");
    }

    #[tokio::test]
    async fn recovers_after_a_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Back again.")))
            .mount(&server)
            .await;

        let response = provider_for(&server)
            .generate_chat(&[Message::user("hi")], &GenerationConfig::default())
            .await
            .unwrap();
        assert_eq!(response.content, "Back again.");
    }

    #[tokio::test]
    async fn auth_failures_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .generate_chat(&[Message::user("hi")], &GenerationConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::Authentication);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad model"))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .generate_chat(&[Message::user("hi")], &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 400, .. }));
        assert!(err.to_string().contains("bad model"));
    }

    #[tokio::test]
    async fn blank_content_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .generate_chat(&[Message::user("hi")], &GenerationConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::EmptyResponse);
    }

    #[test]
    fn unconfigured_ai_yields_no_provider() {
        assert!(GroqConfig::from_ai_config(&AiConfig::default()).is_none());

        let config = AiConfig {
            api_key: Some(SecretString::from("gsk".to_string())),
            timeout_secs: 3,
            ..AiConfig::default()
        };
        let groq = GroqConfig::from_ai_config(&config).unwrap();
        assert_eq!(groq.timeout_secs, 3);
        assert_eq!(groq.model, "openai/gpt-oss-20b");
    }
}
