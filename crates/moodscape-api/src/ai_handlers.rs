use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use moodscape_core::{AuthContext, ChatRole, ConversationMessage};
use moodscape_store::conversations;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{ApiJson, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "systemPrompt")]
    pub system_prompt: Option<String>,
}

/// Chat replies use their own envelope: `error` instead of `message` on
/// failure, and the full conversation either way.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<Vec<ConversationMessage>>,
}

impl ChatResponse {
    fn conversation(conversation: Vec<ConversationMessage>) -> Self {
        Self {
            success: true,
            reply: None,
            error: None,
            message: None,
            conversation: Some(conversation),
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            reply: None,
            error: Some(error.into()),
            message: None,
            conversation: None,
        }
    }
}

/// Append the user's message, ask the model with the whole history and
/// store whatever came back. A failed turn is stored flagged as an error and
/// is left out of later prompts.
pub async fn chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(request): ApiJson<ChatRequest>,
) -> ApiResult<Response> {
    let user_id = auth.user_id;
    state.limiters.ai.check(&user_id.to_string())?;

    if request.message.trim().is_empty() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(ChatResponse::failure("Message is required.")),
        )
            .into_response());
    }

    let message = request.message;
    let history = state
        .store
        .run(move |conn| {
            conversations::append(conn, user_id, ChatRole::User, &message, false)?;
            conversations::history(conn, user_id)
        })
        .await?;

    let outcome = state
        .chat
        .reply(&history, request.system_prompt.as_deref())
        .await;

    let (reply, is_error) = match outcome {
        Ok(reply) => (reply, false),
        Err(e) => {
            warn!(user_id, error = %e, "Chat completion failed");
            (e.to_string(), true)
        }
    };

    let stored = reply.clone();
    let conversation = state
        .store
        .run(move |conn| {
            conversations::append(conn, user_id, ChatRole::Assistant, &stored, is_error)?;
            conversations::history(conn, user_id)
        })
        .await?;

    let response = if is_error {
        (
            StatusCode::BAD_GATEWAY,
            Json(ChatResponse {
                conversation: Some(conversation),
                ..ChatResponse::failure(reply)
            }),
        )
            .into_response()
    } else {
        Json(ChatResponse {
            reply: Some(reply),
            ..ChatResponse::conversation(conversation)
        })
        .into_response()
    };
    Ok(response)
}

pub async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ChatResponse>> {
    let user_id = auth.user_id;
    let conversation = state
        .store
        .run(move |conn| conversations::history(conn, user_id))
        .await?;
    Ok(Json(ChatResponse::conversation(conversation)))
}

pub async fn clear_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ChatResponse>> {
    let user_id = auth.user_id;
    let removed = state
        .store
        .run(move |conn| conversations::clear(conn, user_id))
        .await?;
    tracing::debug!(user_id, removed, "Conversation cleared");

    Ok(Json(ChatResponse {
        message: Some("Conversation history cleared.".to_string()),
        ..ChatResponse::conversation(Vec::new())
    }))
}
