use axum::{extract::State, Extension};
use moodscape_core::{AuthContext, Feedback, FeedbackView};
use moodscape_store::feedback;
use serde::Deserialize;
use tracing::info;

use crate::{ApiError, ApiJson, ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub message: Option<String>,
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(request): ApiJson<FeedbackRequest>,
) -> ApiResult<ApiResponse<Feedback>> {
    let message = request
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Message is required".to_string()))?;

    let user_id = auth.user_id;
    let saved = state
        .store
        .run(move |conn| feedback::create(conn, user_id, &message))
        .await?;

    info!(user_id, feedback_id = saved.id, "Feedback submitted");
    Ok(ApiResponse::created(saved))
}

/// Every feedback message with its author, newest first.
pub async fn all_feedback(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<FeedbackView>>> {
    let items = state.store.run(|conn| feedback::list_with_authors(conn)).await?;
    Ok(ApiResponse::ok(items))
}
