use axum::{extract::State, Json};
use moodscape_core::{FeedbackView, UserSummary};
use moodscape_store::{feedback, users};

use crate::{ApiResult, AppState};

/// Bare array, as the admin dashboard expects.
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserSummary>>> {
    let users = state.store.run(|conn| users::list_summaries(conn)).await?;
    Ok(Json(users))
}

pub async fn list_feedback(State(state): State<AppState>) -> ApiResult<Json<Vec<FeedbackView>>> {
    let items = state.store.run(|conn| feedback::list_with_authors(conn)).await?;
    Ok(Json(items))
}
