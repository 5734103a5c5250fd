use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::{ApiJson, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeMoodRequest {
    pub text: Option<String>,
}

/// Standalone mood reading. Falls back to keyword heuristics when the model
/// is unavailable, so it only fails on missing input.
pub async fn analyze_mood(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AnalyzeMoodRequest>,
) -> impl IntoResponse {
    let Some(text) = request.text.filter(|text| !text.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing text" })),
        )
            .into_response();
    };

    Json(state.mood_analyzer.analyze(&text).await).into_response()
}
