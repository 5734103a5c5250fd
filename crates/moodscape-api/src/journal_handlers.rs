use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use moodscape_core::{
    mood::MoodReport, reply, safety, validation, AuthContext, JournalEntry, NewJournalEntry,
    SecurityEvent, SecurityLogger,
};
use moodscape_store::{harmful_words, journals};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{count_param, ApiJson, ApiQuery, ApiResponse, ApiResult, AppState};

pub const DEFAULT_JOURNAL_LIMIT: u32 = 10;
const DEFAULT_AI_REPORT: &str = "Keep journaling to track your emotions!";

#[derive(Debug, Deserialize)]
pub struct JournalListQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateJournalRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "isVoice")]
    pub is_voice: bool,
}

#[derive(Debug, Serialize)]
pub struct JournalCreated {
    pub success: bool,
    pub data: JournalEntry,
    pub harmful_detected: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct HarmfulCheckRequest {
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HarmfulCheckResponse {
    pub words: Vec<&'static str>,
}

pub async fn list_journals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<JournalListQuery>,
) -> ApiResult<ApiResponse<Vec<JournalEntry>>> {
    let limit = count_param(query.limit.as_deref(), DEFAULT_JOURNAL_LIMIT);
    let user_id = auth.user_id;

    let entries = state
        .store
        .run(move |conn| journals::list_for_user(conn, user_id, limit))
        .await?;
    Ok(ApiResponse::ok(entries))
}

/// Screen, analyze and persist a new entry. Detected phrases are logged in
/// the same transaction as the entry itself.
pub async fn create_journal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(request): ApiJson<CreateJournalRequest>,
) -> ApiResult<impl IntoResponse> {
    let user_id = auth.user_id;
    state.limiters.journal.check(&user_id.to_string())?;

    let content = validation::validate_journal(&request.content)?;

    let harmful: Vec<String> = safety::find_harmful_phrases(&content)
        .into_iter()
        .map(str::to_string)
        .collect();
    let harmful_detected = !harmful.is_empty();

    let analysis = state.journal_analyzer.analyze(&content).await;
    let ai_response = reply::final_reply(harmful_detected, &analysis.ai_response);

    let context = safety::log_context(&content);
    let new_entry = NewJournalEntry {
        user_id,
        content,
        is_voice: request.is_voice,
        mood: analysis.mood,
        mood_score: analysis.mood_score as f64,
        ai_report: Some(
            analysis
                .ai_report
                .unwrap_or_else(|| DEFAULT_AI_REPORT.to_string()),
        ),
        ai_response: Some(ai_response),
        harmful_words: harmful,
    };

    let entry = state
        .store
        .run(move |conn| {
            let tx = conn.transaction()?;
            let entry = journals::insert(&tx, &new_entry)?;
            if !entry.harmful_words.is_empty() {
                harmful_words::log_phrases(&tx, user_id, entry.id, &entry.harmful_words, &context)?;
            }
            tx.commit()?;
            Ok(entry)
        })
        .await?;

    if harmful_detected {
        SecurityLogger::log_event(SecurityEvent::HarmfulContentDetected {
            user_id,
            entry_id: entry.id,
            phrases: entry.harmful_words.clone(),
        });
    }
    info!(user_id, entry_id = entry.id, mood = %entry.mood, "Journal entry saved");

    Ok((
        StatusCode::CREATED,
        Json(JournalCreated {
            success: true,
            data: entry,
            harmful_detected,
        }),
    ))
}

pub async fn mood_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<MoodReport>> {
    let user_id = auth.user_id;
    let scores = state
        .store
        .run(move |conn| journals::mood_scores_for_user(conn, user_id))
        .await?;
    Ok(ApiResponse::ok(MoodReport::from_scores(&scores)))
}

/// Ad-hoc screening of text the user is still writing.
pub async fn check_harmful(
    ApiJson(request): ApiJson<HarmfulCheckRequest>,
) -> (StatusCode, Json<HarmfulCheckResponse>) {
    match request.content.filter(|content| !content.is_empty()) {
        Some(content) => (
            StatusCode::OK,
            Json(HarmfulCheckResponse {
                words: safety::find_harmful_phrases(&content),
            }),
        ),
        None => (
            StatusCode::BAD_REQUEST,
            Json(HarmfulCheckResponse { words: Vec::new() }),
        ),
    }
}
