use axum::{extract::State, Extension};
use moodscape_core::{validation, AuthContext, User};
use moodscape_store::users::{self, ProfileChanges};
use serde::Deserialize;
use tracing::info;

use crate::{ApiError, ApiJson, ApiResponse, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(alias = "fullName")]
    pub full_name: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> ApiResult<ApiResponse<User>> {
    let update = validation::validate_profile_update(
        request.username.as_deref(),
        request.email.as_deref(),
        request.full_name.as_deref(),
    )?;

    let user_id = auth.user_id;
    let changes = ProfileChanges {
        username: update.username,
        email: update.email,
        full_name: update.full_name,
    };

    let lookup = changes.clone();
    let (email_taken, username_taken) = state
        .store
        .run(move |conn| {
            let email_taken = match &lookup.email {
                Some(email) => users::email_taken(conn, email, Some(user_id))?,
                None => false,
            };
            let username_taken = match &lookup.username {
                Some(username) => users::username_taken(conn, username, Some(user_id))?,
                None => false,
            };
            Ok((email_taken, username_taken))
        })
        .await?;
    if email_taken {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }
    if username_taken {
        return Err(ApiError::Conflict("Username already taken".to_string()));
    }

    let user = state
        .store
        .run(move |conn| users::update_profile(conn, user_id, &changes))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    info!(user_id, "Profile updated");
    Ok(ApiResponse::ok(user).with_message("Profile updated successfully"))
}
