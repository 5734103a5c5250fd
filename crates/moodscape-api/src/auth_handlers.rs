use axum::{extract::State, Extension};
use moodscape_core::{validation, AuthContext, Role, SecurityEvent, SecurityLogger, User};
use moodscape_store::users::{self, NewUser};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{middleware::ClientIp, ApiError, ApiJson, ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, alias = "fullName")]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub user: User,
    pub token: String,
}

/// Hashing runs on the blocking pool.
async fn hash_password(state: &AppState, password: String) -> ApiResult<String> {
    let hasher = state.hasher.clone();
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

async fn verify_password(state: &AppState, password: String, hash: String) -> ApiResult<bool> {
    let hasher = state.hasher.clone();
    tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<ApiResponse<AuthPayload>> {
    let registration = validation::validate_registration(
        &request.username,
        &request.email,
        &request.password,
        request.full_name.as_deref(),
    )?;

    let email = registration.email.clone();
    let username = registration.username.clone();
    let (email_taken, username_taken) = state
        .store
        .run(move |conn| {
            Ok((
                users::email_taken(conn, &email, None)?,
                users::username_taken(conn, &username, None)?,
            ))
        })
        .await?;
    if email_taken {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }
    if username_taken {
        return Err(ApiError::Conflict("Username already taken".to_string()));
    }

    let password_hash = hash_password(&state, registration.password).await?;
    let new_user = NewUser {
        username: registration.username,
        email: registration.email,
        password_hash,
        full_name: registration.full_name,
        role: Role::User,
    };

    let user = state
        .store
        .run(move |conn| users::create(conn, &new_user))
        .await
        .map_err(|e| {
            // Lost a race with a concurrent registration.
            if e.is_unique_violation() {
                ApiError::Conflict("Email already registered".to_string())
            } else {
                ApiError::from(e)
            }
        })?;

    let token = state.jwt.issue(user.id)?;
    info!(user_id = user.id, username = %user.username, "User registered");

    Ok(ApiResponse::created(AuthPayload { user, token })
        .with_message("User registered successfully"))
}

pub async fn login(
    State(state): State<AppState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<ApiResponse<AuthPayload>> {
    state.limiters.login.check(&ip)?;

    let login = validation::validate_login(&request.email, &request.password)?;

    let email = login.email.clone();
    let credentials = state
        .store
        .run(move |conn| users::find_credentials_by_email(conn, &email))
        .await?;

    let authenticated = match credentials {
        Some(credentials) => {
            let valid =
                verify_password(&state, login.password, credentials.password_hash.clone()).await?;
            valid.then_some(credentials.user)
        }
        None => None,
    };

    let Some(user) = authenticated else {
        state.limiters.login.record_failure(&ip);
        SecurityLogger::log_event(SecurityEvent::AuthenticationFailure {
            email: login.email,
            ip_address: ip,
            reason: "Invalid email or password".to_string(),
        });
        return Err(ApiError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    };

    let token = state.jwt.issue(user.id)?;
    SecurityLogger::log_event(SecurityEvent::AuthenticationSuccess {
        user_id: user.id,
        ip_address: ip,
        method: "password".to_string(),
    });

    Ok(ApiResponse::ok(AuthPayload { user, token }).with_message("Login successful"))
}

/// Current account, re-read so profile edits show up immediately.
pub async fn profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<User>> {
    let user_id = auth.user_id;
    let user = state
        .store
        .run(move |conn| users::find_by_id(conn, user_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::ok(user))
}
