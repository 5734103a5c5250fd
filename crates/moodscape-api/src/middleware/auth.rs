use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use moodscape_core::{AuthContext, SecurityEvent, SecurityLogger};
use moodscape_store::users;

use super::rate_limit::ClientIp;
use crate::{ApiError, ApiResult, AppState};

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolve the bearer token to a live account and attach its [`AuthContext`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let ip = req
        .extensions()
        .get::<ClientIp>()
        .map(|ClientIp(ip)| ip.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let Some(token) = bearer_token(&req) else {
        SecurityLogger::log_event(SecurityEvent::AuthenticationFailure {
            email: "anonymous".to_string(),
            ip_address: ip,
            reason: "No token provided".to_string(),
        });
        return Err(ApiError::Unauthorized(
            "Not authorized, no token".to_string(),
        ));
    };

    let claims = match state.jwt.validate(token) {
        Ok(claims) => claims,
        Err(e) => {
            SecurityLogger::log_event(SecurityEvent::AuthenticationFailure {
                email: "unknown".to_string(),
                ip_address: ip,
                reason: e.to_string(),
            });
            return Err(ApiError::Unauthorized(
                "Not authorized, token failed".to_string(),
            ));
        }
    };

    let user_id = claims.sub;
    let user = state
        .store
        .run(move |conn| users::find_by_id(conn, user_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    req.extensions_mut().insert(AuthContext {
        user_id: user.id,
        username: user.username,
        role: user.role,
        is_active: user.is_active,
    });
    Ok(next.run(req).await)
}

/// Must run after [`require_auth`].
pub async fn require_admin(req: Request, next: Next) -> ApiResult<Response> {
    let Some(auth) = req.extensions().get::<AuthContext>() else {
        return Err(ApiError::Unauthorized(
            "Not authorized, no token".to_string(),
        ));
    };

    if !auth.is_admin() {
        SecurityLogger::log_event(SecurityEvent::PermissionDenied {
            user_id: auth.user_id,
            resource: req.uri().path().to_string(),
        });
        return Err(ApiError::Forbidden("Forbidden: Admins only".to_string()));
    }
    Ok(next.run(req).await)
}
