use crate::{
    admin_handlers, ai_handlers, auth_handlers, community_handlers, feedback_handlers, health,
    journal_handlers,
    middleware::{general_rate_limit, require_admin, require_auth, with_security_headers},
    mood_handlers, user_handlers, ApiError, AppState,
};
use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{any, delete, get, post},
    Router,
};
use http::{header, HeaderValue, Method};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::warn;

pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

async fn api_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/api/auth/register", post(auth_handlers::register))
        .route("/api/auth/login", post(auth_handlers::login))
        .route("/api/mood/analyze", post(mood_handlers::analyze_mood));

    let authenticated = Router::new()
        .route("/api/auth/profile", get(auth_handlers::profile))
        .route(
            "/api/user/profile",
            get(auth_handlers::profile).put(user_handlers::update_profile),
        )
        // Journals
        .route(
            "/api/journals",
            get(journal_handlers::list_journals).post(journal_handlers::create_journal),
        )
        .route("/api/journals/report", get(journal_handlers::mood_report))
        .route("/api/harmful-words/check", post(journal_handlers::check_harmful))
        // AI chat
        .route("/api/ai/chat", post(ai_handlers::chat))
        .route(
            "/api/ai/history",
            get(ai_handlers::history).delete(ai_handlers::clear_history),
        )
        // Community board
        .route(
            "/api/community",
            get(community_handlers::list_posts).post(community_handlers::create_post),
        )
        .route("/api/community/{id}", delete(community_handlers::delete_post))
        .route("/api/community/{id}/like", post(community_handlers::toggle_like))
        .route("/api/community/{id}/vote", post(community_handlers::vote))
        .route(
            "/api/community/{id}/comments",
            get(community_handlers::list_comments).post(community_handlers::add_comment),
        )
        .route("/api/feedback", post(feedback_handlers::submit_feedback))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    // route_layer wraps outside-in: authentication runs before the admin check.
    let admin = Router::new()
        .route("/api/feedback/admin", get(feedback_handlers::all_feedback))
        .route("/api/admin/users", get(admin_handlers::list_users))
        .route("/api/admin/feedback", get(admin_handlers::list_feedback))
        .route("/api/admin/profile", get(auth_handlers::profile))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let router = Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(admin)
        .route("/api", any(api_not_found))
        .route("/api/{*rest}", any(api_not_found));

    let settings = state.config.config().server.clone();
    let router = match &settings.static_dir {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
        ),
        None => router.fallback(api_not_found),
    };

    // Outermost first.
    let router = router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&settings.cors_origins))
                .layer(from_fn_with_state(state.clone(), general_rate_limit))
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state);

    with_security_headers(router)
}
