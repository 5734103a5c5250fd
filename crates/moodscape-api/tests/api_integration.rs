use async_trait::async_trait;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum_test::TestServer;
use moodscape_ai::{ChatProvider, GenerationConfig, LLMResponse, LLMResult, Message, ProviderError};
use moodscape_api::{create_router, AppState};
use moodscape_core::{ConfigManager, MoodscapeConfig, Role};
use moodscape_store::{
    users::{self, NewUser},
    Store,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Chat provider that answers from a fixed script, then fails.
struct ScriptedProvider {
    replies: Mutex<VecDeque<LLMResult<String>>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<LLMResult<String>>) -> Arc<dyn ChatProvider> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
        })
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn generate_chat(
        &self,
        _messages: &[Message],
        _config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let next = self.replies.lock().unwrap().pop_front().unwrap_or(Err(
            ProviderError::Api {
                status: 500,
                message: "script exhausted".into(),
            },
        ));
        next.map(|content| LLMResponse {
            content,
            model: "scripted".into(),
            finish_reason: Some("stop".into()),
            total_tokens: None,
        })
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

struct TestApp {
    server: TestServer,
    state: AppState,
    _dir: TempDir,
}

fn test_config() -> MoodscapeConfig {
    let mut config = MoodscapeConfig::default();
    config.auth.jwt_secret = Some(SecretString::from(
        "integration-test-secret-that-is-long-enough".to_string(),
    ));
    config
}

fn spawn_app(provider: Option<Arc<dyn ChatProvider>>) -> TestApp {
    spawn_app_with(test_config(), provider)
}

fn spawn_app_with(config: MoodscapeConfig, provider: Option<Arc<dyn ChatProvider>>) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Store::open(dir.path().join("moodscape.db"), 2).expect("store");
    let config = Arc::new(ConfigManager::from_config(config).expect("config"));
    let state = AppState::with_parts(config, store, provider).expect("app state");
    let server = TestServer::new(create_router(state.clone())).expect("test server");

    TestApp {
        server,
        state,
        _dir: dir,
    }
}

async fn register(app: &TestApp, username: &str) -> (i64, String) {
    let resp = app
        .server
        .post("/api/auth/register")
        .json(&json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "secret1",
            "full_name": "Test User",
        }))
        .await;
    assert_eq!(resp.status_code(), 201, "{}", resp.text());

    let body: Value = resp.json();
    let id = body["data"]["user"]["id"].as_i64().expect("user id");
    let token = body["data"]["token"].as_str().expect("token").to_string();
    (id, token)
}

fn admin_token(app: &TestApp) -> String {
    let conn = app.state.store.connection().unwrap();
    let admin = users::create(
        &conn,
        &NewUser {
            username: "admin".into(),
            email: "admin@example.com".into(),
            password_hash: "unused".into(),
            full_name: None,
            role: Role::Admin,
        },
    )
    .unwrap();
    app.state.jwt.issue(admin.id).unwrap()
}

#[tokio::test]
async fn health_reports_running() {
    let app = spawn_app(None);

    let resp = app.server.get("/health").await;
    assert_eq!(resp.status_code(), 200);
    let body: Value = resp.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "MoodScape API is running");
    assert!(body["timestamp"].is_string());

    assert_eq!(resp.header("x-content-type-options"), "nosniff");
    assert_eq!(resp.header("x-frame-options"), "SAMEORIGIN");
    assert_eq!(resp.header("referrer-policy"), "no-referrer");
}

#[tokio::test]
async fn unknown_api_route_is_json_404() {
    let app = spawn_app(None);

    let resp = app.server.get("/api/does-not-exist").await;
    assert_eq!(resp.status_code(), 404);
    let body: Value = resp.json();
    assert_eq!(body, json!({ "success": false, "message": "Route not found" }));
}

#[tokio::test]
async fn register_login_and_profile() {
    let app = spawn_app(None);
    let (id, token) = register(&app, "alice").await;

    let dup = app
        .server
        .post("/api/auth/register")
        .json(&json!({
            "username": "alice2",
            "email": "alice@example.com",
            "password": "secret1",
        }))
        .await;
    assert_eq!(dup.status_code(), 400);
    assert_eq!(dup.json::<Value>()["message"], "Email already registered");

    let login = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "alice@example.com", "password": "secret1" }))
        .await;
    assert_eq!(login.status_code(), 200);
    assert!(login.json::<Value>()["data"]["token"].is_string());

    let profile = app
        .server
        .get("/api/auth/profile")
        .authorization_bearer(&token)
        .await;
    assert_eq!(profile.status_code(), 200);
    let body: Value = profile.json();
    assert_eq!(body["data"]["id"], id);
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn registration_validation_lists_field_errors() {
    let app = spawn_app(None);

    let resp = app
        .server
        .post("/api/auth/register")
        .json(&json!({ "username": "a!", "email": "nope", "password": "abcdef" }))
        .await;
    assert_eq!(resp.status_code(), 400);

    let body: Value = resp.json();
    assert_eq!(body["success"], false);
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"username"));
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = spawn_app(None);

    let missing = app.server.get("/api/journals").await;
    assert_eq!(missing.status_code(), 401);

    let garbage = app
        .server
        .get("/api/journals")
        .authorization_bearer("not-a-jwt")
        .await;
    assert_eq!(garbage.status_code(), 401);

    // Token for an account that no longer exists.
    let orphan = app.state.jwt.issue(9999).unwrap();
    let resp = app
        .server
        .get("/api/journals")
        .authorization_bearer(&orphan)
        .await;
    assert_eq!(resp.status_code(), 404);
    assert_eq!(resp.json::<Value>()["message"], "User not found");
}

#[tokio::test]
async fn failed_logins_lock_the_client_out() {
    let app = spawn_app(None);
    register(&app, "bob").await;

    for _ in 0..5 {
        let resp = app
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": "bob@example.com", "password": "wrong1" }))
            .await;
        assert_eq!(resp.status_code(), 401);
        assert_eq!(resp.json::<Value>()["message"], "Invalid email or password");
    }

    let locked = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": "bob@example.com", "password": "secret1" }))
        .await;
    assert_eq!(locked.status_code(), 429);
    assert!(locked.headers().contains_key("retry-after"));
    assert_eq!(
        locked.json::<Value>()["message"],
        "Too many login attempts, please try again after 15 minutes."
    );
}

#[tokio::test]
async fn journal_entry_is_analyzed_and_listed() {
    let provider = ScriptedProvider::new(vec![Ok(
        r#"{"mood":"Happy","moodScore":8,"aiResponse":"Wonderful news. Keep it up! One more thing."}"#
            .to_string(),
    )]);
    let app = spawn_app(Some(provider));
    let (_, token) = register(&app, "carol").await;

    let resp = app
        .server
        .post("/api/journals")
        .authorization_bearer(&token)
        .json(&json!({ "content": "  I got the job today  " }))
        .await;
    assert_eq!(resp.status_code(), 201, "{}", resp.text());

    let body: Value = resp.json();
    assert_eq!(body["harmful_detected"], false);
    assert_eq!(body["data"]["content"], "I got the job today");
    assert_eq!(body["data"]["mood"], "happy");
    assert_eq!(body["data"]["mood_score"], 8.0);
    assert_eq!(body["data"]["ai_response"], "Wonderful news. Keep it up!");
    assert_eq!(
        body["data"]["ai_report"],
        "Keep journaling to track your emotions!"
    );

    let list = app
        .server
        .get("/api/journals")
        .authorization_bearer(&token)
        .await;
    assert_eq!(list.status_code(), 200);
    assert_eq!(list.json::<Value>()["data"].as_array().unwrap().len(), 1);

    let report = app
        .server
        .get("/api/journals/report")
        .authorization_bearer(&token)
        .await;
    let report: Value = report.json();
    assert_eq!(report["data"]["total_entries"], 1);
}

#[tokio::test]
async fn harmful_entry_gets_crisis_reply_and_is_logged() {
    let app = spawn_app(None);
    let (user_id, token) = register(&app, "dave").await;

    let resp = app
        .server
        .post("/api/journals")
        .authorization_bearer(&token)
        .json(&json!({ "content": "Some days I think about suicide." }))
        .await;
    assert_eq!(resp.status_code(), 201);

    let body: Value = resp.json();
    assert_eq!(body["harmful_detected"], true);
    assert_eq!(body["data"]["is_crisis"], true);
    assert!(body["data"]["ai_response"]
        .as_str()
        .unwrap()
        .contains("Your safety matters"));

    let conn = app.state.store.connection().unwrap();
    let (logged, context): (i64, String) = conn
        .query_row(
            "SELECT COUNT(*), MAX(context) FROM harmful_word_log WHERE user_id = ?1",
            [user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert!(logged >= 1);
    assert_eq!(context, "Some days I think about suicide.");
}

#[tokio::test]
async fn journal_creation_is_capped_per_day() {
    let app = spawn_app(None);
    let (_, token) = register(&app, "erin").await;

    for i in 0..10 {
        let resp = app
            .server
            .post("/api/journals")
            .authorization_bearer(&token)
            .json(&json!({ "content": format!("entry number {i}") }))
            .await;
        assert_eq!(resp.status_code(), 201);
    }

    let resp = app
        .server
        .post("/api/journals")
        .authorization_bearer(&token)
        .json(&json!({ "content": "one too many" }))
        .await;
    assert_eq!(resp.status_code(), 429);
    assert_eq!(resp.header("x-ratelimit-limit"), "10");
}

#[tokio::test]
async fn harmful_check_and_mood_analysis() {
    let app = spawn_app(None);
    let (_, token) = register(&app, "frank").await;

    let missing = app
        .server
        .post("/api/harmful-words/check")
        .authorization_bearer(&token)
        .json(&json!({}))
        .await;
    assert_eq!(missing.status_code(), 400);
    assert_eq!(missing.json::<Value>(), json!({ "words": [] }));

    let found = app
        .server
        .post("/api/harmful-words/check")
        .authorization_bearer(&token)
        .json(&json!({ "content": "I want to hurt myself" }))
        .await;
    let words = found.json::<Value>()["words"].as_array().unwrap().clone();
    assert!(words.contains(&json!("hurt myself")));

    let no_text = app.server.post("/api/mood/analyze").json(&json!({})).await;
    assert_eq!(no_text.status_code(), 400);
    assert_eq!(no_text.json::<Value>(), json!({ "error": "Missing text" }));

    let reading = app
        .server
        .post("/api/mood/analyze")
        .json(&json!({ "text": "I am so happy and grateful today" }))
        .await;
    assert_eq!(reading.status_code(), 200);
    let reading: Value = reading.json();
    assert!(reading["moodLabel"].is_string());
    assert!(reading["score"].as_i64().unwrap() >= 1);
}

#[tokio::test]
async fn chat_persists_turns_and_reports_failures() {
    let provider = ScriptedProvider::new(vec![Ok("Hi there, how are you feeling?".to_string())]);
    let app = spawn_app(Some(provider));
    let (_, token) = register(&app, "gina").await;

    let blank = app
        .server
        .post("/api/ai/chat")
        .authorization_bearer(&token)
        .json(&json!({ "message": "   " }))
        .await;
    assert_eq!(blank.status_code(), 400);
    assert_eq!(blank.json::<Value>()["error"], "Message is required.");

    let ok = app
        .server
        .post("/api/ai/chat")
        .authorization_bearer(&token)
        .json(&json!({ "message": "hello", "systemPrompt": "Be kind." }))
        .await;
    assert_eq!(ok.status_code(), 200);
    let body: Value = ok.json();
    assert_eq!(body["reply"], "Hi there, how are you feeling?");
    assert_eq!(body["conversation"].as_array().unwrap().len(), 2);

    // The script is exhausted, so this turn fails upstream.
    let failed = app
        .server
        .post("/api/ai/chat")
        .authorization_bearer(&token)
        .json(&json!({ "message": "still there?" }))
        .await;
    assert_eq!(failed.status_code(), 502);
    let body: Value = failed.json();
    assert_eq!(body["success"], false);
    let conversation = body["conversation"].as_array().unwrap();
    assert_eq!(conversation.len(), 4);
    assert_eq!(conversation[3]["is_error"], true);

    let cleared = app
        .server
        .delete("/api/ai/history")
        .authorization_bearer(&token)
        .await;
    assert_eq!(cleared.json::<Value>()["conversation"], json!([]));

    let history = app
        .server
        .get("/api/ai/history")
        .authorization_bearer(&token)
        .await;
    assert_eq!(history.json::<Value>()["conversation"], json!([]));
}

#[tokio::test]
async fn community_posts_votes_likes_and_comments() {
    let app = spawn_app(None);
    let (_, alice) = register(&app, "alice").await;
    let (_, bob) = register(&app, "bob").await;

    let created = app
        .server
        .post("/api/community")
        .authorization_bearer(&alice)
        .json(&json!({ "content": "Anyone else up late?", "is_anonymous": true, "category": "Vent" }))
        .await;
    assert_eq!(created.status_code(), 201);
    let post_id = created.json::<Value>()["data"]["id"].as_i64().unwrap();

    let liked = app
        .server
        .post(&format!("/api/community/{post_id}/like"))
        .authorization_bearer(&bob)
        .await;
    assert_eq!(liked.json::<Value>()["data"]["liked"], true);

    let bad_vote = app
        .server
        .post(&format!("/api/community/{post_id}/vote"))
        .authorization_bearer(&bob)
        .json(&json!({ "type": "sideways" }))
        .await;
    assert_eq!(bad_vote.status_code(), 400);
    assert_eq!(bad_vote.json::<Value>()["message"], "Invalid vote type");

    let up = app
        .server
        .post(&format!("/api/community/{post_id}/vote"))
        .authorization_bearer(&bob)
        .json(&json!({ "type": "up" }))
        .await;
    assert_eq!(up.json::<Value>()["data"], json!({ "upvotes": 1, "downvotes": 0 }));

    let switched = app
        .server
        .post(&format!("/api/community/{post_id}/vote"))
        .authorization_bearer(&bob)
        .json(&json!({ "type": "down" }))
        .await;
    assert_eq!(switched.json::<Value>()["data"], json!({ "upvotes": 0, "downvotes": 1 }));

    let empty_comment = app
        .server
        .post(&format!("/api/community/{post_id}/comments"))
        .authorization_bearer(&bob)
        .json(&json!({ "content": "  " }))
        .await;
    assert_eq!(empty_comment.status_code(), 400);

    app.server
        .post(&format!("/api/community/{post_id}/comments"))
        .authorization_bearer(&bob)
        .json(&json!({ "content": "Me too" }))
        .await;

    let missing = app
        .server
        .post("/api/community/9999/comments")
        .authorization_bearer(&bob)
        .json(&json!({ "content": "hello?" }))
        .await;
    assert_eq!(missing.status_code(), 404);

    let page = app
        .server
        .get("/api/community")
        .authorization_bearer(&bob)
        .await;
    let page: Value = page.json();
    let post = &page["data"]["posts"][0];
    assert_eq!(post["user"]["username"], "Anonymous");
    assert_eq!(post["likes_count"], 1);
    assert_eq!(post["comments"][0]["content"], "Me too");
    assert_eq!(page["data"]["pagination"]["total"], 1);
    assert_eq!(page["data"]["pagination"]["limit"], 20);

    let forbidden = app
        .server
        .delete(&format!("/api/community/{post_id}"))
        .authorization_bearer(&bob)
        .await;
    assert_eq!(forbidden.status_code(), 403);

    let deleted = app
        .server
        .delete(&format!("/api/community/{post_id}"))
        .authorization_bearer(&alice)
        .await;
    assert_eq!(deleted.status_code(), 200);

    let gone = app
        .server
        .delete(&format!("/api/community/{post_id}"))
        .authorization_bearer(&alice)
        .await;
    assert_eq!(gone.status_code(), 404);
}

#[tokio::test]
async fn admin_routes_are_restricted() {
    let app = spawn_app(None);
    let (_, user) = register(&app, "henry").await;
    let admin = admin_token(&app);

    let feedback = app
        .server
        .post("/api/feedback")
        .authorization_bearer(&user)
        .json(&json!({ "message": "Love it" }))
        .await;
    assert_eq!(feedback.status_code(), 201);

    let denied = app
        .server
        .get("/api/admin/users")
        .authorization_bearer(&user)
        .await;
    assert_eq!(denied.status_code(), 403);
    assert_eq!(denied.json::<Value>()["message"], "Forbidden: Admins only");

    let users = app
        .server
        .get("/api/admin/users")
        .authorization_bearer(&admin)
        .await;
    assert_eq!(users.status_code(), 200);
    let users: Value = users.json();
    assert_eq!(users.as_array().unwrap().len(), 2);
    assert_eq!(users[1]["role"], "admin");

    let all_feedback = app
        .server
        .get("/api/feedback/admin")
        .authorization_bearer(&admin)
        .await;
    let body: Value = all_feedback.json();
    assert_eq!(body["data"][0]["message"], "Love it");
    assert_eq!(body["data"][0]["user"]["username"], "henry");

    let profile = app
        .server
        .get("/api/admin/profile")
        .authorization_bearer(&admin)
        .await;
    assert_eq!(profile.json::<Value>()["data"]["role"], "admin");
}

#[tokio::test]
async fn general_limiter_applies_per_client() {
    let mut config = test_config();
    config.rate_limit.max_requests = 2;
    let app = spawn_app_with(config, None);

    assert_eq!(app.server.get("/health").await.status_code(), 200);
    assert_eq!(app.server.get("/health").await.status_code(), 200);

    let limited = app.server.get("/health").await;
    assert_eq!(limited.status_code(), 429);
    assert_eq!(
        limited.json::<Value>()["message"],
        "Too many requests from this IP, please try again later."
    );
}

#[tokio::test]
async fn forged_forwarding_entries_do_not_escape_login_lockout() {
    let app = spawn_app(None);
    register(&app, "mallory").await;

    for i in 0..5 {
        let forwarded = HeaderValue::from_str(&format!("10.9.{i}.1, 127.0.0.1")).unwrap();
        let resp = app
            .server
            .post("/api/auth/login")
            .add_header(HeaderName::from_static("x-forwarded-for"), forwarded)
            .json(&json!({ "email": "mallory@example.com", "password": "wrong1" }))
            .await;
        assert_eq!(resp.status_code(), 401);
    }

    let locked = app
        .server
        .post("/api/auth/login")
        .add_header(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("10.9.99.1, 127.0.0.1"),
        )
        .json(&json!({ "email": "mallory@example.com", "password": "secret1" }))
        .await;
    assert_eq!(locked.status_code(), 429);
}

#[tokio::test]
async fn malformed_query_and_path_values_keep_the_json_envelope() {
    let app = spawn_app(None);
    let (_, token) = register(&app, "nina").await;

    let journals = app
        .server
        .get("/api/journals")
        .add_query_param("limit", "abc")
        .authorization_bearer(&token)
        .await;
    assert_eq!(journals.status_code(), 200);
    assert_eq!(journals.json::<Value>()["data"], json!([]));

    let posts = app
        .server
        .get("/api/community")
        .add_query_param("limit", "lots")
        .add_query_param("offset", "-3")
        .authorization_bearer(&token)
        .await;
    assert_eq!(posts.status_code(), 200);
    let pagination = &posts.json::<Value>()["data"]["pagination"];
    assert_eq!(pagination["limit"], 20);
    assert_eq!(pagination["offset"], 0);

    let like = app
        .server
        .post("/api/community/abc/like")
        .authorization_bearer(&token)
        .await;
    assert_eq!(like.status_code(), 404);
    assert!(like
        .header("content-type")
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    let body: Value = like.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Resource not found");
}

#[tokio::test]
async fn ai_chat_is_limited_per_user() {
    let app = spawn_app(None);
    let (_, token) = register(&app, "olga").await;

    for _ in 0..20 {
        let resp = app
            .server
            .post("/api/ai/chat")
            .authorization_bearer(&token)
            .json(&json!({ "message": "" }))
            .await;
        assert_eq!(resp.status_code(), 400);
    }

    let limited = app
        .server
        .post("/api/ai/chat")
        .authorization_bearer(&token)
        .json(&json!({ "message": "hello" }))
        .await;
    assert_eq!(limited.status_code(), 429);
    assert_eq!(
        limited.json::<Value>()["message"],
        "Too many AI requests, please wait a moment."
    );

    // Another user still has a full quota.
    let (_, other) = register(&app, "pete").await;
    let fresh = app
        .server
        .post("/api/ai/chat")
        .authorization_bearer(&other)
        .json(&json!({ "message": "" }))
        .await;
    assert_eq!(fresh.status_code(), 400);
}

#[tokio::test]
async fn static_dir_serves_the_frontend_but_not_api_paths() {
    let site = tempfile::tempdir().expect("site dir");
    std::fs::write(
        site.path().join("index.html"),
        "<html><body>MoodScape app</body></html>",
    )
    .unwrap();

    let mut config = test_config();
    config.server.static_dir = Some(site.path().to_path_buf());
    let app = spawn_app_with(config, None);

    let page = app.server.get("/journal/history").await;
    assert_eq!(page.status_code(), 200);
    assert!(page.text().contains("MoodScape app"));

    let root = app.server.get("/").await;
    assert_eq!(root.status_code(), 200);
    assert!(root.text().contains("MoodScape app"));

    let api = app.server.get("/api/nope").await;
    assert_eq!(api.status_code(), 404);
    assert_eq!(api.json::<Value>()["message"], "Route not found");
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let app = spawn_app(None);

    let preflight = app
        .server
        .method(Method::OPTIONS, "/api/auth/login")
        .add_header(
            header::ORIGIN,
            HeaderValue::from_static("http://localhost:5173"),
        )
        .add_header(
            header::ACCESS_CONTROL_REQUEST_METHOD,
            HeaderValue::from_static("POST"),
        )
        .add_header(
            header::ACCESS_CONTROL_REQUEST_HEADERS,
            HeaderValue::from_static("content-type,authorization"),
        )
        .await;

    assert_eq!(preflight.status_code(), 200);
    assert_eq!(
        preflight.header("access-control-allow-origin"),
        "http://localhost:5173"
    );
    assert_eq!(preflight.header("access-control-allow-credentials"), "true");

    let methods = preflight
        .header("access-control-allow-methods")
        .to_str()
        .unwrap()
        .to_ascii_uppercase();
    for method in ["GET", "POST", "PUT", "DELETE", "OPTIONS"] {
        assert!(methods.contains(method), "{method} missing from {methods}");
    }

    let headers = preflight
        .header("access-control-allow-headers")
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(headers.contains("content-type"));
    assert!(headers.contains("authorization"));

    let foreign = app
        .server
        .method(Method::OPTIONS, "/api/auth/login")
        .add_header(
            header::ORIGIN,
            HeaderValue::from_static("http://evil.test"),
        )
        .add_header(
            header::ACCESS_CONTROL_REQUEST_METHOD,
            HeaderValue::from_static("POST"),
        )
        .await;
    assert!(foreign
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}
