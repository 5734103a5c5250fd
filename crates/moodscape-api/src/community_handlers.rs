use axum::{extract::State, Extension};
use moodscape_core::{
    validation, AuthContext, Comment, NewPost, PostId, PostView, SecurityEvent, SecurityLogger,
    VoteTally, VoteType, DEFAULT_CATEGORY,
};
use moodscape_store::community;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{count_param, ApiError, ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, AppState};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Serialize)]
pub struct PostPage {
    pub posts: Vec<PostView>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    pub category: Option<String>,
    #[serde(default, alias = "isAnonymous")]
    pub is_anonymous: bool,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    #[serde(rename = "type")]
    pub vote_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct LikeState {
    pub liked: bool,
}

fn post_not_found() -> ApiError {
    ApiError::NotFound("Post not found".to_string())
}

async fn ensure_post_exists(state: &AppState, post_id: PostId) -> ApiResult<()> {
    let post = state
        .store
        .run(move |conn| community::get_post(conn, post_id))
        .await?;
    post.map(|_| ()).ok_or_else(post_not_found)
}

pub async fn list_posts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<ApiResponse<PostPage>> {
    let limit = count_param(query.limit.as_deref(), DEFAULT_PAGE_SIZE);
    let offset = count_param(query.offset.as_deref(), 0);

    let (posts, total) = state
        .store
        .run(move |conn| {
            let posts = community::list_views(conn, limit, offset)?;
            Ok((posts, community::count_posts(conn)?))
        })
        .await?;

    Ok(ApiResponse::ok(PostPage {
        posts,
        pagination: Pagination {
            total,
            limit,
            offset,
        },
    }))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(request): ApiJson<CreatePostRequest>,
) -> ApiResult<ApiResponse<PostView>> {
    let input = validation::validate_post(
        request.title.as_deref(),
        &request.content,
        request.category.as_deref(),
    )?;

    let new_post = NewPost {
        user_id: auth.user_id,
        title: input.title,
        content: input.content,
        category: input
            .category
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        is_anonymous: request.is_anonymous,
    };

    let view = state
        .store
        .run(move |conn| {
            let post = community::create_post(conn, &new_post)?;
            community::post_view(conn, post.id)
        })
        .await?
        .ok_or_else(|| ApiError::Internal("created post vanished".to_string()))?;

    info!(user_id = auth.user_id, post_id = view.post.id, "Community post created");
    Ok(ApiResponse::created(view).with_message("Post created successfully"))
}

/// Authors may delete their own posts; admins may delete any.
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(post_id): ApiPath<PostId>,
) -> ApiResult<ApiResponse<()>> {
    let post = state
        .store
        .run(move |conn| community::get_post(conn, post_id))
        .await?
        .ok_or_else(post_not_found)?;

    if post.user_id != auth.user_id && !auth.is_admin() {
        SecurityLogger::log_event(SecurityEvent::PermissionDenied {
            user_id: auth.user_id,
            resource: format!("community_post:{post_id}"),
        });
        return Err(ApiError::Forbidden(
            "Unauthorized to delete post".to_string(),
        ));
    }

    state
        .store
        .run(move |conn| community::delete_post(conn, post_id))
        .await?;

    info!(user_id = auth.user_id, post_id, "Community post deleted");
    Ok(ApiResponse::message("Post deleted successfully"))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(post_id): ApiPath<PostId>,
) -> ApiResult<ApiResponse<LikeState>> {
    ensure_post_exists(&state, post_id).await?;

    let user_id = auth.user_id;
    let liked = state
        .store
        .run(move |conn| community::toggle_like(conn, post_id, user_id))
        .await?;

    let message = if liked { "Post liked" } else { "Post unliked" };
    Ok(ApiResponse::ok(LikeState { liked }).with_message(message))
}

pub async fn vote(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(post_id): ApiPath<PostId>,
    ApiJson(request): ApiJson<VoteRequest>,
) -> ApiResult<ApiResponse<VoteTally>> {
    let vote_type: VoteType = request
        .vote_type
        .as_deref()
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| ApiError::BadRequest("Invalid vote type".to_string()))?;

    ensure_post_exists(&state, post_id).await?;

    let user_id = auth.user_id;
    let tally = state
        .store
        .run(move |conn| community::toggle_vote(conn, post_id, user_id, vote_type))
        .await?;

    Ok(ApiResponse::ok(tally).with_message("Vote recorded"))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(post_id): ApiPath<PostId>,
    ApiJson(request): ApiJson<CommentRequest>,
) -> ApiResult<ApiResponse<Comment>> {
    let content = request.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Comment cannot be empty".to_string()));
    }

    ensure_post_exists(&state, post_id).await?;

    let user_id = auth.user_id;
    let comment = state
        .store
        .run(move |conn| community::add_comment(conn, post_id, user_id, &content))
        .await?;

    Ok(ApiResponse::ok(comment).with_message("Comment added"))
}

pub async fn list_comments(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<PostId>,
) -> ApiResult<ApiResponse<Vec<Comment>>> {
    let comments = state
        .store
        .run(move |conn| community::comments_for_post(conn, post_id))
        .await?;
    Ok(ApiResponse::ok(comments))
}
