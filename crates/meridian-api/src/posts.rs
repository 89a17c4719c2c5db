use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use meridian_db::NewPost;
use meridian_types::api::{Claims, CreatePostRequest, PostPage, UpvoteResponse};

use crate::auth::{AppState, blocking};
use crate::error::{ApiError, guarded};
use crate::validate;

pub const DEFAULT_PAGE_SIZE: u32 = 5;
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Id of the last post of the previous page.
    pub cursor: Option<Uuid>,
    pub limit: Option<u32>,
}

impl PageQuery {
    fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    page(&state, None, query).await
}

pub async fn list_user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    page(&state, Some(user_id), query).await
}

async fn page(state: &AppState, author: Option<Uuid>, query: PageQuery) -> Result<Json<PostPage>, ApiError> {
    let limit = query.limit();
    let cursor = query.cursor;
    let (items, next_cursor) =
        blocking(state, move |db| db.list_posts(author, cursor, limit)).await?;
    Ok(Json(PostPage { items, next_cursor }))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tags: Vec<String> = Vec::new();
    for tag in req.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|seen| seen == tag) {
            tags.push(tag.to_string());
        }
    }

    let post = NewPost {
        title: validate::required("title", &req.title)?,
        content: validate::required("content", &req.content)?,
        category: req.category,
        summary: validate::optional(req.summary.as_deref()).flatten(),
        featured_image: validate::optional(req.featured_image.as_deref()).flatten(),
        video_url: validate::optional_url("video_url", req.video_url.as_deref())?.flatten(),
        metadata: req.metadata,
        tags,
    };

    let author = claims.sub;
    let created = blocking(&state, move |db| db.create_post(author, &post)).await?;
    info!("{} published post {} ({})", claims.name, created.id, created.category);

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (actor, role) = (claims.sub, claims.role);
    let outcome = blocking(&state, move |db| db.delete_post(actor, role, post_id)).await?;
    guarded(outcome, "post")?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_upvote(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let (upvoted, upvote_count) = blocking(&state, move |db| db.toggle_upvote(post_id, user_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("post not found".into()))?;

    Ok(Json(UpvoteResponse {
        upvoted,
        upvote_count,
    }))
}
