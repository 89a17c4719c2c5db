use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use meridian_types::api::{Claims, CreateCommentRequest};

use crate::auth::{AppState, blocking};
use crate::error::ApiError;
use crate::validate;

pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let comments = blocking(&state, move |db| {
        if db.get_post(post_id)?.is_none() {
            return Ok(None);
        }
        db.list_comments(post_id).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("post not found".into()))?;

    Ok(Json(comments))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = validate::required("content", &req.content)?;
    let author = claims.sub;
    let comment = blocking(&state, move |db| db.create_comment(post_id, author, &content))
        .await?
        .ok_or_else(|| ApiError::NotFound("post not found".into()))?;

    Ok((StatusCode::CREATED, Json(comment)))
}
