use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use meridian_types::api::{Claims, UpdatedCount};

use crate::auth::{AppState, blocking};
use crate::error::{ApiError, guarded};

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let limit = query.limit.min(200);
    let notifications = blocking(&state, move |db| {
        db.list_notifications(user_id, query.unread_only, limit)
    })
    .await?;
    Ok(Json(notifications))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = claims.sub;
    let outcome = blocking(&state, move |db| db.mark_notification_read(actor, id)).await?;
    Ok(Json(guarded(outcome, "notification")?))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let updated = blocking(&state, move |db| db.mark_all_notifications_read(user_id)).await?;
    Ok(Json(UpdatedCount { updated }))
}
