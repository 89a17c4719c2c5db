use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use meridian_db::ProfileChanges;
use meridian_types::api::{Claims, UpdateProfileImageRequest, UpdateProfileRequest};
use meridian_types::events::RelayEvent;

use crate::auth::{AppState, blocking};
use crate::error::ApiError;
use crate::validate;

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = blocking(&state, move |db| db.get_profile(user_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(Json(profile))
}

fn profile_changes(req: &UpdateProfileRequest) -> Result<ProfileChanges, ApiError> {
    let name = match req.name.as_deref() {
        Some(raw) => Some(Some(validate::name(raw)?)),
        None => None,
    };
    Ok(ProfileChanges {
        name,
        business_name: validate::optional(req.business_name.as_deref()),
        bio: validate::optional(req.bio.as_deref()),
        location: validate::optional(req.location.as_deref()),
        occupation: validate::optional(req.occupation.as_deref()),
        website: validate::optional_url("website", req.website.as_deref())?,
        facebook: validate::optional_url("facebook", req.facebook.as_deref())?,
        twitter: validate::optional_url("twitter", req.twitter.as_deref())?,
        linkedin: validate::optional_url("linkedin", req.linkedin.as_deref())?,
        instagram: validate::optional_url("instagram", req.instagram.as_deref())?,
    })
}

fn ensure_self(claims: &Claims, user_id: Uuid) -> Result<(), ApiError> {
    if claims.sub != user_id {
        return Err(ApiError::Forbidden("cannot modify another user's profile".into()));
    }
    Ok(())
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_self(&claims, user_id)?;
    let changes = profile_changes(&req)?;

    let profile = blocking(&state, move |db| db.update_profile(user_id, &changes))
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(Json(profile))
}

/// Set the profile image and announce it on the public channel.
pub async fn update_profile_image(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileImageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_self(&claims, user_id)?;
    let image = validate::required("image", &req.image)?;
    if !image.starts_with('/') {
        validate::http_url("image", &image)?;
    }

    let summary = blocking(&state, move |db| db.set_user_image(user_id, &image))
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    info!("{} ({}) changed profile image", claims.name, user_id);

    state
        .relay
        .publish_public(RelayEvent::ProfileUpdate {
            user_id,
            image: summary.image.clone(),
        })
        .await;

    Ok(Json(summary))
}
