use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use meridian_db::ConnectionOutcome;
use meridian_types::api::{Claims, ConnectionList, RespondConnectionRequest};
use meridian_types::connection::ConnectionAction;
use meridian_types::models::{Connection, ConnectionStatus, NotificationKind};

use crate::auth::{AppState, blocking};
use crate::error::{ApiError, guarded};
use crate::notify::notify;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<ConnectionStatus>,
}

fn applied(outcome: ConnectionOutcome) -> Result<Connection, ApiError> {
    match outcome {
        ConnectionOutcome::Applied(connection) => Ok(connection),
        ConnectionOutcome::Refused(refusal) => Err(refusal.into()),
    }
}

/// The connection between the caller and `user_id`, or `null`.
pub async fn get_status(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let me = claims.sub;
    let connection = blocking(&state, move |db| db.get_connection_between(me, user_id)).await?;
    Ok(Json(connection))
}

pub async fn request(
    State(state): State<AppState>,
    Path(target): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = claims.sub;
    let outcome = blocking(&state, move |db| {
        if actor != target && db.get_user_summary(target)?.is_none() {
            return Ok(None);
        }
        db.request_connection(actor, target).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    let connection = applied(outcome)?;

    info!("{} ({}) requested connection with {}", claims.name, actor, target);
    notify(
        &state,
        target,
        NotificationKind::ConnectionRequest,
        format!("{} sent you a connection request", claims.name),
    )
    .await;

    Ok((StatusCode::CREATED, Json(connection)))
}

/// Accept or reject the pending request `counterpart` sent to the caller.
pub async fn respond(
    State(state): State<AppState>,
    Path(counterpart): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RespondConnectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = claims.sub;
    let action = req.action;
    let outcome =
        blocking(&state, move |db| db.respond_connection(actor, counterpart, action)).await?;
    let connection = applied(outcome)?;

    let (kind, verb) = match action {
        ConnectionAction::Accept => (NotificationKind::ConnectionAccepted, "accepted"),
        ConnectionAction::Reject => (NotificationKind::ConnectionRejected, "declined"),
    };
    info!("{} ({}) {} connection from {}", claims.name, actor, verb, counterpart);
    notify(
        &state,
        counterpart,
        kind,
        format!("{} {} your connection request", claims.name, verb),
    )
    .await;

    Ok(Json(connection))
}

/// Connections of the caller. A PENDING filter splits the rows by direction.
pub async fn list(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if claims.sub != user_id {
        return Err(ApiError::Forbidden("cannot list another user's connections".into()));
    }
    let status = query.status;
    let connections = blocking(&state, move |db| db.list_connections(user_id, status)).await?;

    let list = if status == Some(ConnectionStatus::Pending) {
        let (sent, received) = connections
            .into_iter()
            .partition(|c| c.sender_id == user_id);
        ConnectionList::Pending { sent, received }
    } else {
        ConnectionList::All { connections }
    };
    Ok(Json(list))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(connection_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = claims.sub;
    let outcome = blocking(&state, move |db| db.delete_connection(actor, connection_id)).await?;
    let removed = guarded(outcome, "connection")?;
    info!(
        "{} ({}) deleted {} connection {}",
        claims.name, actor, removed.status, connection_id
    );
    Ok(StatusCode::NO_CONTENT)
}
