use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use meridian_types::api::{Claims, MarkReadRequest, SendMessageRequest, UnreadCount, UpdatedCount};
use meridian_types::events::RelayEvent;

use crate::auth::{AppState, blocking};
use crate::error::ApiError;
use crate::validate;

/// Messages returned when a conversation is opened.
pub const CONVERSATION_PAGE: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub conversation_id: Option<Uuid>,
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = validate::required("content", &req.content)?;
    let sender = claims.sub;
    let receiver = req.receiver_id;
    if sender == receiver {
        return Err(ApiError::invalid_field("receiver_id", "cannot message yourself"));
    }

    let message = blocking(&state, move |db| {
        if db.get_user_summary(receiver)?.is_none() {
            return Ok(None);
        }
        db.send_message(sender, receiver, &content).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("receiver not found".into()))?;
    debug!("{} ({}) messaged {}", claims.name, sender, receiver);

    state
        .relay
        .publish_to_user(receiver, RelayEvent::NewMessage(message.clone()))
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Without `conversation_id`: the caller's conversations. With it: the latest
/// messages of that conversation, marking the ones addressed to the caller read.
pub async fn get_messages(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, ApiError> {
    let viewer = claims.sub;
    match query.conversation_id {
        Some(conversation_id) => {
            let messages = blocking(&state, move |db| {
                db.open_conversation(viewer, conversation_id, CONVERSATION_PAGE)
            })
            .await?
            .ok_or_else(|| ApiError::NotFound("conversation not found".into()))?;
            Ok(Json(messages).into_response())
        }
        None => {
            let conversations = blocking(&state, move |db| db.list_conversations(viewer)).await?;
            Ok(Json(conversations).into_response())
        }
    }
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MarkReadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub;
    let updated = blocking(&state, move |db| db.mark_messages_read(viewer, &req.message_ids)).await?;
    Ok(Json(UpdatedCount { updated }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let count = blocking(&state, move |db| db.unread_message_count(user_id)).await?;
    Ok(Json(UnreadCount { count }))
}
