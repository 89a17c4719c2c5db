use axum::{
    Extension, Form, Json,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
};
use tracing::debug;

use meridian_relay::connection;
use meridian_types::api::{ChannelAuthRequest, ChannelAuthResponse, Claims};

use crate::auth::AppState;
use crate::error::ApiError;

/// Sign a private channel subscription for the caller's socket.
pub async fn channel_auth(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Form(req): Form<ChannelAuthRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let socket_id = req
        .socket_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::invalid_field("socket_id", "socket_id is required"))?;
    let channel_name = req
        .channel_name
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::invalid_field("channel_name", "channel_name is required"))?;

    let auth = state
        .relay
        .signer()
        .authorize(claims.sub, &socket_id, &channel_name)?;
    debug!("Authorized {} for socket {}", channel_name, socket_id);

    Ok(Json(ChannelAuthResponse { auth }))
}

/// Upgrade to the self-hosted relay socket. Absent when a hosted service is configured.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let dispatcher = state
        .relay
        .dispatcher()
        .cloned()
        .ok_or_else(|| ApiError::NotFound("relay is served by the hosted service".into()))?;
    let signer = state.relay.signer().clone();

    Ok(ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, signer)))
}
