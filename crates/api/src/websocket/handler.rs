//! WebSocket handler for Axum
//!
//! Authenticates the upgrade request, then hands the socket to a session.

use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{header::AUTHORIZATION, HeaderMap},
    response::Response,
};
use futures::StreamExt;
use helpdesk_shared::TicketId;
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

use super::session::{authenticate, run_session, HandshakeError};

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    token: Option<String>,
}

/// Upgrade `GET /v1/ws/ticket/:ticket_id` to a chat session.
///
/// Authentication happens before the upgrade, so a rejected client never
/// joins a room.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    Query(params): Query<WebSocketQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    let claims = authenticate(params.token.as_deref(), authorization, &state.jwt_manager)
        .await
        .map_err(|e| {
            tracing::warn!(ticket_id = %ticket_id, error = %e, "WebSocket handshake rejected");
            match e {
                HandshakeError::Token(err) => ApiError::from(err),
                HandshakeError::MissingToken => ApiError::MissingAuthorization,
                HandshakeError::MalformedHeader => ApiError::MalformedAuthorization,
            }
        })?;

    let room = TicketId(ticket_id);
    let identity = claims.data;
    let ctx = state.session_context();

    tracing::info!(
        ticket_id = %room,
        user_id = %identity.id,
        "WebSocket connection upgrade requested"
    );

    Ok(ws
        .max_message_size(ctx.settings.max_frame_bytes)
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            run_session(sink, stream, identity, room, ctx).await;
        }))
}
