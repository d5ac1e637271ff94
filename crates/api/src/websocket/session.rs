//! Per-connection session actor
//!
//! Each connection runs an inbound pump (socket -> hub) and an outbound pump
//! (mailbox -> socket). They share nothing but the session's mailbox; when
//! either exits the other is aborted and the session leaves the hub.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use helpdesk_shared::{Identity, TicketId};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::{timeout, timeout_at, Instant};

use crate::auth::{parse_bearer, Claims, JwtError, JwtManager};
use crate::store::CommentStore;

use super::events::{ChatMessage, InboundChat, InboundError};
use super::hub::{HubHandle, Participant, SessionKey};

/// Time allowed to write a single frame
pub const WRITE_WAIT: Duration = Duration::from_secs(10);
/// Time allowed between pongs before the peer is considered gone
pub const PONG_WAIT: Duration = Duration::from_secs(60);
/// Ping interval. Must be shorter than PONG_WAIT.
pub const PING_PERIOD: Duration = Duration::from_secs(54);

/// Timing and sizing knobs for a session
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub mailbox_capacity: usize,
    pub max_frame_bytes: usize,
    pub write_wait: Duration,
    pub pong_wait: Duration,
    pub ping_period: Duration,
}

impl SessionSettings {
    pub fn new(mailbox_capacity: usize, max_frame_bytes: usize) -> Self {
        Self {
            mailbox_capacity,
            max_frame_bytes,
            write_wait: WRITE_WAIT,
            pong_wait: PONG_WAIT,
            ping_period: PING_PERIOD,
        }
    }
}

/// Collaborators a session needs, cloned per connection
#[derive(Clone)]
pub struct SessionContext {
    pub hub: HubHandle,
    pub comments: Arc<dyn CommentStore>,
    pub settings: SessionSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("No bearer token supplied")]
    MissingToken,
    #[error("Malformed Authorization header")]
    MalformedHeader,
    #[error(transparent)]
    Token(#[from] JwtError),
}

/// Authenticate a connection attempt.
///
/// The `token` query parameter wins; otherwise an `Authorization: Bearer` header
/// is required. The token must be a valid, unrevoked access token.
pub async fn authenticate(
    query_token: Option<&str>,
    authorization: Option<&str>,
    jwt: &JwtManager,
) -> Result<Claims, HandshakeError> {
    let token = match query_token.filter(|t| !t.is_empty()) {
        Some(token) => token,
        None => {
            let header = authorization.ok_or(HandshakeError::MissingToken)?;
            parse_bearer(header).ok_or(HandshakeError::MalformedHeader)?
        }
    };

    Ok(jwt.validate_access(token).await?)
}

/// Drive one connection until either side stops
pub async fn run_session<W, R>(
    sink: W,
    stream: R,
    identity: Identity,
    room: TicketId,
    ctx: SessionContext,
) where
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: Display + Send,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin + Send + 'static,
{
    let (participant, mailbox) = Participant::new(room, ctx.settings.mailbox_capacity);
    let key = participant.key();
    ctx.hub.register(participant);

    tracing::info!(
        session_id = %key.session_id,
        ticket_id = %room,
        user_id = %identity.id,
        "Chat session started"
    );

    let settings = ctx.settings;
    let mut write_task = tokio::spawn(write_pump(sink, mailbox, settings));
    let reader_ctx = ctx.clone();
    let mut read_task = tokio::spawn(async move {
        read_pump(stream, &identity, key, &reader_ctx).await;
    });

    tokio::select! {
        _ = &mut write_task => read_task.abort(),
        _ = &mut read_task => write_task.abort(),
    }

    // May already be gone if the hub evicted us
    ctx.hub.unregister(key);
    tracing::info!(session_id = %key.session_id, ticket_id = %room, "Chat session ended");
}

/// Socket -> hub. Returns on close frame, read error or liveness timeout.
pub async fn read_pump<R>(mut stream: R, identity: &Identity, key: SessionKey, ctx: &SessionContext)
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let mut deadline = Instant::now() + ctx.settings.pong_wait;

    loop {
        let frame = match timeout_at(deadline, stream.next()).await {
            Err(_) => {
                tracing::info!(session_id = %key.session_id, "No pong within deadline, closing");
                return;
            }
            Ok(None) => return,
            Ok(Some(Err(e))) => {
                tracing::debug!(session_id = %key.session_id, error = %e, "Socket read failed");
                return;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => {
                if text.len() > ctx.settings.max_frame_bytes {
                    tracing::warn!(
                        session_id = %key.session_id,
                        size = text.len(),
                        "Frame exceeds limit, closing"
                    );
                    return;
                }
                if let Err(e) = handle_inbound(&text, identity, key.room, ctx).await {
                    tracing::warn!(session_id = %key.session_id, error = %e, "Skipping chat payload");
                }
            }
            Message::Pong(_) => {
                deadline = Instant::now() + ctx.settings.pong_wait;
            }
            Message::Close(_) => {
                tracing::debug!(session_id = %key.session_id, "Close frame received");
                return;
            }
            Message::Ping(_) | Message::Binary(_) => {}
        }
    }
}

/// Stamp, persist and broadcast one inbound payload.
///
/// Persistence failures are logged and do not block the broadcast.
pub async fn handle_inbound(
    text: &str,
    identity: &Identity,
    room: TicketId,
    ctx: &SessionContext,
) -> Result<(), InboundError> {
    let inbound = InboundChat::parse(text)?;
    let message = ChatMessage::stamped(inbound.content, room, identity, OffsetDateTime::now_utc());

    if let Err(e) = ctx
        .comments
        .save_comment(room, &message.content, identity)
        .await
    {
        tracing::error!(ticket_id = %room, user_id = %identity.id, error = %e, "Failed to persist chat comment");
    }

    ctx.hub.broadcast(message).await;
    Ok(())
}

/// Mailbox -> socket, plus periodic pings
pub async fn write_pump<W>(mut sink: W, mut mailbox: mpsc::Receiver<ChatMessage>, settings: SessionSettings)
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let mut ping = tokio::time::interval_at(Instant::now() + settings.ping_period, settings.ping_period);

    loop {
        let frame = tokio::select! {
            message = mailbox.recv() => match message {
                Some(message) => match serde_json::to_string(&message) {
                    Ok(json) => Message::Text(json),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize chat message");
                        continue;
                    }
                },
                None => {
                    // Closed by the hub (eviction or teardown)
                    let _ = timeout(settings.write_wait, sink.send(Message::Close(None))).await;
                    return;
                }
            },
            _ = ping.tick() => Message::Ping(Vec::new()),
        };

        match timeout(settings.write_wait, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Socket write failed");
                return;
            }
            Err(_) => {
                tracing::info!("Socket write timed out");
                return;
            }
        }
    }
}
