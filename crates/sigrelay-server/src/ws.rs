use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use sigrelay_core::{ErrorCode, validate};

use crate::rate_limit::SlidingWindowLimiter;
use crate::registry::AdmitError;
use crate::router;
use crate::state::{AppState, ConnectionGuard};

/// Capacity of a member's dedicated control channel (error/rejection
/// envelopes). Kept small and independent of `outbound_queue_capacity` so a
/// congested data queue never delays the frame explaining why the
/// connection is closing.
const CONTROL_QUEUE_CAPACITY: usize = 4;

/// Grace period for the writer task to flush its remaining queued frames
/// after the connection is cancelled, before it is forcibly aborted.
const WRITER_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Query parameters on the upgrade URL: `/?room=<code>&clientId=<id>&token=<bearer>`.
/// Kept optional so a missing parameter is reported as `bad_request` over the
/// socket rather than as a pre-handshake HTTP error, matching how every other
/// rejection in this handler is delivered.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub room: Option<String>,
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
    pub token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, query, state))
}

async fn handle_socket(socket: WebSocket, query: ConnectQuery, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (room, client_id, token) = match (query.room, query.client_id, query.token) {
        (Some(r), Some(c), Some(t)) => (r, c, t),
        _ => {
            reject_upgrade(
                &mut ws_sender,
                ErrorCode::BadRequest,
                "room, clientId, and token are all required",
            )
            .await;
            return;
        },
    };

    if !validate::is_valid_room_code(&room) || !validate::is_valid_client_id(&client_id) {
        reject_upgrade(
            &mut ws_sender,
            ErrorCode::BadRequest,
            "room or clientId out of bounds",
        )
        .await;
        return;
    }

    let verdict = state.verifier.verify(&token);
    if !verdict.ok {
        reject_upgrade(&mut ws_sender, ErrorCode::AuthFailed, &verdict.reason).await;
        return;
    }
    let subject = verdict.subject;

    let (tx, mut rx) = mpsc::channel::<Message>(state.config.limits.outbound_queue_capacity);
    let (control_tx, mut control_rx) = mpsc::channel::<Message>(CONTROL_QUEUE_CAPACITY);
    let control_tx_self = control_tx.clone();

    let admit = state
        .registry
        .admit(
            &room,
            &client_id,
            &subject,
            tx,
            control_tx,
            state.config.limits.room_capacity,
            &state.shutdown,
        )
        .await;

    let (existing, member_cancel) = match admit {
        Ok(outcome) => (outcome.existing, outcome.member_cancel),
        Err(AdmitError::RoomFull) => {
            reject_upgrade(&mut ws_sender, ErrorCode::RoomFull, "room is at capacity").await;
            return;
        },
        Err(AdmitError::DuplicateId) => {
            reject_upgrade(
                &mut ws_sender,
                ErrorCode::BadRequest,
                "clientId already in use in this room",
            )
            .await;
            return;
        },
    };

    let _guard = ConnectionGuard::new(Arc::clone(&state.connection_count));

    router::broadcast_peer_event(&existing, &client_id, true).await;
    tracing::info!(room = %room, client_id = %client_id, "member joined");

    let writer_cancel = member_cancel.clone();
    let mut writer = tokio::spawn(async move {
        loop {
            // `biased` so a pending control frame is always flushed ahead of
            // both ordinary data and a cancellation that raced in alongside
            // it — relay_frame enqueues the `slow_consumer` notice and then
            // cancels the member, and that notice must not lose the race.
            tokio::select! {
                biased;
                maybe = control_rx.recv() => {
                    match maybe {
                        Some(msg) if ws_sender.send(msg).await.is_ok() => {},
                        _ => break,
                    }
                }
                _ = writer_cancel.cancelled() => break,
                maybe = rx.recv() => {
                    match maybe {
                        Some(msg) if ws_sender.send(msg).await.is_ok() => {},
                        _ => break,
                    }
                }
            }
        }
        let _ = ws_sender.close().await;
    });

    read_loop(
        &mut ws_receiver,
        &state,
        &room,
        &client_id,
        &member_cancel,
        &control_tx_self,
    )
    .await;

    member_cancel.cancel();
    if tokio::time::timeout(WRITER_SHUTDOWN_GRACE, &mut writer).await.is_err() {
        tracing::warn!(room, client_id, "writer task exceeded shutdown grace period, aborting");
        writer.abort();
    }

    let remaining = state.registry.remove(&room, &client_id).await;
    router::broadcast_peer_event(&remaining, &client_id, false).await;
    tracing::info!(room = %room, client_id = %client_id, "member left");
}

/// Reads frames for one member until the socket closes, an unrecoverable
/// protocol violation occurs, or the member is cancelled from outside
/// (slow-consumer kill, idle sweep, shutdown). Every admitted frame passes
/// through the rate limiter before reaching the router.
async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    room: &str,
    client_id: &str,
    member_cancel: &tokio_util::sync::CancellationToken,
    control_tx: &mpsc::Sender<Message>,
) {
    let max_frame = state.config.limits.max_frame_size_bytes;
    let mut limiter = SlidingWindowLimiter::new(
        state.config.limits.rate_limit_count,
        Duration::from_secs(state.config.limits.rate_limit_window_secs),
    );

    loop {
        tokio::select! {
            _ = member_cancel.cancelled() => break,
            next = ws_receiver.next() => {
                match next {
                    None | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(msg)) if is_relayable(&msg) => {
                        if frame_len(&msg) > max_frame {
                            tracing::warn!(room, client_id, "oversized frame, closing connection");
                            let _ = control_tx.try_send(router::error_message(
                                ErrorCode::BadRequest,
                                "frame exceeds the configured maximum size",
                            ));
                            break;
                        }
                        if !limiter.try_admit(Instant::now()) {
                            let _ = control_tx.try_send(router::error_message(
                                ErrorCode::RateLimited,
                                "rate limit exceeded",
                            ));
                            continue;
                        }
                        router::relay_frame(&state.registry, room, client_id, msg).await;
                    }
                    Some(Ok(_)) => continue, // ping/pong: handled by the ws layer, not routed
                    Some(Err(e)) => {
                        tracing::debug!(room, client_id, error = %e, "read error, closing");
                        break;
                    }
                }
            }
        }
    }
}

fn is_relayable(msg: &Message) -> bool {
    matches!(msg, Message::Text(_) | Message::Binary(_))
}

fn frame_len(msg: &Message) -> usize {
    match msg {
        Message::Text(t) => t.len(),
        Message::Binary(b) => b.len(),
        _ => 0,
    }
}

/// Send a terminal `error` envelope as the first and only frame, then close
/// the socket. Used for every rejection that happens before a member is
/// admitted to a room (bad request, auth failure, room full).
async fn reject_upgrade(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    code: ErrorCode,
    message: &str,
) {
    let _ = sender.send(router::error_message(code, message)).await;
    let _ = sender.close().await;
}
