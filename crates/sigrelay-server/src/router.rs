use axum::extract::ws::Message;
use sigrelay_core::{ErrorCode, ServerEnvelope, encode_server_envelope, time};

use crate::registry::{MemberHandle, Registry};

/// Fan out an opaque frame `F` received from `sender_id` in room `code` to
/// every other current member. Never parses `F`. Bumps the room's
/// `lastActivity`. Uses a non-blocking send per peer; a full or closed
/// outbound queue is treated as that peer's slow-consumer condition and
/// closes only that connection — fan-out to the rest continues.
///
/// The `slow_consumer` notice goes out on the member's `control` channel, not
/// the data channel that just overflowed — it has its own small bounded
/// capacity, so it isn't held hostage by the backlog that triggered it.
pub async fn relay_frame(registry: &Registry, code: &str, sender_id: &str, frame: Message) {
    registry.touch(code).await;
    let members = registry.members_of(code).await;
    for member in members.iter().filter(|m| &*m.client_id != sender_id) {
        if member.sender.try_send(frame.clone()).is_err() {
            tracing::warn!(
                room = code,
                client_id = %member.client_id,
                "outbound queue full or closed, closing slow consumer"
            );
            let _ = member
                .control
                .try_send(error_message(ErrorCode::SlowConsumer, "outbound queue overflow"));
            member.cancel.cancel();
        }
    }
}

/// Broadcast a `peer_joined` or `peer_left` server event to every member in
/// `targets`. Used by the connection handler on admission and teardown, and
/// by the sweeper (suppressed in practice once the room is already empty).
pub async fn broadcast_peer_event(targets: &[MemberHandle], peer_id: &str, joined: bool) {
    let ts = time::timestamp_now();
    let envelope = if joined {
        ServerEnvelope::peer_joined(peer_id, ts)
    } else {
        ServerEnvelope::peer_left(peer_id, ts)
    };
    let Ok(json) = encode_server_envelope(&envelope) else {
        tracing::error!("failed to encode peer event envelope");
        return;
    };
    for member in targets {
        if member.sender.try_send(Message::Text(json.clone().into())).is_err() {
            tracing::debug!(
                client_id = %member.client_id,
                "skipping peer event for a member whose queue is full or closed"
            );
        }
    }
}

/// Send a terminal `error` envelope to a single member, then close it. Goes
/// out on the `control` channel so it can't be starved by a backed-up data
/// queue; best-effort if even that is somehow full or closed.
pub fn reject_member(member: &MemberHandle, code: ErrorCode, message: &str) {
    let _ = member.control.try_send(error_message(code, message));
    member.cancel.cancel();
}

pub fn error_message(code: ErrorCode, message: &str) -> Message {
    let envelope = ServerEnvelope::error(code, message);
    match encode_server_envelope(&envelope) {
        Ok(json) => Message::Text(json.into()),
        Err(_) => Message::Text(r#"{"type":"error","senderId":"server","targetId":"*","payload":{"code":"internal","message":"encode failure"}}"#.into()),
    }
}
