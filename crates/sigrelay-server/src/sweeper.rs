use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::registry::Registry;
use crate::router;

/// Background task that periodically removes rooms idle beyond the TTL.
/// Takes the registry's write lock only long enough to detach the idle
/// rooms; member cancellation and `peer_left` emission happen outside it.
pub fn spawn_idle_sweeper(
    registry: Arc<Registry>,
    interval: Duration,
    ttl: Duration,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("idle sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let swept = registry.sweep_idle(std::time::Instant::now(), ttl).await;
                    if swept.is_empty() {
                        continue;
                    }
                    for room in &swept {
                        tracing::info!(room = %room.code, members = room.members.len(), "sweeping idle room");
                        // The room is already gone from the table, so there
                        // are no remaining members to notify: peer_left is
                        // suppressed here by construction (router::broadcast_peer_event
                        // would have nothing to broadcast to but the leaving
                        // member itself, which is about to be cancelled).
                        for member in &room.members {
                            router::reject_member(member, sigrelay_core::ErrorCode::Internal, "room swept for inactivity");
                        }
                        room.cancel.cancel();
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::registry::Registry;

    #[tokio::test]
    async fn sweeper_removes_idle_rooms_on_its_tick() {
        let registry = Arc::new(Registry::new());
        let parent = CancellationToken::new();
        let (tx, _rx) = mpsc::channel(4);
        let (control_tx, _control_rx) = mpsc::channel(4);
        registry
            .admit("stale", "A", "s", tx, control_tx, 4, &parent)
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        spawn_idle_sweeper(
            Arc::clone(&registry),
            Duration::from_millis(10),
            Duration::from_millis(0),
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(registry.room_count().await, 0);
        shutdown.cancel();
    }
}
