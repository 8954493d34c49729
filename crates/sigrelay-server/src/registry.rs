use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::Message;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;

/// Per-room outbound channel to a member's write loop.
pub type OutboundSender = mpsc::Sender<Message>;

/// A live member of a room, as seen from the outside (snapshot, fan-out).
/// Cheap to clone: the sender is an mpsc handle and the strings are `Arc`s.
#[derive(Clone)]
pub struct MemberHandle {
    pub client_id: Arc<str>,
    pub subject: Arc<str>,
    pub joined_at: Instant,
    /// Relayed peer frames and `peer_joined`/`peer_left` events.
    pub sender: OutboundSender,
    /// Hub-authored error/control envelopes, on a channel of their own so a
    /// congested data queue can never starve delivery of the frame that
    /// explains why the connection is about to close.
    pub control: OutboundSender,
    pub cancel: CancellationToken,
}

struct RoomEntry {
    members: Vec<MemberHandle>,
    /// Locked separately from the table's `RwLock` so `touch` (called on
    /// every relayed frame) only needs a read lock on the table.
    last_activity: std::sync::Mutex<Instant>,
    cancel: CancellationToken,
}

impl RoomEntry {
    fn new(parent: &CancellationToken) -> Self {
        Self {
            members: Vec::new(),
            last_activity: std::sync::Mutex::new(Instant::now()),
            cancel: parent.child_token(),
        }
    }

    fn touch_now(&self) {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        let last = *self
            .last_activity
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        now.duration_since(last) >= ttl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitError {
    RoomFull,
    DuplicateId,
}

/// Result of a successful admission: the members that were already present
/// (for `peer_joined` emission) and the new member's own cancellation token,
/// a child of the room's token, to be raced in the connection's select loop.
pub struct AdmitOutcome {
    pub existing: Vec<MemberHandle>,
    pub member_cancel: CancellationToken,
}

/// A room the sweeper identified as idle, detached from the table so its
/// members can be cancelled outside the registry lock.
pub struct SweptRoom {
    pub code: String,
    pub members: Vec<MemberHandle>,
    pub cancel: CancellationToken,
}

/// Indexed set of rooms, the sole owner of room membership and activity
/// timestamps. Held behind a single lock; write-locked for admit/remove/
/// sweep, read-locked for snapshot/touch. Callers must release the lock
/// before writing to member queues (snapshot-then-write).
#[derive(Default)]
pub struct Registry {
    rooms: RwLock<HashMap<String, RoomEntry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Atomically create the room if absent, reject if full or the
    /// `client_id` is already present, otherwise append the member and
    /// bump `lastActivity`.
    pub async fn admit(
        &self,
        code: &str,
        client_id: &str,
        subject: &str,
        sender: OutboundSender,
        control: OutboundSender,
        capacity: usize,
        rooms_parent: &CancellationToken,
    ) -> Result<AdmitOutcome, AdmitError> {
        let mut rooms = self.rooms.write().await;
        let entry = rooms
            .entry(code.to_string())
            .or_insert_with(|| RoomEntry::new(rooms_parent));

        if entry.members.len() >= capacity {
            return Err(AdmitError::RoomFull);
        }
        if entry.members.iter().any(|m| &*m.client_id == client_id) {
            return Err(AdmitError::DuplicateId);
        }

        let existing = entry.members.clone();
        let member_cancel = entry.cancel.child_token();
        entry.members.push(MemberHandle {
            client_id: Arc::from(client_id),
            subject: Arc::from(subject),
            joined_at: Instant::now(),
            sender,
            control,
            cancel: member_cancel.clone(),
        });
        entry.touch_now();

        Ok(AdmitOutcome {
            existing,
            member_cancel,
        })
    }

    /// Remove a member. Idempotent: removing an absent member, or a member
    /// from an absent room, is a no-op. If the room becomes empty it is
    /// dropped immediately. Returns the snapshot of members remaining after
    /// removal (empty if the room is now gone), for `peer_left` emission.
    pub async fn remove(&self, code: &str, client_id: &str) -> Vec<MemberHandle> {
        let mut rooms = self.rooms.write().await;
        let Some(entry) = rooms.get_mut(code) else {
            return Vec::new();
        };
        entry.members.retain(|m| &*m.client_id != client_id);
        if entry.members.is_empty() {
            rooms.remove(code);
            Vec::new()
        } else {
            entry.members.clone()
        }
    }

    /// Point-in-time snapshot of a room's current members.
    pub async fn members_of(&self, code: &str) -> Vec<MemberHandle> {
        let rooms = self.rooms.read().await;
        rooms
            .get(code)
            .map(|e| e.members.clone())
            .unwrap_or_default()
    }

    /// Bump `lastActivity` without a membership change.
    pub async fn touch(&self, code: &str) {
        let rooms = self.rooms.read().await;
        if let Some(entry) = rooms.get(code) {
            entry.touch_now();
        }
    }

    /// Detach every room whose `lastActivity` is older than `now - ttl`
    /// (inclusive at the boundary). Closing member connections is the
    /// caller's job; this only removes the rooms from the table.
    pub async fn sweep_idle(&self, now: Instant, ttl: Duration) -> Vec<SweptRoom> {
        let mut rooms = self.rooms.write().await;
        let idle_codes: Vec<String> = rooms
            .iter()
            .filter(|(_, e)| e.is_idle(now, ttl))
            .map(|(code, _)| code.clone())
            .collect();

        idle_codes
            .into_iter()
            .filter_map(|code| {
                rooms.remove(&code).map(|entry| SweptRoom {
                    code,
                    members: entry.members,
                    cancel: entry.cancel,
                })
            })
            .collect()
    }

    /// Number of currently active rooms, for the `/health` endpoint.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
