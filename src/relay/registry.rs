use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use axum::extract::ws::Utf8Bytes;
use parking_lot::RwLock;
use tokio::{sync::mpsc, time::Instant};
use uuid::Uuid;

use crate::{rooms::ChatMessage, RelayError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{}", self.0.simple())
    }
}

/// Enqueue side of one live connection. The session owning the socket holds
/// the receiving end; once it is gone every `deliver` fails.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Utf8Bytes>,
}

impl ConnectionHandle {
    pub fn new(queue: usize) -> (Self, mpsc::Receiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::channel(queue);
        (Self { id: ConnectionId::new(), tx }, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Waits for queue space; a stalled reader stalls this call.
    pub async fn deliver(&self, frame: Utf8Bytes) -> Result<(), RelayError> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| RelayError::DeliveryFailure(self.id))
    }
}

struct RoomActivity {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    last_activity: Instant,
}

impl RoomActivity {
    fn new(now: Instant) -> Self {
        Self {
            connections: HashMap::new(),
            last_activity: now,
        }
    }

    fn touch(&mut self, now: Instant) {
        self.last_activity = self.last_activity.max(now);
    }

    fn is_idle(&self, now: Instant, threshold: Duration) -> bool {
        self.connections.is_empty() && now.saturating_duration_since(self.last_activity) > threshold
    }
}

#[derive(Default)]
struct Rooms {
    by_room: HashMap<String, RoomActivity>,
    /// Which room each joined connection currently sits in.
    by_connection: HashMap<ConnectionId, String>,
}

/// Live connections per room plus per-room activity tracking.
///
/// Everything sits behind one reader/writer lock. Guards are never held
/// across an `.await`: fan-out copies the room's handles out under the read
/// lock and enqueues after releasing it.
pub struct Registry {
    rooms: RwLock<Rooms>,
    idle_threshold: Duration,
    send_queue: usize,
}

impl Registry {
    pub fn new(idle_threshold: Duration, send_queue: usize) -> Self {
        Self {
            rooms: RwLock::new(Rooms::default()),
            idle_threshold,
            send_queue,
        }
    }

    /// Fresh handle sized to this registry's queue depth.
    pub fn connection(&self) -> (ConnectionHandle, mpsc::Receiver<Utf8Bytes>) {
        ConnectionHandle::new(self.send_queue)
    }

    /// Adds `handle` to `room_id`, moving it out of any room it was in.
    pub fn join(&self, room_id: &str, handle: ConnectionHandle) {
        let now = Instant::now();
        let mut rooms = self.rooms.write();
        let id = handle.id();

        if let Some(previous) = rooms.by_connection.insert(id, room_id.to_owned()) {
            if previous != room_id {
                if let Some(room) = rooms.by_room.get_mut(&previous) {
                    room.connections.remove(&id);
                    room.touch(now);
                }
            }
        }

        let room = rooms
            .by_room
            .entry(room_id.to_owned())
            .or_insert_with(|| RoomActivity::new(now));
        room.connections.insert(id, handle);
        room.touch(now);

        tracing::debug!(room_id, connection = %id, connections = room.connections.len(), "joined");
    }

    /// Removes the connection from `room_id`. Leaving twice is harmless.
    pub fn leave(&self, room_id: &str, id: ConnectionId) {
        let now = Instant::now();
        let mut rooms = self.rooms.write();

        if rooms.by_connection.get(&id).is_some_and(|r| r == room_id) {
            rooms.by_connection.remove(&id);
        }

        if let Some(room) = rooms.by_room.get_mut(room_id) {
            let removed = room.connections.remove(&id).is_some();
            room.touch(now);
            if removed {
                tracing::debug!(room_id, connection = %id, connections = room.connections.len(), "left");
            }
        }
    }

    /// Marks activity without changing membership.
    pub fn touch(&self, room_id: &str) {
        let now = Instant::now();
        self.rooms
            .write()
            .by_room
            .entry(room_id.to_owned())
            .or_insert_with(|| RoomActivity::new(now))
            .touch(now);
    }

    pub fn has_activity(&self, room_id: &str) -> bool {
        let now = Instant::now();
        let rooms = self.rooms.read();
        let Some(room) = rooms.by_room.get(room_id) else {
            return false;
        };

        !room.connections.is_empty()
            || now.saturating_duration_since(room.last_activity) < self.idle_threshold
    }

    fn snapshot(&self, room_id: &str) -> Vec<ConnectionHandle> {
        self.rooms
            .read()
            .by_room
            .get(room_id)
            .map(|room| room.connections.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Sends `msg` to every connection in `room_id` as of the call. Failed
    /// deliveries are logged and skipped. Returns how many were enqueued.
    pub async fn broadcast(&self, room_id: &str, msg: &ChatMessage) -> Result<usize, RelayError> {
        let handles = self.snapshot(room_id);
        if handles.is_empty() {
            return Ok(0);
        }

        let frame = Utf8Bytes::from(serde_json::to_string(msg)?);
        let mut delivered = 0;
        for handle in &handles {
            match handle.deliver(frame.clone()).await {
                Ok(()) => delivered += 1,
                Err(err) => tracing::warn!(room_id, error = %err, "broadcast delivery failed"),
            }
        }

        tracing::trace!(room_id, delivered, targets = handles.len(), "broadcast");
        Ok(delivered)
    }

    /// Drops every room that has no connections and has been quiet for
    /// longer than the idle threshold. Returns the evicted room ids.
    pub fn reap_idle(&self) -> Vec<String> {
        let now = Instant::now();
        let mut rooms = self.rooms.write();

        let idle: Vec<String> = rooms
            .by_room
            .iter()
            .filter(|(_, room)| room.is_idle(now, self.idle_threshold))
            .map(|(room_id, _)| room_id.clone())
            .collect();

        for room_id in &idle {
            rooms.by_room.remove(room_id);
        }
        idle
    }

    pub fn connection_count(&self, room_id: &str) -> usize {
        self.rooms
            .read()
            .by_room
            .get(room_id)
            .map_or(0, |room| room.connections.len())
    }

    pub fn is_tracked(&self, room_id: &str) -> bool {
        self.rooms.read().by_room.contains_key(room_id)
    }
}

/// Membership of one connection in one room, released on drop.
pub struct Membership {
    registry: Arc<Registry>,
    room_id: String,
    id: ConnectionId,
}

impl Membership {
    pub fn join(registry: Arc<Registry>, room_id: &str, handle: ConnectionHandle) -> Self {
        let id = handle.id();
        registry.join(room_id, handle);
        Self {
            registry,
            room_id: room_id.to_owned(),
            id,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.registry.leave(&self.room_id, self.id);
    }
}
