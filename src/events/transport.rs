use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;
use uuid::Uuid;

use crate::events::payloads::RoomEvent;

/// Real-time transport contract: the only operations the router needs are
/// joining a room and emitting to it. A cluster deployment plugs in a shared
/// backplane here; the in-process implementation below covers a single
/// process and the test suite.
///
/// Emission is best-effort by contract: `emit` never reports delivery
/// failures back to the caller.
pub trait Transport: Send + Sync {
    fn join_room(&self, client_id: Uuid, room: &str);
    fn emit(&self, room: &str, event: RoomEvent);
}

/// Per-room `tokio::sync::broadcast` fan-out. Each room's subscribers see
/// events in the publish order of a single publishing task; nothing is
/// guaranteed across rooms.
pub struct BroadcastTransport {
    buffer_size: usize,
    rooms: DashMap<String, broadcast::Sender<RoomEvent>>,
    memberships: DashMap<Uuid, Vec<String>>,
}

impl BroadcastTransport {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            rooms: DashMap::new(),
            memberships: DashMap::new(),
        }
    }

    fn room_sender(&self, room: &str) -> broadcast::Sender<RoomEvent> {
        self.rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer_size).0)
            .clone()
    }

    pub fn subscribe(&self, room: &str) -> broadcast::Receiver<RoomEvent> {
        self.room_sender(room).subscribe()
    }

    /// Stream view over a room, for consumers that prefer `Stream` to the
    /// raw receiver.
    pub fn stream(&self, room: &str) -> BroadcastStream<RoomEvent> {
        BroadcastStream::new(self.subscribe(room))
    }

    pub fn rooms_of(&self, client_id: Uuid) -> Vec<String> {
        self.memberships
            .get(&client_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

impl Transport for BroadcastTransport {
    fn join_room(&self, client_id: Uuid, room: &str) {
        self.room_sender(room);
        let mut joined = self.memberships.entry(client_id).or_default();
        if !joined.iter().any(|existing| existing == room) {
            joined.push(room.to_string());
        }
        debug!(client_id = %client_id, room, "client joined room");
    }

    fn emit(&self, room: &str, event: RoomEvent) {
        // A send error only means the room has no subscribers right now;
        // push events are a hint, the audit trail is the source of truth.
        let _ = self.room_sender(room).send(event);
    }
}
