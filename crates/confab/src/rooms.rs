//! The room registry: hands out rooms by id, enforcing option
//! consistency, and releases them.

use std::collections::HashMap;
use std::sync::Arc;

use confab_protocol::{ErrorCode, ErrorInfo};
use confab_realtime::RealtimeClient;
use tokio::sync::Mutex;

use crate::{Room, RoomOptions};

/// Tracks every live room for one client.
///
/// A room id maps to at most one live [`Room`]; requesting it again
/// returns the same instance. The room's options are part of that
/// identity — a second `get` with different options is refused rather
/// than silently reconfiguring a room another caller already holds.
pub struct Rooms<R: RealtimeClient> {
    client: Arc<R>,
    rooms: Mutex<HashMap<String, Arc<Room<R>>>>,
}

impl<R: RealtimeClient> Rooms<R> {
    pub(crate) fn new(client: Arc<R>) -> Self {
        Self {
            client,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Gets or creates the room with the given id.
    ///
    /// # Errors
    /// Returns `inconsistentRoomOptions` when the room already exists
    /// with different options.
    pub async fn get(
        &self,
        room_id: &str,
        options: RoomOptions,
    ) -> Result<Arc<Room<R>>, ErrorInfo> {
        let mut rooms = self.rooms.lock().await;
        if let Some(existing) = rooms.get(room_id) {
            if *existing.options() != options {
                return Err(ErrorInfo::from_code(
                    ErrorCode::InconsistentRoomOptions,
                ));
            }
            return Ok(Arc::clone(existing));
        }

        let room = Arc::new(Room::new(
            self.client.as_ref(),
            room_id.to_string(),
            options,
        ));
        rooms.insert(room_id.to_string(), Arc::clone(&room));
        tracing::info!(%room_id, "room created");
        Ok(room)
    }

    /// Releases the room with the given id and forgets it.
    ///
    /// A subsequent [`get`](Self::get) creates a fresh room. Releasing
    /// an unknown id is a no-op.
    pub async fn release(&self, room_id: &str) {
        let room = self.rooms.lock().await.remove(room_id);
        if let Some(room) = room {
            room.release().await;
            tracing::info!(%room_id, "room released");
        }
    }

    /// Number of live rooms.
    pub async fn len(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Whether no rooms are live.
    pub async fn is_empty(&self) -> bool {
        self.rooms.lock().await.is_empty()
    }
}
