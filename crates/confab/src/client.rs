//! The SDK entry point: a chat client over a realtime connection.

use std::sync::Arc;

use confab_realtime::RealtimeClient;

use crate::Rooms;

/// A chat client bound to one realtime connection.
///
/// The client owns the room registry; everything else hangs off the
/// rooms it hands out.
pub struct ConfabClient<R: RealtimeClient> {
    realtime: Arc<R>,
    rooms: Rooms<R>,
}

impl<R: RealtimeClient> ConfabClient<R> {
    pub fn new(realtime: Arc<R>) -> Self {
        let rooms = Rooms::new(Arc::clone(&realtime));
        Self { realtime, rooms }
    }

    /// The identity this connection publishes under.
    pub fn client_id(&self) -> &str {
        self.realtime.client_id()
    }

    /// The room registry.
    pub fn rooms(&self) -> &Rooms<R> {
        &self.rooms
    }
}
