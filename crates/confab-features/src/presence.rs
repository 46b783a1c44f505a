//! The presence facade: who is in the room.
//!
//! Presence operations are valid only on an attached room, so every
//! call here first passes the manager's presence-readiness gate. The
//! gate's three outcomes (proceed, fail-while-attaching, fail-elsewhere)
//! are the only way this facade observes the attaching/attached
//! boundary — it never polls the status.

use std::sync::Arc;

use confab_events::{BufferingPolicy, Subscription};
use confab_protocol::{ErrorInfo, PresenceEvent, PresenceMember, RoomFeature};
use confab_realtime::ChannelPresence;
use confab_room::RoomLifecycleManager;

/// Presence enter/update/leave/get on the room.
pub struct RoomPresence<C: ChannelPresence> {
    manager: Arc<RoomLifecycleManager<C>>,
    channel: Arc<C>,
    default_enter_data: Option<serde_json::Value>,
}

impl<C: ChannelPresence> RoomPresence<C> {
    pub fn new(
        manager: Arc<RoomLifecycleManager<C>>,
        channel: Arc<C>,
    ) -> Self {
        Self {
            manager,
            channel,
            default_enter_data: None,
        }
    }

    /// Data to attach on [`enter`](Self::enter) when the caller supplies
    /// none.
    pub fn with_default_enter_data(
        mut self,
        data: serde_json::Value,
    ) -> Self {
        self.default_enter_data = Some(data);
        self
    }

    /// Enters room presence under this connection's client id.
    pub async fn enter(
        &self,
        data: Option<serde_json::Value>,
    ) -> Result<(), ErrorInfo> {
        self.gate().await?;
        let data = data.or_else(|| self.default_enter_data.clone());
        self.channel.presence_enter(data).await
    }

    /// Updates this connection's presence data.
    pub async fn update(
        &self,
        data: Option<serde_json::Value>,
    ) -> Result<(), ErrorInfo> {
        self.gate().await?;
        self.channel.presence_update(data).await
    }

    /// Leaves room presence.
    pub async fn leave(&self) -> Result<(), ErrorInfo> {
        self.gate().await?;
        self.channel.presence_leave().await
    }

    /// Fetches the current presence set.
    pub async fn get(&self) -> Result<Vec<PresenceMember>, ErrorInfo> {
        self.gate().await?;
        self.channel.presence_get().await
    }

    /// Whether the given client is currently present.
    pub async fn is_present(
        &self,
        client_id: &str,
    ) -> Result<bool, ErrorInfo> {
        Ok(self
            .get()
            .await?
            .iter()
            .any(|member| member.client_id == client_id))
    }

    /// Subscribes to presence transitions. Subscribing does not require
    /// the room to be attached; events flow once it is.
    pub fn subscribe(
        &self,
        policy: BufferingPolicy,
    ) -> Subscription<PresenceEvent> {
        self.channel.subscribe_presence(policy)
    }

    async fn gate(&self) -> Result<(), ErrorInfo> {
        self.manager
            .wait_to_be_able_to_perform_presence_operations(
                RoomFeature::Presence,
            )
            .await
    }
}

// =========================================================================
// Tests
// =========================================================================
