//! The room-reactions facade: ephemeral, room-level reactions published
//! on the chat channel.

use std::sync::Arc;

use confab_events::{BufferingPolicy, Subscription};
use confab_protocol::{ErrorInfo, RoomReaction};
use confab_realtime::{ChannelMessage, ChannelMessaging};

use crate::REACTION_EVENT_NAME;

/// Sends and receives room reactions.
pub struct Reactions<C> {
    channel: Arc<C>,
}

impl<C: ChannelMessaging> Reactions<C> {
    pub fn new(channel: Arc<C>) -> Self {
        Self { channel }
    }

    /// Publishes a reaction of the given kind (e.g. `"like"`).
    pub async fn send(
        &self,
        kind: impl Into<String>,
    ) -> Result<(), ErrorInfo> {
        let data = serde_json::json!({ "type": kind.into() });
        self.channel.publish(REACTION_EVENT_NAME, data).await
    }

    /// Subscribes to reactions received on the channel. Reactions are
    /// fire-and-forget, so a bounded policy is the natural fit here.
    pub fn subscribe(
        &self,
        policy: BufferingPolicy,
    ) -> ReactionsSubscription {
        ReactionsSubscription {
            inner: self.channel.subscribe_messages(policy),
        }
    }
}

/// A lazy sequence of decoded room reactions.
pub struct ReactionsSubscription {
    inner: Subscription<ChannelMessage>,
}

impl ReactionsSubscription {
    pub async fn next(&mut self) -> Option<RoomReaction> {
        loop {
            let message = self.inner.next().await?;
            if message.event != REACTION_EVENT_NAME {
                continue;
            }
            match decode(message) {
                Some(reaction) => return Some(reaction),
                None => {
                    tracing::warn!("dropping malformed reaction payload");
                }
            }
        }
    }

    pub fn unsubscribe(&mut self) {
        self.inner.unsubscribe();
    }
}

fn decode(message: ChannelMessage) -> Option<RoomReaction> {
    let kind = message.data.get("type")?.as_str()?.to_string();
    Some(RoomReaction {
        kind,
        client_id: message.client_id,
        metadata: message.data.get("metadata").cloned(),
    })
}

// =========================================================================
// Tests
// =========================================================================
