//! The messages facade: sending and receiving chat messages on the
//! room's chat channel.

use std::sync::Arc;

use confab_events::{BufferingPolicy, Subscription};
use confab_protocol::{ChatMessage, ErrorInfo};
use confab_realtime::{ChannelMessage, ChannelMessaging};

use crate::MESSAGE_EVENT_NAME;

/// Sends and receives chat messages.
pub struct Messages<C> {
    channel: Arc<C>,
}

impl<C: ChannelMessaging> Messages<C> {
    pub fn new(channel: Arc<C>) -> Self {
        Self { channel }
    }

    /// The channel this facade publishes on.
    pub fn channel_name(&self) -> &str {
        self.channel.name()
    }

    /// Publishes a chat message.
    pub async fn send(
        &self,
        text: impl Into<String>,
    ) -> Result<(), ErrorInfo> {
        let data = serde_json::json!({ "text": text.into() });
        self.channel.publish(MESSAGE_EVENT_NAME, data).await
    }

    /// Publishes a chat message with attached metadata.
    pub async fn send_with_metadata(
        &self,
        text: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Result<(), ErrorInfo> {
        let data = serde_json::json!({
            "text": text.into(),
            "metadata": metadata,
        });
        self.channel.publish(MESSAGE_EVENT_NAME, data).await
    }

    /// Subscribes to chat messages received on the channel.
    pub fn subscribe(
        &self,
        policy: BufferingPolicy,
    ) -> MessagesSubscription {
        MessagesSubscription {
            inner: self.channel.subscribe_messages(policy),
        }
    }
}

/// A lazy sequence of decoded chat messages.
///
/// Non-message events on the shared channel (reactions, occupancy
/// metadata) are skipped; malformed payloads are logged and skipped.
pub struct MessagesSubscription {
    inner: Subscription<ChannelMessage>,
}

impl MessagesSubscription {
    pub async fn next(&mut self) -> Option<ChatMessage> {
        loop {
            let message = self.inner.next().await?;
            if message.event != MESSAGE_EVENT_NAME {
                continue;
            }
            match decode(message) {
                Some(chat) => return Some(chat),
                None => {
                    tracing::warn!(
                        "dropping malformed chat message payload"
                    );
                }
            }
        }
    }

    pub fn unsubscribe(&mut self) {
        self.inner.unsubscribe();
    }
}

fn decode(message: ChannelMessage) -> Option<ChatMessage> {
    let text = message.data.get("text")?.as_str()?.to_string();
    Some(ChatMessage {
        client_id: message.client_id,
        text,
        timestamp: message.timestamp,
        metadata: message.data.get("metadata").cloned(),
    })
}

// =========================================================================
// Tests
// =========================================================================
