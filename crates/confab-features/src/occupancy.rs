//! The occupancy facade: connection and presence counts for the room.
//!
//! The transport periodically publishes occupancy metrics as metadata
//! events on the chat channel. The facade decodes them for subscribers
//! and keeps the latest reading for [`Occupancy::current`].

use std::sync::{Arc, Mutex};

use confab_events::{BufferingPolicy, Subscription};
use confab_protocol::OccupancyMetrics;
use confab_realtime::{ChannelMessage, ChannelMessaging};
use tokio::task::JoinHandle;

use crate::OCCUPANCY_EVENT_NAME;

/// Observes channel occupancy metrics.
pub struct Occupancy<C> {
    channel: Arc<C>,
    latest: Arc<Mutex<Option<OccupancyMetrics>>>,
    tracker: JoinHandle<()>,
}

impl<C: ChannelMessaging> Occupancy<C> {
    pub fn new(channel: Arc<C>) -> Self {
        let latest = Arc::new(Mutex::new(None));
        // Only the newest reading matters, so the tracker's queue keeps
        // a single event.
        let mut events =
            channel.subscribe_messages(BufferingPolicy::Bounded(1));
        let tracker = tokio::spawn({
            let latest = Arc::clone(&latest);
            async move {
                while let Some(message) = events.next().await {
                    if let Some(metrics) = decode(&message) {
                        *latest.lock().expect("occupancy lock poisoned") =
                            Some(metrics);
                    }
                }
            }
        });
        Self {
            channel,
            latest,
            tracker,
        }
    }

    /// The most recent metrics seen on the channel, if any arrived yet.
    pub fn current(&self) -> Option<OccupancyMetrics> {
        *self.latest.lock().expect("occupancy lock poisoned")
    }

    /// Subscribes to occupancy updates.
    pub fn subscribe(
        &self,
        policy: BufferingPolicy,
    ) -> OccupancySubscription {
        OccupancySubscription {
            inner: self.channel.subscribe_messages(policy),
        }
    }
}

impl<C> Drop for Occupancy<C> {
    fn drop(&mut self) {
        self.tracker.abort();
    }
}

/// A lazy sequence of occupancy readings.
pub struct OccupancySubscription {
    inner: Subscription<ChannelMessage>,
}

impl OccupancySubscription {
    pub async fn next(&mut self) -> Option<OccupancyMetrics> {
        loop {
            let message = self.inner.next().await?;
            if let Some(metrics) = decode(&message) {
                return Some(metrics);
            }
        }
    }

    pub fn unsubscribe(&mut self) {
        self.inner.unsubscribe();
    }
}

fn decode(message: &ChannelMessage) -> Option<OccupancyMetrics> {
    if message.event != OCCUPANCY_EVENT_NAME {
        return None;
    }
    serde_json::from_value(message.data.get("metrics")?.clone()).ok()
}

// =========================================================================
// Tests
// =========================================================================
