//! The typing-indicators facade.
//!
//! Typing state rides on presence on the room's dedicated typing
//! channel: `start()` enters presence there and arms a debounce timer
//! that auto-stops typing if no further `start()` arrives in time;
//! `stop()` leaves presence and disarms the timer. The currently-typing
//! set is read through `presence_get`, wrapped in a bounded retry
//! envelope because the transport rejects presence reads during brief
//! re-attachment windows.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use confab_events::{BufferingPolicy, Subscription};
use confab_protocol::{
    ErrorInfo, PresenceEvent, PresenceEventKind, PresenceMember,
    RoomFeature,
};
use confab_realtime::ChannelPresence;
use confab_room::RoomLifecycleManager;
use rand::Rng;
use tokio::task::JoinHandle;

/// Ceiling on the total time spent retrying a typing presence read.
const GET_RETRY_MAX_TOTAL: Duration = Duration::from_secs(30);

/// First backoff delay; doubles per attempt.
const GET_RETRY_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Per-attempt backoff cap.
const GET_RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Tunables for the typing feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingOptions {
    /// How long after the last `start()` the typing indicator is
    /// automatically withdrawn.
    pub debounce: Duration,
}

impl Default for TypingOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// TypingIndicators
// ---------------------------------------------------------------------------

struct TypingShared<C: ChannelPresence> {
    manager: Arc<RoomLifecycleManager<C>>,
    channel: Arc<C>,
    options: TypingOptions,
    /// The armed auto-stop timer, if this client is currently typing.
    stop_task: Mutex<Option<JoinHandle<()>>>,
}

/// Start/stop typing and observe who is typing.
pub struct TypingIndicators<C: ChannelPresence> {
    shared: Arc<TypingShared<C>>,
}

impl<C: ChannelPresence> Clone for TypingIndicators<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: ChannelPresence> TypingIndicators<C> {
    pub fn new(
        manager: Arc<RoomLifecycleManager<C>>,
        channel: Arc<C>,
        options: TypingOptions,
    ) -> Self {
        Self {
            shared: Arc::new(TypingShared {
                manager,
                channel,
                options,
                stop_task: Mutex::new(None),
            }),
        }
    }

    /// Signals that this client is typing.
    ///
    /// The first call enters presence on the typing channel; repeated
    /// calls just re-arm the debounce timer. The indicator is withdrawn
    /// automatically once the timer lapses.
    pub async fn start(&self) -> Result<(), ErrorInfo> {
        self.gate().await?;

        let was_typing = {
            let mut stop_task = self
                .shared
                .stop_task
                .lock()
                .expect("typing lock poisoned");
            let was_typing = match stop_task.take() {
                Some(task) => {
                    task.abort();
                    true
                }
                None => false,
            };
            *stop_task = Some(tokio::spawn(auto_stop(
                Arc::clone(&self.shared),
            )));
            was_typing
        };

        if !was_typing {
            self.shared.channel.presence_enter(None).await?;
        }
        Ok(())
    }

    /// Withdraws this client's typing indicator immediately.
    pub async fn stop(&self) -> Result<(), ErrorInfo> {
        self.gate().await?;
        self.disarm();
        self.shared.channel.presence_leave().await
    }

    /// The set of client ids currently typing.
    pub async fn current(&self) -> Result<HashSet<String>, ErrorInfo> {
        self.gate().await?;
        let members =
            presence_get_with_retry(self.shared.channel.as_ref()).await?;
        Ok(members.into_iter().map(|m| m.client_id).collect())
    }

    /// Subscribes to changes of the currently-typing set.
    pub fn subscribe(&self, policy: BufferingPolicy) -> TypingSubscription {
        TypingSubscription {
            inner: self.shared.channel.subscribe_presence(policy),
            typing: HashSet::new(),
        }
    }

    fn disarm(&self) {
        if let Some(task) = self
            .shared
            .stop_task
            .lock()
            .expect("typing lock poisoned")
            .take()
        {
            task.abort();
        }
    }

    async fn gate(&self) -> Result<(), ErrorInfo> {
        self.shared
            .manager
            .wait_to_be_able_to_perform_presence_operations(
                RoomFeature::Typing,
            )
            .await
    }
}

/// Debounce expiry: withdraw the indicator and clear the armed timer.
async fn auto_stop<C: ChannelPresence>(shared: Arc<TypingShared<C>>) {
    tokio::time::sleep(shared.options.debounce).await;
    shared
        .stop_task
        .lock()
        .expect("typing lock poisoned")
        .take();
    if let Err(error) = shared.channel.presence_leave().await {
        tracing::warn!(
            channel = shared.channel.name(),
            %error,
            "typing auto-stop failed to leave presence"
        );
    }
}

/// Presence read under the typing retry envelope: exponential backoff
/// from 1 s capped at 5 s per attempt, full jitter over the back half
/// of each delay, giving up after 30 s total.
async fn presence_get_with_retry<C: ChannelPresence>(
    channel: &C,
) -> Result<Vec<PresenceMember>, ErrorInfo> {
    let started = tokio::time::Instant::now();
    let mut delay = GET_RETRY_INITIAL_DELAY;
    loop {
        match channel.presence_get().await {
            Ok(members) => return Ok(members),
            Err(error) => {
                if started.elapsed() >= GET_RETRY_MAX_TOTAL {
                    return Err(error);
                }
                let jitter =
                    delay.mul_f64(0.5 * rand::rng().random::<f64>());
                let backoff = delay / 2 + jitter;
                tracing::warn!(
                    channel = channel.name(),
                    %error,
                    backoff_ms = backoff.as_millis() as u64,
                    "typing presence read failed; backing off"
                );
                tokio::time::sleep(backoff).await;
                delay = (delay * 2).min(GET_RETRY_MAX_DELAY);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A change to the currently-typing set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingEvent {
    /// Everyone typing after this change.
    pub currently_typing: HashSet<String>,
}

/// Folds the typing channel's presence stream into typing-set changes.
pub struct TypingSubscription {
    inner: Subscription<PresenceEvent>,
    typing: HashSet<String>,
}

impl TypingSubscription {
    pub async fn next(&mut self) -> Option<TypingEvent> {
        let event = self.inner.next().await?;
        match event.kind {
            PresenceEventKind::Enter | PresenceEventKind::Update => {
                self.typing.insert(event.member.client_id);
            }
            PresenceEventKind::Leave => {
                self.typing.remove(&event.member.client_id);
            }
        }
        Some(TypingEvent {
            currently_typing: self.typing.clone(),
        })
    }

    pub fn unsubscribe(&mut self) {
        self.inner.unsubscribe();
    }
}

// =========================================================================
// Tests
// =========================================================================
