//! In-memory channel implementation with scriptable outcomes.
//!
//! `MockRealtime` stands in for a transport in tests and demos. Attach
//! and detach consume queued [`MockOutcome`]s (defaulting to success),
//! and tests drive the state-change stream explicitly via
//! [`MockChannel::emit_state_change`] — the mock never emits events on
//! its own, so a test controls exactly which transitions the room
//! observes and when.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use confab_events::{Broadcaster, BufferingPolicy, Subscription};
use confab_protocol::{
    ErrorInfo, PresenceEvent, PresenceEventKind, PresenceMember,
};

use crate::{
    ChannelMessage, ChannelMessaging, ChannelPresence, ChannelState,
    ChannelStateChange, RealtimeChannel, RealtimeClient,
};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What the next attach/detach call on a [`MockChannel`] should do.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Succeed immediately.
    Success,

    /// Succeed after sleeping. Combine with paused tokio time to hold an
    /// operation "in progress" at a precise point.
    SuccessAfter(Duration),

    /// Fail, leaving the channel in `resulting_state` with the error as
    /// its `error_reason` snapshot.
    Failure {
        error: ErrorInfo,
        resulting_state: ChannelState,
    },
}

struct Inner {
    state: ChannelState,
    error_reason: Option<ErrorInfo>,
    attach_outcomes: VecDeque<MockOutcome>,
    detach_outcomes: VecDeque<MockOutcome>,
    presence_get_results: VecDeque<Result<Vec<PresenceMember>, ErrorInfo>>,
    members: Vec<PresenceMember>,
    published: Vec<ChannelMessage>,
    attach_calls: u64,
    detach_calls: u64,
    clock: u64,
}

// ---------------------------------------------------------------------------
// MockChannel
// ---------------------------------------------------------------------------

/// A scriptable in-memory channel.
pub struct MockChannel {
    name: String,
    client_id: String,
    inner: Mutex<Inner>,
    state_events: Broadcaster<ChannelStateChange>,
    messages: Broadcaster<ChannelMessage>,
    presence_events: Broadcaster<PresenceEvent>,
}

impl MockChannel {
    pub fn new(name: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client_id: client_id.into(),
            inner: Mutex::new(Inner {
                state: ChannelState::Initialized,
                error_reason: None,
                attach_outcomes: VecDeque::new(),
                detach_outcomes: VecDeque::new(),
                presence_get_results: VecDeque::new(),
                members: Vec::new(),
                published: Vec::new(),
                attach_calls: 0,
                detach_calls: 0,
                clock: 0,
            }),
            state_events: Broadcaster::new(),
            messages: Broadcaster::new(),
            presence_events: Broadcaster::new(),
        }
    }

    // -- Scripting surface -------------------------------------------------

    /// Queues the outcome for a future attach call. Unqueued calls
    /// succeed.
    pub fn queue_attach_outcome(&self, outcome: MockOutcome) {
        self.lock().attach_outcomes.push_back(outcome);
    }

    /// Queues the outcome for a future detach call. Unqueued calls
    /// succeed.
    pub fn queue_detach_outcome(&self, outcome: MockOutcome) {
        self.lock().detach_outcomes.push_back(outcome);
    }

    /// Queues the result of a future `presence_get`. Unqueued calls
    /// return the current member set.
    pub fn queue_presence_get_result(
        &self,
        result: Result<Vec<PresenceMember>, ErrorInfo>,
    ) {
        self.lock().presence_get_results.push_back(result);
    }

    /// Overwrites the state/error snapshot without emitting an event.
    pub fn set_state(
        &self,
        state: ChannelState,
        error_reason: Option<ErrorInfo>,
    ) {
        let mut inner = self.lock();
        inner.state = state;
        inner.error_reason = error_reason;
    }

    /// Pushes a state change to subscribers, updating the snapshot to
    /// match `change.current` / `change.reason`.
    pub fn emit_state_change(&self, change: ChannelStateChange) {
        {
            let mut inner = self.lock();
            inner.state = change.current;
            if change.reason.is_some() {
                inner.error_reason = change.reason.clone();
            }
        }
        self.state_events.emit(change);
    }

    /// Delivers an inbound message to subscribers, as if another client
    /// published it.
    pub fn deliver_message(&self, message: ChannelMessage) {
        self.messages.emit(message);
    }

    /// Delivers an inbound presence event, adjusting the member set.
    pub fn deliver_presence_event(&self, event: PresenceEvent) {
        self.apply_presence(&event);
        self.presence_events.emit(event);
    }

    // -- Inspection surface ------------------------------------------------

    /// Everything published on this channel so far.
    pub fn published(&self) -> Vec<ChannelMessage> {
        self.lock().published.clone()
    }

    /// How many times attach was called.
    pub fn attach_calls(&self) -> u64 {
        self.lock().attach_calls
    }

    /// How many times detach was called.
    pub fn detach_calls(&self) -> u64 {
        self.lock().detach_calls
    }

    /// The current presence member set.
    pub fn members(&self) -> Vec<PresenceMember> {
        self.lock().members.clone()
    }

    // -- Internals ---------------------------------------------------------

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("mock channel lock poisoned")
    }

    fn apply_presence(&self, event: &PresenceEvent) {
        let mut inner = self.lock();
        inner
            .members
            .retain(|m| m.client_id != event.member.client_id);
        match event.kind {
            PresenceEventKind::Enter | PresenceEventKind::Update => {
                inner.members.push(event.member.clone());
            }
            PresenceEventKind::Leave => {}
        }
    }

    async fn run_outcome(
        &self,
        outcome: MockOutcome,
        success_state: ChannelState,
    ) -> Result<(), ErrorInfo> {
        match outcome {
            MockOutcome::Success => {
                self.set_state(success_state, None);
                Ok(())
            }
            MockOutcome::SuccessAfter(delay) => {
                tokio::time::sleep(delay).await;
                self.set_state(success_state, None);
                Ok(())
            }
            MockOutcome::Failure {
                error,
                resulting_state,
            } => {
                self.set_state(resulting_state, Some(error.clone()));
                Err(error)
            }
        }
    }
}

impl RealtimeChannel for MockChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    async fn attach(&self) -> Result<(), ErrorInfo> {
        let outcome = {
            let mut inner = self.lock();
            inner.attach_calls += 1;
            inner
                .attach_outcomes
                .pop_front()
                .unwrap_or(MockOutcome::Success)
        };
        self.run_outcome(outcome, ChannelState::Attached).await
    }

    async fn detach(&self) -> Result<(), ErrorInfo> {
        let outcome = {
            let mut inner = self.lock();
            inner.detach_calls += 1;
            inner
                .detach_outcomes
                .pop_front()
                .unwrap_or(MockOutcome::Success)
        };
        self.run_outcome(outcome, ChannelState::Detached).await
    }

    fn state(&self) -> ChannelState {
        self.lock().state
    }

    fn error_reason(&self) -> Option<ErrorInfo> {
        self.lock().error_reason.clone()
    }

    fn subscribe_state(&self) -> Subscription<ChannelStateChange> {
        self.state_events.subscribe(BufferingPolicy::Unbounded)
    }
}

impl ChannelMessaging for MockChannel {
    async fn publish(
        &self,
        event: &str,
        data: serde_json::Value,
    ) -> Result<(), ErrorInfo> {
        let message = {
            let mut inner = self.lock();
            inner.clock += 1;
            let message = ChannelMessage {
                event: event.to_string(),
                client_id: self.client_id.clone(),
                timestamp: inner.clock,
                data,
            };
            inner.published.push(message.clone());
            message
        };
        // Loopback: the publisher's own subscribers see the message too.
        self.messages.emit(message);
        Ok(())
    }

    fn subscribe_messages(
        &self,
        policy: BufferingPolicy,
    ) -> Subscription<ChannelMessage> {
        self.messages.subscribe(policy)
    }
}

impl ChannelPresence for MockChannel {
    async fn presence_enter(
        &self,
        data: Option<serde_json::Value>,
    ) -> Result<(), ErrorInfo> {
        let event = PresenceEvent {
            kind: PresenceEventKind::Enter,
            member: PresenceMember {
                client_id: self.client_id.clone(),
                data,
            },
        };
        self.deliver_presence_event(event);
        Ok(())
    }

    async fn presence_update(
        &self,
        data: Option<serde_json::Value>,
    ) -> Result<(), ErrorInfo> {
        let event = PresenceEvent {
            kind: PresenceEventKind::Update,
            member: PresenceMember {
                client_id: self.client_id.clone(),
                data,
            },
        };
        self.deliver_presence_event(event);
        Ok(())
    }

    async fn presence_leave(&self) -> Result<(), ErrorInfo> {
        let event = PresenceEvent {
            kind: PresenceEventKind::Leave,
            member: PresenceMember {
                client_id: self.client_id.clone(),
                data: None,
            },
        };
        self.deliver_presence_event(event);
        Ok(())
    }

    async fn presence_get(&self) -> Result<Vec<PresenceMember>, ErrorInfo> {
        let queued = self.lock().presence_get_results.pop_front();
        match queued {
            Some(result) => result,
            None => Ok(self.members()),
        }
    }

    fn subscribe_presence(
        &self,
        policy: BufferingPolicy,
    ) -> Subscription<PresenceEvent> {
        self.presence_events.subscribe(policy)
    }
}

// ---------------------------------------------------------------------------
// MockRealtime
// ---------------------------------------------------------------------------

/// A transport stand-in that vends [`MockChannel`]s by name.
///
/// Channels are cached: requesting the same name twice returns the same
/// channel, matching the [`RealtimeClient`] contract.
pub struct MockRealtime {
    client_id: String,
    channels: Mutex<HashMap<String, Arc<MockChannel>>>,
}

impl MockRealtime {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            channels: Mutex::new(HashMap::new()),
        }
    }
}

impl RealtimeClient for MockRealtime {
    type Channel = MockChannel;

    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn channel(&self, name: &str) -> Arc<MockChannel> {
        let mut channels =
            self.channels.lock().expect("mock client lock poisoned");
        Arc::clone(channels.entry(name.to_string()).or_insert_with(|| {
            Arc::new(MockChannel::new(name, self.client_id.clone()))
        }))
    }
}
