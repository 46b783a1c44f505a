//! Realtime channel abstraction for Confab.
//!
//! Provides the traits that abstract over the realtime transport:
//!
//! - [`RealtimeChannel`] — one channel's lifecycle surface: attach,
//!   detach, state snapshots, and the state-change stream.
//! - [`ChannelMessaging`] — publish/subscribe of named events.
//! - [`ChannelPresence`] — presence enter/update/leave/get.
//! - [`RealtimeClient`] — hands out channels by name.
//!
//! The SDK never talks to a socket itself; a transport implements these
//! traits and the SDK coordinates on top of them. The
//! [`ContributorChannel`] adapter is the only view of a channel the room
//! lifecycle manager consumes.
//!
//! # Feature Flags
//!
//! - `mock` — an in-memory [`MockRealtime`](mock::MockRealtime) with
//!   scriptable attach/detach outcomes, for tests and demos.

#![allow(async_fn_in_trait)]

mod adapter;
#[cfg(feature = "mock")]
pub mod mock;

pub use adapter::ContributorChannel;

use std::fmt;
use std::sync::Arc;

use confab_events::{BufferingPolicy, Subscription};
use confab_protocol::{ErrorInfo, PresenceEvent, PresenceMember};

// ---------------------------------------------------------------------------
// Channel state
// ---------------------------------------------------------------------------

/// The lifecycle state of a single realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Initialized,
    Attaching,
    Attached,
    Detaching,
    Detached,
    Suspended,
    Failed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Initialized => "initialized",
            ChannelState::Attaching => "attaching",
            ChannelState::Attached => "attached",
            ChannelState::Detaching => "detaching",
            ChannelState::Detached => "detached",
            ChannelState::Suspended => "suspended",
            ChannelState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// The event kind announced alongside a channel state change.
///
/// Mostly mirrors the target state, with one extra: `Update`, emitted
/// when the channel re-synchronizes *without* changing state (the
/// `resumed` flag then says whether continuity was preserved).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    Attached,
    Detached,
    Attaching,
    Failed,
    Suspended,
    Update,
}

/// One entry in a channel's state-change stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStateChange {
    pub current: ChannelState,
    pub previous: ChannelState,
    pub event: ChannelEvent,

    /// `true` when the transport preserved message continuity across the
    /// transition; `false` marks a potential discontinuity.
    pub resumed: bool,

    /// The error that provoked the transition, if any.
    pub reason: Option<ErrorInfo>,
}

// ---------------------------------------------------------------------------
// Messages on a channel
// ---------------------------------------------------------------------------

/// A named event received on a channel, with the transport-asserted
/// identity of its publisher.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    /// The event name the publisher chose.
    pub event: String,

    /// Publisher identity, asserted by the transport.
    pub client_id: String,

    /// Server timestamp, milliseconds since the Unix epoch.
    pub timestamp: u64,

    /// The payload.
    pub data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// One realtime channel's lifecycle surface.
///
/// Implementations are shared behind `Arc` and must be safe to call from
/// any task.
pub trait RealtimeChannel: Send + Sync + 'static {
    /// The channel's fully qualified name.
    fn name(&self) -> &str;

    /// The identity this connection publishes under.
    fn client_id(&self) -> &str;

    /// Attaches the channel. On failure the channel settles in the state
    /// the transport chose (commonly `Suspended` or `Failed`) and the
    /// error describes why.
    fn attach(&self) -> impl std::future::Future<Output = Result<(), ErrorInfo>> + Send;

    /// Detaches the channel.
    fn detach(&self) -> impl std::future::Future<Output = Result<(), ErrorInfo>> + Send;

    /// Snapshot of the current state.
    fn state(&self) -> ChannelState;

    /// Snapshot of the most recent error, if the channel is in an error
    /// state. May momentarily disagree with [`state`](Self::state); the
    /// two are separate reads.
    fn error_reason(&self) -> Option<ErrorInfo>;

    /// Subscribes to the channel's state-change stream.
    fn subscribe_state(&self) -> Subscription<ChannelStateChange>;
}

/// Publish/subscribe of named events on a channel.
pub trait ChannelMessaging: RealtimeChannel {
    /// Publishes a named event.
    fn publish(
        &self,
        event: &str,
        data: serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), ErrorInfo>> + Send;

    /// Subscribes to events received on this channel.
    fn subscribe_messages(
        &self,
        policy: BufferingPolicy,
    ) -> Subscription<ChannelMessage>;
}

/// Presence operations on a channel.
pub trait ChannelPresence: RealtimeChannel {
    /// Enters presence under this connection's client id.
    fn presence_enter(
        &self,
        data: Option<serde_json::Value>,
    ) -> impl std::future::Future<Output = Result<(), ErrorInfo>> + Send;

    /// Updates this connection's presence data.
    fn presence_update(
        &self,
        data: Option<serde_json::Value>,
    ) -> impl std::future::Future<Output = Result<(), ErrorInfo>> + Send;

    /// Leaves presence.
    fn presence_leave(&self) -> impl std::future::Future<Output = Result<(), ErrorInfo>> + Send;

    /// Fetches the current presence set.
    fn presence_get(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<PresenceMember>, ErrorInfo>> + Send;

    /// Subscribes to presence transitions on this channel.
    fn subscribe_presence(
        &self,
        policy: BufferingPolicy,
    ) -> Subscription<PresenceEvent>;
}

/// Hands out channels by name.
///
/// Calling [`channel`](Self::channel) twice with the same name returns
/// the same underlying channel, so features addressing the same channel
/// share its state.
pub trait RealtimeClient: Send + Sync + 'static {
    /// The channel type this client produces.
    type Channel: RealtimeChannel + ChannelMessaging + ChannelPresence;

    /// The identity this connection publishes under.
    fn client_id(&self) -> &str;

    /// Gets or creates the channel with the given name.
    fn channel(&self, name: &str) -> Arc<Self::Channel>;
}
