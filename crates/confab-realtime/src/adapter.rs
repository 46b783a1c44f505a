//! Contributor adapter: the view of a channel the lifecycle manager
//! consumes.
//!
//! The adapter does not interpret state. It proxies attach/detach with
//! their causes and forwards the state-change stream; every judgement
//! about what a transition *means* for the room lives in the manager.

use std::sync::Arc;

use confab_events::Subscription;
use confab_protocol::ErrorInfo;

use crate::{ChannelState, ChannelStateChange, RealtimeChannel};

/// Wraps one channel for consumption by the room lifecycle manager.
///
/// Cheap to clone; clones share the underlying channel.
pub struct ContributorChannel<C> {
    channel: Arc<C>,
}

impl<C> Clone for ContributorChannel<C> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
        }
    }
}

impl<C: RealtimeChannel> ContributorChannel<C> {
    pub fn new(channel: Arc<C>) -> Self {
        Self { channel }
    }

    /// The wrapped channel, for feature facades that need the full
    /// messaging/presence surface.
    pub fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    /// The underlying channel's name.
    pub fn name(&self) -> &str {
        self.channel.name()
    }

    /// Proxies a channel attach, forwarding the transport's cause on
    /// failure.
    pub async fn attach(&self) -> Result<(), ErrorInfo> {
        self.channel.attach().await
    }

    /// Proxies a channel detach, forwarding the transport's cause on
    /// failure.
    pub async fn detach(&self) -> Result<(), ErrorInfo> {
        self.channel.detach().await
    }

    /// Snapshot of the channel's current state.
    pub fn state(&self) -> ChannelState {
        self.channel.state()
    }

    /// Snapshot of the channel's last error. Read separately from
    /// [`state`](Self::state); the pair is not guaranteed consistent.
    pub fn error_reason(&self) -> Option<ErrorInfo> {
        self.channel.error_reason()
    }

    /// The channel's state-change stream.
    pub fn subscribe_state(&self) -> Subscription<ChannelStateChange> {
        self.channel.subscribe_state()
    }
}
