//! The room: one conversation's feature facades wired onto one
//! lifecycle manager.

use std::sync::Arc;

use confab_events::{BufferingPolicy, Subscription};
use confab_features::{
    Messages, Occupancy, Reactions, RoomPresence, TypingIndicators,
};
use confab_protocol::{
    chat_channel_name, typing_channel_name, ErrorInfo, RoomFeature,
};
use confab_realtime::{ContributorChannel, RealtimeClient};
use confab_room::{
    Contributor, DiscontinuityEvent, RoomLifecycleManager, RoomStatus,
    RoomStatusChange,
};

use crate::RoomOptions;

/// A logical conversation: messages plus the features enabled by its
/// [`RoomOptions`], sharing one lifecycle.
///
/// Messages, presence, reactions, and occupancy share the room's chat
/// channel; typing indicators get their own channel. Each enabled
/// feature contributes its channel to the lifecycle manager, which is
/// the single source of truth for the room's status.
pub struct Room<R: RealtimeClient> {
    room_id: String,
    options: RoomOptions,
    manager: Arc<RoomLifecycleManager<R::Channel>>,
    messages: Messages<R::Channel>,
    presence: Option<RoomPresence<R::Channel>>,
    typing: Option<TypingIndicators<R::Channel>>,
    reactions: Option<Reactions<R::Channel>>,
    occupancy: Option<Occupancy<R::Channel>>,
}

impl<R: RealtimeClient> std::fmt::Debug for Room<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("room_id", &self.room_id)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<R: RealtimeClient> Room<R> {
    pub(crate) fn new(
        client: &R,
        room_id: String,
        options: RoomOptions,
    ) -> Self {
        let chat = client.channel(&chat_channel_name(&room_id));

        // Contributor order is attachment order: messages first, the
        // optional features after, typing last on its own channel.
        let mut contributors = vec![Contributor::new(
            RoomFeature::Messages,
            ContributorChannel::new(Arc::clone(&chat)),
        )];
        if options.presence.is_some() {
            contributors.push(Contributor::new(
                RoomFeature::Presence,
                ContributorChannel::new(Arc::clone(&chat)),
            ));
        }
        if options.reactions {
            contributors.push(Contributor::new(
                RoomFeature::Reactions,
                ContributorChannel::new(Arc::clone(&chat)),
            ));
        }
        if options.occupancy {
            contributors.push(Contributor::new(
                RoomFeature::Occupancy,
                ContributorChannel::new(Arc::clone(&chat)),
            ));
        }
        let typing_channel = options
            .typing
            .is_some()
            .then(|| client.channel(&typing_channel_name(&room_id)));
        if let Some(channel) = &typing_channel {
            contributors.push(Contributor::new(
                RoomFeature::Typing,
                ContributorChannel::new(Arc::clone(channel)),
            ));
        }

        let manager = Arc::new(RoomLifecycleManager::new(
            room_id.clone(),
            contributors,
        ));

        let messages = Messages::new(Arc::clone(&chat));
        let presence = options.presence.as_ref().map(|presence_options| {
            let facade =
                RoomPresence::new(Arc::clone(&manager), Arc::clone(&chat));
            match &presence_options.default_enter_data {
                Some(data) => facade.with_default_enter_data(data.clone()),
                None => facade,
            }
        });
        let typing = match (&options.typing, typing_channel) {
            (Some(typing_options), Some(channel)) => {
                Some(TypingIndicators::new(
                    Arc::clone(&manager),
                    channel,
                    typing_options.clone(),
                ))
            }
            _ => None,
        };
        let reactions = options
            .reactions
            .then(|| Reactions::new(Arc::clone(&chat)));
        let occupancy = options
            .occupancy
            .then(|| Occupancy::new(Arc::clone(&chat)));

        Self {
            room_id,
            options,
            manager,
            messages,
            presence,
            typing,
            reactions,
            occupancy,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn options(&self) -> &RoomOptions {
        &self.options
    }

    /// The lifecycle manager backing this room.
    pub fn lifecycle(&self) -> &Arc<RoomLifecycleManager<R::Channel>> {
        &self.manager
    }

    // -- Lifecycle ---------------------------------------------------------

    /// Attaches every feature channel. See
    /// [`RoomLifecycleManager::attach`].
    pub async fn attach(&self) -> Result<(), ErrorInfo> {
        self.manager.attach().await
    }

    /// Detaches every feature channel. See
    /// [`RoomLifecycleManager::detach`].
    pub async fn detach(&self) -> Result<(), ErrorInfo> {
        self.manager.detach().await
    }

    pub(crate) async fn release(&self) {
        self.manager.release().await;
    }

    /// Snapshot of the room's public status.
    pub async fn status(&self) -> RoomStatus {
        self.manager.status().await
    }

    /// Subscribes to room-status changes.
    pub fn on_status_change(
        &self,
        policy: BufferingPolicy,
    ) -> Subscription<RoomStatusChange> {
        self.manager.on_status_change(policy)
    }

    /// Subscribes to discontinuity events for one feature's channel, or
    /// `None` if that feature isn't enabled on this room.
    pub fn on_discontinuity(
        &self,
        feature: RoomFeature,
        policy: BufferingPolicy,
    ) -> Option<Subscription<DiscontinuityEvent>> {
        self.manager
            .contributor(feature)
            .map(|contributor| contributor.on_discontinuity(policy))
    }

    // -- Features ----------------------------------------------------------

    /// The messages feature (always enabled).
    pub fn messages(&self) -> &Messages<R::Channel> {
        &self.messages
    }

    /// The presence feature, if enabled in the room's options.
    pub fn presence(&self) -> Option<&RoomPresence<R::Channel>> {
        self.presence.as_ref()
    }

    /// The typing-indicators feature, if enabled.
    pub fn typing(&self) -> Option<&TypingIndicators<R::Channel>> {
        self.typing.as_ref()
    }

    /// The reactions feature, if enabled.
    pub fn reactions(&self) -> Option<&Reactions<R::Channel>> {
        self.reactions.as_ref()
    }

    /// The occupancy feature, if enabled.
    pub fn occupancy(&self) -> Option<&Occupancy<R::Channel>> {
        self.occupancy.as_ref()
    }
}
