//! # Confab
//!
//! A realtime chat SDK built around a room lifecycle manager.
//!
//! A [`Room`] bundles the chat features (messages, presence, typing
//! indicators, reactions, occupancy) enabled by its [`RoomOptions`].
//! Each feature rides on a realtime channel, and the room's lifecycle
//! manager folds those channels' independent lifecycles into one
//! coherent room status.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use confab::prelude::*;
//!
//! // With some transport implementing `RealtimeClient`:
//! // let client = ConfabClient::new(realtime);
//! // let room = client.rooms().get("basketball", RoomOptions::default()).await?;
//! // room.attach().await?;
//! // room.messages().send("hello").await?;
//! ```

mod client;
mod options;
mod room;
mod rooms;

pub use client::ConfabClient;
pub use options::{PresenceOptions, RoomOptions};
pub use room::Room;
pub use rooms::Rooms;

/// Re-exports everything an application needs.
///
/// ```rust
/// use confab::prelude::*;
/// ```
pub mod prelude {
    // Meta-crate
    pub use crate::{
        ConfabClient, PresenceOptions, Room, RoomOptions, Rooms,
    };

    // Protocol types
    pub use confab_protocol::{
        chat_channel_name, typing_channel_name, ChatMessage, ErrorCode,
        ErrorInfo, OccupancyMetrics, PresenceEvent, PresenceEventKind,
        PresenceMember, RoomFeature, RoomReaction,
    };

    // Events
    pub use confab_events::{Broadcaster, BufferingPolicy, Subscription};

    // Realtime seams
    pub use confab_realtime::{
        ChannelEvent, ChannelMessage, ChannelMessaging, ChannelPresence,
        ChannelState, ChannelStateChange, ContributorChannel,
        RealtimeChannel, RealtimeClient,
    };

    // Room lifecycle
    pub use confab_room::{
        Contributor, DiscontinuityEvent, RoomLifecycleManager, RoomStatus,
        RoomStatusChange,
    };

    // Feature facades
    pub use confab_features::{
        Messages, Occupancy, Reactions, RoomPresence, TypingEvent,
        TypingIndicators, TypingOptions,
    };
}
