//! Feature facades for Confab rooms.
//!
//! Each facade wraps one chat feature's realtime surface: it owns no
//! lifecycle logic of its own, delegating readiness questions to the
//! room lifecycle manager (every presence-touching call passes through
//! the manager's presence-readiness gate first) and the wire work to the
//! channel traits.
//!
//! ```text
//! app ──▶ facade ──gate──▶ RoomLifecycleManager
//!            │
//!            └──publish / presence / subscribe──▶ channel
//! ```

mod messages;
mod occupancy;
mod presence;
mod reactions;
mod typing;

pub use messages::{Messages, MessagesSubscription};
pub use occupancy::{Occupancy, OccupancySubscription};
pub use presence::RoomPresence;
pub use reactions::{Reactions, ReactionsSubscription};
pub use typing::{
    TypingEvent, TypingIndicators, TypingOptions, TypingSubscription,
};

/// Event name for chat messages on the chat channel.
pub const MESSAGE_EVENT_NAME: &str = "chat.message";

/// Event name for room reactions on the chat channel.
pub const REACTION_EVENT_NAME: &str = "room.reaction";

/// Event name for occupancy metric updates on the chat channel.
pub const OCCUPANCY_EVENT_NAME: &str = "[meta]occupancy";
