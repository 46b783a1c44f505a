//! Room options: which features a room carries, and their tunables.

use confab_features::TypingOptions;
use serde_json::Value;

/// Tunables for the presence feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresenceOptions {
    /// Data attached when this client enters presence without supplying
    /// any of its own.
    pub default_enter_data: Option<Value>,
}

/// Which features a room is created with.
///
/// Messages are always on; everything else is opt-out. A room's options
/// are fixed at creation: requesting the same room again with different
/// options fails with `inconsistentRoomOptions` rather than silently
/// reconfiguring a live room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomOptions {
    /// Presence, or `None` to disable the feature.
    pub presence: Option<PresenceOptions>,

    /// Typing indicators, or `None` to disable the feature.
    pub typing: Option<TypingOptions>,

    /// Room-level reactions.
    pub reactions: bool,

    /// Occupancy metrics.
    pub occupancy: bool,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            presence: Some(PresenceOptions::default()),
            typing: Some(TypingOptions::default()),
            reactions: true,
            occupancy: true,
        }
    }
}

impl RoomOptions {
    /// A room with nothing but messages.
    pub fn messages_only() -> Self {
        Self {
            presence: None,
            typing: None,
            reactions: false,
            occupancy: false,
        }
    }
}
