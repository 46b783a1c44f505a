//! Channel naming scheme.
//!
//! A room maps onto a fixed set of realtime channels. Messages, presence,
//! reactions, and occupancy share the chat channel; typing indicators get
//! their own channel so their high-churn presence traffic doesn't compete
//! with message delivery.

/// The channel carrying messages, presence, reactions, and occupancy for
/// a room: `<roomID>::$chat::$chatMessages`.
pub fn chat_channel_name(room_id: &str) -> String {
    format!("{room_id}::$chat::$chatMessages")
}

/// The channel carrying typing indicators for a room:
/// `<roomID>::$chat::$typingIndicators`.
pub fn typing_channel_name(room_id: &str) -> String {
    format!("{room_id}::$chat::$typingIndicators")
}
