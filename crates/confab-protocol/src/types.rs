//! Core wire types: feature tags and the event payloads that travel on
//! realtime channels.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomFeature
// ---------------------------------------------------------------------------

/// A chat feature participating in a room's lifecycle.
///
/// Each enabled feature is backed by one channel contributor. The tag is
/// carried in error codes (`attachment failed: presence`) and in the
/// presence-readiness gate, so callers can tell *which* feature a failure
/// belongs to.
///
/// The variant order is load-bearing: [`RoomFeature::index`] offsets into
/// the attachment/detachment error-code ranges.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum RoomFeature {
    Messages,
    Presence,
    Reactions,
    Occupancy,
    Typing,
}

impl RoomFeature {
    /// All features, in error-code order.
    pub const ALL: [RoomFeature; 5] = [
        RoomFeature::Messages,
        RoomFeature::Presence,
        RoomFeature::Reactions,
        RoomFeature::Occupancy,
        RoomFeature::Typing,
    ];

    /// Stable offset into the per-feature error-code ranges.
    pub fn index(self) -> u32 {
        match self {
            RoomFeature::Messages => 0,
            RoomFeature::Presence => 1,
            RoomFeature::Reactions => 2,
            RoomFeature::Occupancy => 3,
            RoomFeature::Typing => 4,
        }
    }
}

impl fmt::Display for RoomFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoomFeature::Messages => "messages",
            RoomFeature::Presence => "presence",
            RoomFeature::Reactions => "reactions",
            RoomFeature::Occupancy => "occupancy",
            RoomFeature::Typing => "typing",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// A chat message as published on the room's chat channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Identity of the sender, as asserted by the transport.
    pub client_id: String,

    /// The message body.
    pub text: String,

    /// Server timestamp, milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: u64,

    /// Application-defined metadata attached to the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// What kind of presence transition an event describes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum PresenceEventKind {
    Enter,
    Update,
    Leave,
}

/// A single member currently present on a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceMember {
    pub client_id: String,

    /// Opaque per-member data supplied on enter/update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A presence transition observed on a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEvent {
    pub kind: PresenceEventKind,
    pub member: PresenceMember,
}

// ---------------------------------------------------------------------------
// Reactions
// ---------------------------------------------------------------------------

/// An ephemeral room-level reaction (e.g. `"👍"`, `"heart"`).
///
/// Reactions are fire-and-forget: they are not persisted and arrive only
/// at subscribers attached at publish time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomReaction {
    /// The reaction kind chosen by the sender.
    #[serde(rename = "type")]
    pub kind: String,

    pub client_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Occupancy
// ---------------------------------------------------------------------------

/// Channel occupancy metrics, delivered periodically by the transport on
/// the chat channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyMetrics {
    /// Number of realtime connections attached to the channel.
    pub connections: u64,

    /// Number of members currently entered into channel presence.
    pub presence_members: u64,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The wire shapes here are consumed by SDKs in other languages, so
    //! the serde attributes are pinned by tests: a rename regression means
    //! peers stop parsing our payloads.

    use super::*;

    #[test]
    fn test_room_feature_index_matches_declaration_order() {
        for (i, feature) in RoomFeature::ALL.iter().enumerate() {
            assert_eq!(feature.index(), i as u32);
        }
    }

    #[test]
    fn test_room_feature_display_is_lowercase() {
        assert_eq!(RoomFeature::Messages.to_string(), "messages");
        assert_eq!(RoomFeature::Typing.to_string(), "typing");
    }

    #[test]
    fn test_room_feature_serializes_camel_case() {
        let json = serde_json::to_string(&RoomFeature::Occupancy).unwrap();
        assert_eq!(json, "\"occupancy\"");
    }

    #[test]
    fn test_chat_message_round_trip() {
        let msg = ChatMessage {
            client_id: "alice".into(),
            text: "hello".into(),
            timestamp: 1_700_000_000_000,
            metadata: None,
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: ChatMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_chat_message_client_id_is_camel_case_on_wire() {
        let msg = ChatMessage {
            client_id: "alice".into(),
            text: "hi".into(),
            timestamp: 0,
            metadata: None,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["clientId"], "alice");
        assert!(json.get("client_id").is_none());
    }

    #[test]
    fn test_chat_message_timestamp_defaults_when_missing() {
        let json = r#"{"clientId": "bob", "text": "x"}"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.timestamp, 0);
    }

    #[test]
    fn test_presence_event_round_trip() {
        let event = PresenceEvent {
            kind: PresenceEventKind::Enter,
            member: PresenceMember {
                client_id: "carol".into(),
                data: Some(serde_json::json!({"status": "online"})),
            },
        };
        let bytes = serde_json::to_vec(&event).unwrap();
        let decoded: PresenceEvent =
            serde_json::from_slice(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn test_room_reaction_kind_serializes_as_type() {
        let reaction = RoomReaction {
            kind: "heart".into(),
            client_id: "dave".into(),
            metadata: None,
        };
        let json: serde_json::Value =
            serde_json::to_value(&reaction).unwrap();
        assert_eq!(json["type"], "heart");
    }

    #[test]
    fn test_occupancy_metrics_wire_shape() {
        let metrics = OccupancyMetrics {
            connections: 7,
            presence_members: 3,
        };
        let json: serde_json::Value =
            serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["connections"], 7);
        assert_eq!(json["presenceMembers"], 3);
    }

    #[test]
    fn test_occupancy_metrics_default_is_zero() {
        let metrics = OccupancyMetrics::default();
        assert_eq!(metrics.connections, 0);
        assert_eq!(metrics.presence_members, 0);
    }
}
