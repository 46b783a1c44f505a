//! Wire protocol for Confab.
//!
//! This crate defines the vocabulary shared by every other layer of the
//! SDK:
//!
//! - **Error envelope** ([`ErrorInfo`], [`ErrorCode`]) — the transport's
//!   error descriptor, reused for every failure the SDK surfaces.
//! - **Feature tags** ([`RoomFeature`]) — which chat feature a channel
//!   contributor belongs to.
//! - **Channel naming** ([`chat_channel_name`], [`typing_channel_name`]) —
//!   how room ids map onto realtime channel names.
//! - **Event payloads** ([`ChatMessage`], [`PresenceEvent`],
//!   [`RoomReaction`], [`OccupancyMetrics`]) — the structures that travel
//!   on the wire.
//!
//! # Architecture
//!
//! The protocol layer sits below everything else. It doesn't know about
//! channels, rooms, or lifecycles — it only defines the shapes they
//! exchange.
//!
//! ```text
//! Room / Features (above) → Realtime channels → Protocol (this crate)
//! ```

mod error;
mod naming;
mod types;

pub use error::{ErrorCode, ErrorInfo};
pub use naming::{chat_channel_name, typing_channel_name};
pub use types::{
    ChatMessage, OccupancyMetrics, PresenceEvent, PresenceEventKind,
    PresenceMember, RoomFeature, RoomReaction,
};
