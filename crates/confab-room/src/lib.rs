//! Room lifecycle management for Confab.
//!
//! A room is a logical conversation backed by several feature channels
//! (messages, presence, typing, reactions, occupancy). Each enabled
//! feature contributes one channel — a *contributor* — that attaches,
//! detaches, fails, suspends, and loses continuity on its own schedule.
//! The [`RoomLifecycleManager`] folds those independent channel
//! lifecycles into a single coherent room status, runs the user-facing
//! Attach/Detach/Release operations, and schedules the recovery
//! operations (Retry, Rundown) that transitions demand.
//!
//! ```text
//! contributors ──state changes──▶ manager ──status changes──▶ app
//!      ▲                            │
//!      └───── attach / detach ──────┘
//! ```

mod contributor;
mod handler;
mod manager;
mod operations;
mod status;

pub use contributor::{Contributor, ContributorId, DiscontinuityEvent};
pub use manager::RoomLifecycleManager;
pub use status::{RoomStatus, RoomStatusChange};

use std::time::Duration;

/// Grace period for a contributor that transiently drops to `attaching`:
/// if it re-attaches within this window, the room status is untouched.
pub const TRANSIENT_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Spacing between detach attempts inside the detachment and release
/// cycles, which retry until the transport lets the channel go.
pub const DETACH_RETRY_INTERVAL: Duration = Duration::from_millis(250);
