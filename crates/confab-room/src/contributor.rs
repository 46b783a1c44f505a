//! Contributors: the feature channels participating in a room's
//! lifecycle, plus the per-contributor bookkeeping the manager keeps
//! about them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use confab_events::{Broadcaster, BufferingPolicy, Subscription};
use confab_protocol::{ErrorInfo, RoomFeature};
use confab_realtime::{ContributorChannel, RealtimeChannel};
use tokio::task::JoinHandle;

/// Counter for generating unique contributor ids.
static NEXT_CONTRIBUTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Counter for generating unique transient-disconnect timeout ids.
static NEXT_TIMEOUT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one contributor within a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContributorId(u64);

impl ContributorId {
    fn next() -> Self {
        Self(NEXT_CONTRIBUTOR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ContributorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "contributor-{}", self.0)
    }
}

/// A break in message continuity on one contributor's channel, surfaced
/// to that feature's subscribers once the room is safely attached.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscontinuityEvent {
    pub error: Option<ErrorInfo>,
}

// ---------------------------------------------------------------------------
// Contributor
// ---------------------------------------------------------------------------

/// One feature's channel, participating in the room lifecycle.
///
/// The set of contributors is fixed at manager construction; none are
/// added or removed afterwards.
pub struct Contributor<C> {
    id: ContributorId,
    feature: RoomFeature,
    channel: ContributorChannel<C>,
    discontinuities: Broadcaster<DiscontinuityEvent>,
}

impl<C: RealtimeChannel> Contributor<C> {
    pub fn new(feature: RoomFeature, channel: ContributorChannel<C>) -> Self {
        Self {
            id: ContributorId::next(),
            feature,
            channel,
            discontinuities: Broadcaster::new(),
        }
    }

    pub fn id(&self) -> ContributorId {
        self.id
    }

    pub fn feature(&self) -> RoomFeature {
        self.feature
    }

    /// The adapter over this contributor's channel.
    pub fn channel(&self) -> &ContributorChannel<C> {
        &self.channel
    }

    /// Subscribes to discontinuity events on this contributor.
    pub fn on_discontinuity(
        &self,
        policy: BufferingPolicy,
    ) -> Subscription<DiscontinuityEvent> {
        self.discontinuities.subscribe(policy)
    }

    pub(crate) fn emit_discontinuity(&self, event: DiscontinuityEvent) {
        tracing::debug!(
            contributor = %self.id,
            feature = %self.feature,
            "emitting discontinuity"
        );
        self.discontinuities.emit(event);
    }
}

// ---------------------------------------------------------------------------
// Per-contributor annotations (owned by the manager)
// ---------------------------------------------------------------------------

/// A running 5-second grace timer against a contributor that transiently
/// entered `attaching`.
///
/// Each timer gets a unique id so a cancelled timer can never be
/// confused with a newer one recorded in the same slot: the timer task
/// re-checks its own id on expiry and stands down if it was replaced.
#[derive(Debug)]
pub(crate) struct TransientDisconnectTimeout {
    pub(crate) id: u64,
    pub(crate) task: Option<JoinHandle<()>>,
}

impl TransientDisconnectTimeout {
    pub(crate) fn next_id() -> u64 {
        NEXT_TIMEOUT_ID.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn cancel(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// The manager's bookkeeping for one contributor, keyed by
/// [`ContributorId`] and independent of the immutable contributor list.
#[derive(Debug, Default)]
pub(crate) struct ContributorAnnotation {
    /// A discontinuity observed while an operation was in progress, to
    /// be emitted after the next successful attachment cycle. First
    /// write wins; later causes are dropped with a log.
    pub(crate) pending_discontinuity: Option<DiscontinuityEvent>,

    /// Present while a transient-disconnect grace timer is running.
    pub(crate) transient_disconnect_timeout:
        Option<TransientDisconnectTimeout>,

    /// Set once the contributor first reaches `attached`; never cleared
    /// for the manager's lifetime.
    pub(crate) has_been_attached: bool,
}
