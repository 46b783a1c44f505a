//! Room status: the public enumeration the application observes, and the
//! finer internal status the manager actually runs on.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use confab_protocol::ErrorInfo;
use tokio::task::JoinHandle;

/// Counter for generating unique operation ids.
static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one lifecycle operation (Attach, Detach, Release, Retry,
/// Rundown). Unique per operation for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct OperationId(u64);

impl OperationId {
    pub(crate) fn next() -> Self {
        Self(NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RoomStatus (public)
// ---------------------------------------------------------------------------

/// The room status observed by the application.
///
/// This is the coarse, public view. The manager runs on [`Status`], a
/// finer internal enumeration; every internal status maps onto exactly
/// one of these cases, and transitions between two internal statuses
/// sharing the same public case emit no status-change event.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomStatus {
    /// Created, never attached.
    Initialized,

    /// An attachment cycle is underway. Carries a cause when the cycle
    /// was provoked by a contributor's transient disconnect.
    Attaching { cause: Option<ErrorInfo> },

    /// Every contributor is attached.
    Attached,

    /// A detach operation is underway.
    Detaching,

    /// Every non-failed contributor is detached.
    Detached,

    /// A contributor suspended; the room is between recovery attempts.
    Suspended { cause: ErrorInfo },

    /// A contributor failed. The room does not leave this state on its
    /// own; a user Attach or Release is required.
    Failed { cause: ErrorInfo },

    /// A release operation is underway.
    Releasing,

    /// Released. Terminal; the room accepts no further operations.
    Released,
}

impl RoomStatus {
    /// `true` when `other` maps to the same public case, ignoring
    /// attached causes.
    pub fn same_case(&self, other: &RoomStatus) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoomStatus::Initialized => "initialized",
            RoomStatus::Attaching { .. } => "attaching",
            RoomStatus::Attached => "attached",
            RoomStatus::Detaching => "detaching",
            RoomStatus::Detached => "detached",
            RoomStatus::Suspended { .. } => "suspended",
            RoomStatus::Failed { .. } => "failed",
            RoomStatus::Releasing => "releasing",
            RoomStatus::Released => "released",
        };
        write!(f, "{name}")
    }
}

/// One entry in the room-status change stream. Emitted iff `current`
/// and `previous` differ under the public mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomStatusChange {
    pub current: RoomStatus,
    pub previous: RoomStatus,
}

// ---------------------------------------------------------------------------
// Status (internal)
// ---------------------------------------------------------------------------

/// The manager's internal status.
///
/// Beyond the public case, each variant records which operation induced
/// it and, for the `*AwaitingStartOf*` variants, the handle of the
/// scheduled follow-up task. A transition out of such a variant drops
/// the handle, which detaches (not cancels) the scheduled task — the
/// task re-checks the status when it starts and stands down if it has
/// been superseded.
#[derive(Debug)]
pub(crate) enum Status {
    Initialized,

    AttachingDueToAttachOperation {
        operation_id: OperationId,
    },
    AttachingDueToRetryOperation {
        operation_id: OperationId,
    },
    AttachingDueToContributorStateChange {
        cause: Option<ErrorInfo>,
    },

    Attached,

    Detaching {
        operation_id: OperationId,
    },

    Detached,
    DetachedDueToRetryOperation {
        operation_id: OperationId,
    },

    /// A Retry has been scheduled but has not started yet.
    SuspendedAwaitingStartOfRetryOperation {
        #[allow(dead_code)] // held so the handle's lifetime tracks the status
        retry_task: JoinHandle<()>,
        cause: ErrorInfo,
    },
    /// A Retry operation is running.
    Suspended {
        retry_operation_id: OperationId,
        cause: ErrorInfo,
    },

    /// A Rundown has been scheduled but has not started yet.
    FailedAwaitingStartOfRundownOperation {
        #[allow(dead_code)]
        rundown_task: JoinHandle<()>,
        cause: ErrorInfo,
    },
    /// A Rundown operation is tearing down the non-failed contributors.
    FailedAndPerformingRundownOperation {
        operation_id: OperationId,
        cause: ErrorInfo,
    },
    Failed {
        cause: ErrorInfo,
    },

    Releasing {
        operation_id: OperationId,
    },
    Released,
}

impl Status {
    /// The id of the operation currently in progress, if any.
    ///
    /// "In progress" spans more than the obvious cases: a Retry holds
    /// its operation id through `Suspended` and
    /// `DetachedDueToRetryOperation` while it waits on the triggering
    /// contributor, and a Rundown through
    /// `FailedAndPerformingRundownOperation`.
    pub(crate) fn operation_id(&self) -> Option<OperationId> {
        match self {
            Status::AttachingDueToAttachOperation { operation_id }
            | Status::AttachingDueToRetryOperation { operation_id }
            | Status::Detaching { operation_id }
            | Status::DetachedDueToRetryOperation { operation_id }
            | Status::Suspended {
                retry_operation_id: operation_id,
                ..
            }
            | Status::FailedAndPerformingRundownOperation {
                operation_id,
                ..
            }
            | Status::Releasing { operation_id } => Some(*operation_id),
            Status::Initialized
            | Status::AttachingDueToContributorStateChange { .. }
            | Status::Attached
            | Status::Detached
            | Status::SuspendedAwaitingStartOfRetryOperation { .. }
            | Status::FailedAwaitingStartOfRundownOperation { .. }
            | Status::Failed { .. }
            | Status::Released => None,
        }
    }

    /// The deterministic public mapping.
    pub(crate) fn room_status(&self) -> RoomStatus {
        match self {
            Status::Initialized => RoomStatus::Initialized,
            Status::AttachingDueToAttachOperation { .. }
            | Status::AttachingDueToRetryOperation { .. } => {
                RoomStatus::Attaching { cause: None }
            }
            Status::AttachingDueToContributorStateChange { cause } => {
                RoomStatus::Attaching {
                    cause: cause.clone(),
                }
            }
            Status::Attached => RoomStatus::Attached,
            Status::Detaching { .. } => RoomStatus::Detaching,
            Status::Detached
            | Status::DetachedDueToRetryOperation { .. } => {
                RoomStatus::Detached
            }
            Status::SuspendedAwaitingStartOfRetryOperation {
                cause, ..
            }
            | Status::Suspended { cause, .. } => RoomStatus::Suspended {
                cause: cause.clone(),
            },
            Status::FailedAwaitingStartOfRundownOperation {
                cause, ..
            }
            | Status::FailedAndPerformingRundownOperation {
                cause, ..
            }
            | Status::Failed { cause } => RoomStatus::Failed {
                cause: cause.clone(),
            },
            Status::Releasing { .. } => RoomStatus::Releasing,
            Status::Released => RoomStatus::Released,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
