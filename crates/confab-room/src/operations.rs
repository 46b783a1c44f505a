//! The lifecycle cycles and the scheduled recovery operations.
//!
//! The attachment, detachment, and release cycles are driven directly by
//! the caller of the corresponding public operation. Retry and Rundown
//! run as spawned tasks: they are scheduled by a status transition into
//! an `*AwaitingStartOf*` status, and when they start they first confirm
//! that status still stands — a user operation that got in first
//! supersedes them.

use std::sync::{Arc, Weak};

use confab_protocol::{ErrorCode, ErrorInfo};
use confab_realtime::{ChannelState, RealtimeChannel};
use tokio::sync::MutexGuard;

use crate::manager::{ManagerState, OperationResult, Shared};
use crate::status::{OperationId, RoomStatus, Status};
use crate::DETACH_RETRY_INTERVAL;

/// What provoked an attachment cycle.
pub(crate) enum AttachTrigger {
    AttachOperation { operation_id: OperationId },
    RetryOperation { operation_id: OperationId },
}

/// What provoked a detachment cycle.
pub(crate) enum DetachTrigger {
    UserDetach,
    /// Detach phase of a Retry. The triggering contributor is skipped:
    /// it is expected to recover on its own and is awaited separately.
    RetryOperation {
        operation_id: OperationId,
        triggering: usize,
    },
}

fn teardown_error() -> ErrorInfo {
    ErrorInfo::new(
        ErrorCode::UnknownError.code(),
        ErrorCode::UnknownError.status_code(),
        "room lifecycle manager torn down mid-operation",
    )
}

impl<C: RealtimeChannel> Shared<C> {
    // -- Attachment cycle ----------------------------------------------------

    /// Attaches every contributor in order.
    ///
    /// Takes the state lock as a guard so the transition into the
    /// attaching status is atomic with the caller's precondition
    /// checks.
    pub(crate) async fn attachment_cycle(
        self: &Arc<Self>,
        mut state: MutexGuard<'_, ManagerState>,
        trigger: AttachTrigger,
    ) -> OperationResult {
        let status = match &trigger {
            AttachTrigger::AttachOperation { operation_id } => {
                Status::AttachingDueToAttachOperation {
                    operation_id: *operation_id,
                }
            }
            AttachTrigger::RetryOperation { operation_id } => {
                Status::AttachingDueToRetryOperation {
                    operation_id: *operation_id,
                }
            }
        };
        state.transition_to(status);
        drop(state);

        for (index, contributor) in self.contributors.iter().enumerate() {
            let Err(error) = contributor.channel().attach().await else {
                continue;
            };
            let feature = contributor.feature();
            let cause = ErrorInfo::with_cause(
                ErrorCode::AttachmentFailed(feature),
                error,
            );

            let mut state = self.state.lock().await;
            match contributor.channel().state() {
                ChannelState::Suspended => {
                    self.schedule_retry(&mut state, index, cause.clone());
                }
                ChannelState::Failed => {
                    self.schedule_rundown(&mut state, cause.clone());
                }
                other => {
                    // The transport broke its contract: a failed attach
                    // must leave the channel suspended or failed. Treat
                    // it like a failure rather than continuing blindly.
                    tracing::error!(
                        room_id = %self.room_id,
                        %feature,
                        state = %other,
                        "channel settled in unexpected state after a \
                         failed attach"
                    );
                    self.schedule_rundown(&mut state, cause.clone());
                }
            }
            return Err(cause);
        }

        let mut state = self.state.lock().await;
        state.clear_all_transient_disconnect_timeouts();
        state.transition_to(Status::Attached);

        // The room is safely attached again: surface the discontinuities
        // that were parked while the operation ran.
        for contributor in &self.contributors {
            let pending = state
                .annotation_mut(contributor.id())
                .pending_discontinuity
                .take();
            if let Some(event) = pending {
                contributor.emit_discontinuity(event);
            }
        }
        Ok(())
    }

    // -- Detachment cycle ----------------------------------------------------

    /// Detaches every contributor the trigger covers.
    ///
    /// A contributor that settles in `failed` records the first such
    /// cause (transitioning the room to failed if it isn't already) and
    /// the cycle moves on; any other detach failure is retried every
    /// 250 ms until the transport lets go.
    pub(crate) async fn detachment_cycle(
        &self,
        trigger: DetachTrigger,
    ) -> OperationResult {
        let mut first_failure: Option<ErrorInfo> = None;

        for (index, contributor) in self.contributors.iter().enumerate() {
            if let DetachTrigger::RetryOperation { triggering, .. } =
                &trigger
            {
                if *triggering == index {
                    continue;
                }
            }

            loop {
                if self.is_tearing_down() {
                    return Err(teardown_error());
                }
                match contributor.channel().detach().await {
                    Ok(()) => break,
                    Err(error) => {
                        if contributor.channel().state()
                            == ChannelState::Failed
                        {
                            let cause = ErrorInfo::with_cause(
                                ErrorCode::DetachmentFailed(
                                    contributor.feature(),
                                ),
                                error,
                            );
                            let mut state = self.state.lock().await;
                            if !matches!(
                                state.status.room_status(),
                                RoomStatus::Failed { .. }
                            ) {
                                state.transition_to(Status::Failed {
                                    cause: cause.clone(),
                                });
                            }
                            first_failure.get_or_insert(cause);
                            break;
                        }
                        tracing::warn!(
                            room_id = %self.room_id,
                            feature = %contributor.feature(),
                            %error,
                            "channel detach failed; retrying"
                        );
                        tokio::time::sleep(DETACH_RETRY_INTERVAL).await;
                    }
                }
            }
        }

        if let Some(cause) = first_failure {
            return Err(cause);
        }

        let mut state = self.state.lock().await;
        match trigger {
            DetachTrigger::UserDetach => {
                state.transition_to(Status::Detached);
            }
            DetachTrigger::RetryOperation { operation_id, .. } => {
                state.transition_to(Status::DetachedDueToRetryOperation {
                    operation_id,
                });
            }
        }
        Ok(())
    }

    // -- Release cycle ---------------------------------------------------

    /// Drains every contributor: already-failed channels are skipped,
    /// everything else is detached with indefinite 250 ms retries.
    ///
    /// Also serves as the teardown phase of a Rundown, which has the
    /// same drain semantics.
    pub(crate) async fn release_cycle(&self) {
        for contributor in &self.contributors {
            loop {
                if self.is_tearing_down() {
                    return;
                }
                if contributor.channel().state() == ChannelState::Failed {
                    break;
                }
                match contributor.channel().detach().await {
                    Ok(()) => break,
                    Err(error) => {
                        tracing::warn!(
                            room_id = %self.room_id,
                            feature = %contributor.feature(),
                            %error,
                            "channel detach failed during drain; retrying"
                        );
                        tokio::time::sleep(DETACH_RETRY_INTERVAL).await;
                    }
                }
            }
        }
    }

    // -- Scheduling ----------------------------------------------------------

    /// Schedules a Retry keyed to `triggering` and transitions to
    /// `suspendedAwaitingStartOfRetry`.
    pub(crate) fn schedule_retry(
        self: &Arc<Self>,
        state: &mut ManagerState,
        triggering: usize,
        cause: ErrorInfo,
    ) {
        let operation_id = OperationId::next();
        tracing::debug!(
            room_id = %self.room_id,
            operation = %operation_id,
            feature = %self.contributors[triggering].feature(),
            "scheduling retry operation"
        );
        let task = tokio::spawn(retry_operation(
            Arc::downgrade(self),
            operation_id,
            triggering,
            cause.clone(),
        ));
        state.transition_to(Status::SuspendedAwaitingStartOfRetryOperation {
            retry_task: task,
            cause,
        });
    }

    /// Schedules a Rundown and transitions to
    /// `failedAwaitingStartOfRundown`.
    pub(crate) fn schedule_rundown(
        self: &Arc<Self>,
        state: &mut ManagerState,
        cause: ErrorInfo,
    ) {
        let operation_id = OperationId::next();
        tracing::debug!(
            room_id = %self.room_id,
            operation = %operation_id,
            "scheduling rundown operation"
        );
        let task = tokio::spawn(rundown_operation(
            Arc::downgrade(self),
            operation_id,
            cause.clone(),
        ));
        state.transition_to(Status::FailedAwaitingStartOfRundownOperation {
            rundown_task: task,
            cause,
        });
    }
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

enum WaitOutcome {
    Attached,
    Failed(Option<ErrorInfo>),
}

/// The scheduled recovery sequence for a contributor that suspended:
/// detach everything else, wait for the trigger to recover, re-attach.
pub(crate) async fn retry_operation<C: RealtimeChannel>(
    shared: Weak<Shared<C>>,
    operation_id: OperationId,
    triggering: usize,
    cause: ErrorInfo,
) {
    let Some(shared) = shared.upgrade() else {
        return;
    };

    {
        let mut state = shared.state.lock().await;
        if !matches!(
            state.status,
            Status::SuspendedAwaitingStartOfRetryOperation { .. }
        ) {
            tracing::debug!(
                room_id = %shared.room_id,
                operation = %operation_id,
                "scheduled retry superseded before it started"
            );
            return;
        }
        state.transition_to(Status::Suspended {
            retry_operation_id: operation_id,
            cause: cause.clone(),
        });
    }

    if let Err(error) = shared
        .detachment_cycle(DetachTrigger::RetryOperation {
            operation_id,
            triggering,
        })
        .await
    {
        // The cycle already recorded the failure transition.
        let mut state = shared.state.lock().await;
        state.operation_did_complete(operation_id, &Err(error));
        return;
    }

    // Wait for the triggering contributor to recover by itself.
    // Subscribe before sampling the snapshot so a transition landing
    // between the two reads is not lost; the snapshot pair may be
    // momentarily inconsistent, in which case the next event settles it.
    let contributor = &shared.contributors[triggering];
    let mut changes = contributor.channel().subscribe_state();
    let mut outcome = match contributor.channel().state() {
        ChannelState::Attached => Some(WaitOutcome::Attached),
        ChannelState::Failed => Some(WaitOutcome::Failed(
            contributor.channel().error_reason(),
        )),
        _ => None,
    };
    while outcome.is_none() {
        outcome = match changes.next().await {
            Some(change) => match change.current {
                ChannelState::Attached => Some(WaitOutcome::Attached),
                ChannelState::Failed => {
                    Some(WaitOutcome::Failed(change.reason))
                }
                _ => None,
            },
            // Stream over: the channel's broadcaster is gone, which
            // only happens at teardown.
            None => return,
        };
    }
    drop(changes);

    if let Some(WaitOutcome::Failed(reason)) = outcome {
        let reason = reason.unwrap_or_else(|| {
            tracing::warn!(
                room_id = %shared.room_id,
                feature = %contributor.feature(),
                "channel failed without a reason; substituting unknown \
                 error"
            );
            ErrorInfo::unknown()
        });
        let mut state = shared.state.lock().await;
        state.transition_to(Status::Failed {
            cause: reason.clone(),
        });
        state.operation_did_complete(operation_id, &Err(reason));
        return;
    }

    let state = shared.state.lock().await;
    let result = shared
        .attachment_cycle(
            state,
            AttachTrigger::RetryOperation { operation_id },
        )
        .await;

    let mut state = shared.state.lock().await;
    state.operation_did_complete(operation_id, &result);
}

// ---------------------------------------------------------------------------
// Rundown
// ---------------------------------------------------------------------------

/// The scheduled teardown after an attach left a contributor failed:
/// drain the non-failed channels, then settle in `failed`.
pub(crate) async fn rundown_operation<C: RealtimeChannel>(
    shared: Weak<Shared<C>>,
    operation_id: OperationId,
    cause: ErrorInfo,
) {
    let Some(shared) = shared.upgrade() else {
        return;
    };

    {
        let mut state = shared.state.lock().await;
        if !matches!(
            state.status,
            Status::FailedAwaitingStartOfRundownOperation { .. }
        ) {
            tracing::debug!(
                room_id = %shared.room_id,
                operation = %operation_id,
                "scheduled rundown superseded before it started"
            );
            return;
        }
        state.transition_to(Status::FailedAndPerformingRundownOperation {
            operation_id,
            cause: cause.clone(),
        });
    }

    shared.release_cycle().await;
    if shared.is_tearing_down() {
        return;
    }

    let mut state = shared.state.lock().await;
    state.transition_to(Status::Failed { cause });
    state.operation_did_complete(operation_id, &Ok(()));
}
