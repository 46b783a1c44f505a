//! The contributor state-change handler.
//!
//! One monitor task per contributor consumes that channel's state-change
//! stream and feeds it through [`handle_state_change`]. Changes for a
//! given contributor are processed strictly one at a time, so
//! `has_been_attached` always reflects the correct prefix of that
//! channel's history when an event is evaluated.

use std::sync::{Arc, Weak};

use confab_events::Subscription;
use confab_protocol::ErrorInfo;
use confab_realtime::{
    ChannelEvent, ChannelState, ChannelStateChange, RealtimeChannel,
};

use crate::contributor::{ContributorId, TransientDisconnectTimeout};
use crate::manager::Shared;
use crate::status::Status;
use crate::{DiscontinuityEvent, TRANSIENT_DISCONNECT_TIMEOUT};

/// Consumes one contributor's state-change stream for the manager's
/// lifetime. Holds only a weak reference, so a dropped manager ends the
/// loop at the next event.
pub(crate) async fn monitor_contributor<C: RealtimeChannel>(
    shared: Weak<Shared<C>>,
    index: usize,
    mut changes: Subscription<ChannelStateChange>,
) {
    while let Some(change) = changes.next().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        handle_state_change(&shared, index, change).await;
    }
}

/// Folds one contributor state change into the room's state.
pub(crate) async fn handle_state_change<C: RealtimeChannel>(
    shared: &Arc<Shared<C>>,
    index: usize,
    change: ChannelStateChange,
) {
    let contributor = &shared.contributors[index];
    let id = contributor.id();
    tracing::trace!(
        room_id = %shared.room_id,
        feature = %contributor.feature(),
        event = ?change.event,
        current = %change.current,
        resumed = change.resumed,
        "contributor state change"
    );

    let mut state = shared.state.lock().await;

    // A released room is terminal: nothing a channel does afterwards
    // may produce another room transition.
    if matches!(state.status, Status::Released) {
        return;
    }

    // `has_been_attached` is monotonic; dispatch below reads the value
    // from *before* this event.
    let had_already_attached = state.annotation_mut(id).has_been_attached;
    if change.event == ChannelEvent::Attached {
        state.annotation_mut(id).has_been_attached = true;
    }
    let operation_in_progress = state.status.operation_id().is_some();

    match change.event {
        ChannelEvent::Update => {
            // A resumed update preserved continuity, and a channel that
            // never attached has no continuity to lose.
            if change.resumed || !had_already_attached {
                return;
            }
            let event = DiscontinuityEvent {
                error: change.reason.clone(),
            };
            if operation_in_progress {
                record_pending_discontinuity(shared, &mut state, id, event);
            } else {
                contributor.emit_discontinuity(event);
            }
        }

        ChannelEvent::Attached => {
            if operation_in_progress {
                if !change.resumed && had_already_attached {
                    record_pending_discontinuity(
                        shared,
                        &mut state,
                        id,
                        DiscontinuityEvent {
                            error: change.reason.clone(),
                        },
                    );
                }
            } else {
                state.clear_transient_disconnect_timeout(id);
                let all_attached = shared
                    .contributors
                    .iter()
                    .all(|c| c.channel().state() == ChannelState::Attached);
                if !matches!(state.status, Status::Attached) && all_attached
                {
                    state.transition_to(Status::Attached);
                }
            }
        }

        ChannelEvent::Failed if !operation_in_progress => {
            state.clear_all_transient_disconnect_timeouts();
            let reason = reason_or_unknown(
                &shared.room_id,
                change.reason,
                "failed",
            );
            state.transition_to(Status::Failed { cause: reason });
            drop(state);

            // Best effort: drain the remaining channels. Failures here
            // are logged and ignored; the room is already failed.
            for other in &shared.contributors {
                if let Err(error) = other.channel().detach().await {
                    tracing::warn!(
                        room_id = %shared.room_id,
                        feature = %other.feature(),
                        %error,
                        "best-effort detach after channel failure failed"
                    );
                }
            }
        }

        ChannelEvent::Suspended if !operation_in_progress => {
            state.clear_all_transient_disconnect_timeouts();
            let reason = reason_or_unknown(
                &shared.room_id,
                change.reason,
                "suspended",
            );
            shared.schedule_retry(&mut state, index, reason);
        }

        ChannelEvent::Attaching if !operation_in_progress => {
            let annotation = state.annotation_mut(id);
            if annotation.transient_disconnect_timeout.is_none() {
                let timeout_id = TransientDisconnectTimeout::next_id();
                let task = tokio::spawn(transient_disconnect_timer(
                    Arc::downgrade(shared),
                    id,
                    timeout_id,
                    change.reason.clone(),
                ));
                annotation.transient_disconnect_timeout =
                    Some(TransientDisconnectTimeout {
                        id: timeout_id,
                        task: Some(task),
                    });
                tracing::debug!(
                    room_id = %shared.room_id,
                    contributor = %id,
                    timeout = timeout_id,
                    "transient disconnect timeout started"
                );
            }
        }

        // Detached events, and failed/suspended/attaching while an
        // operation is in progress: the operation owns the outcome.
        _ => {}
    }
}

/// First write wins: a pending discontinuity is never overwritten by a
/// later cause.
fn record_pending_discontinuity<C: RealtimeChannel>(
    shared: &Shared<C>,
    state: &mut crate::manager::ManagerState,
    id: ContributorId,
    event: DiscontinuityEvent,
) {
    let annotation = state.annotation_mut(id);
    if annotation.pending_discontinuity.is_some() {
        tracing::debug!(
            room_id = %shared.room_id,
            contributor = %id,
            "pending discontinuity already recorded; dropping newer cause"
        );
    } else {
        annotation.pending_discontinuity = Some(event);
    }
}

fn reason_or_unknown(
    room_id: &str,
    reason: Option<ErrorInfo>,
    event: &'static str,
) -> ErrorInfo {
    reason.unwrap_or_else(|| {
        tracing::warn!(
            %room_id,
            event,
            "state change arrived without a reason; substituting unknown \
             error"
        );
        ErrorInfo::unknown()
    })
}

/// The 5-second grace timer for a transiently disconnected contributor.
///
/// On expiry the timer verifies it is still the timer recorded in the
/// annotation slot — its unique id guards against acting after being
/// replaced — then clears itself and moves the room to attaching with
/// the contributor's reason. Cancellation aborts the task outright.
async fn transient_disconnect_timer<C: RealtimeChannel>(
    shared: Weak<Shared<C>>,
    id: ContributorId,
    timeout_id: u64,
    reason: Option<ErrorInfo>,
) {
    tokio::time::sleep(TRANSIENT_DISCONNECT_TIMEOUT).await;

    let Some(shared) = shared.upgrade() else {
        return;
    };
    let mut state = shared.state.lock().await;

    let annotation = state.annotation_mut(id);
    let still_current = matches!(
        &annotation.transient_disconnect_timeout,
        Some(current) if current.id == timeout_id
    );
    if !still_current {
        return;
    }
    annotation.transient_disconnect_timeout = None;

    tracing::debug!(
        room_id = %shared.room_id,
        contributor = %id,
        timeout = timeout_id,
        "transient disconnect timeout expired"
    );
    state.transition_to(Status::AttachingDueToContributorStateChange {
        cause: reason,
    });
}
