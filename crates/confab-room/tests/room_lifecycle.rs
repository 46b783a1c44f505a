//! Integration tests for the room lifecycle manager, driven through
//! scripted mock channels.
//!
//! Timers (the 5 s transient-disconnect grace period, the 250 ms detach
//! retry spacing) are exercised under paused tokio time, so every test
//! is deterministic and fast.

use std::sync::Arc;
use std::time::Duration;

use confab_events::{BufferingPolicy, Subscription};
use confab_protocol::{ErrorCode, ErrorInfo, RoomFeature};
use confab_realtime::mock::{MockChannel, MockOutcome};
use confab_realtime::{
    ChannelEvent, ChannelState, ChannelStateChange, ContributorChannel,
};
use confab_room::{
    Contributor, RoomLifecycleManager, RoomStatus, RoomStatusChange,
};

// =========================================================================
// Helpers
// =========================================================================

/// A room with two contributors, messages first — attachment order
/// follows contributor order.
fn make_room() -> (
    Arc<RoomLifecycleManager<MockChannel>>,
    Arc<MockChannel>,
    Arc<MockChannel>,
) {
    let messages = Arc::new(MockChannel::new(
        "basketball::$chat::$chatMessages",
        "tester",
    ));
    let presence =
        Arc::new(MockChannel::new("basketball::presence", "tester"));
    let manager = RoomLifecycleManager::new(
        "basketball",
        vec![
            Contributor::new(
                RoomFeature::Messages,
                ContributorChannel::new(Arc::clone(&messages)),
            ),
            Contributor::new(
                RoomFeature::Presence,
                ContributorChannel::new(Arc::clone(&presence)),
            ),
        ],
    );
    (Arc::new(manager), messages, presence)
}

fn suspension_error() -> ErrorInfo {
    ErrorInfo::new(80_003, 500, "channel suspended")
}

fn change(
    current: ChannelState,
    previous: ChannelState,
    event: ChannelEvent,
    resumed: bool,
    reason: Option<ErrorInfo>,
) -> ChannelStateChange {
    ChannelStateChange {
        current,
        previous,
        event,
        resumed,
        reason,
    }
}

/// Lets the manager's monitor tasks and any scheduled operations run.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Consumes status changes until one matches, failing the test if the
/// room never gets there.
async fn wait_for_status(
    changes: &mut Subscription<RoomStatusChange>,
    expected: impl Fn(&RoomStatus) -> bool,
) -> RoomStatusChange {
    tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            let change =
                changes.next().await.expect("status stream ended");
            if expected(&change.current) {
                return change;
            }
        }
    })
    .await
    .expect("room never reached the expected status")
}

// =========================================================================
// Attach: basic cycle and idempotence
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_attach_success_walks_initialized_attaching_attached() {
    let (manager, messages, presence) = make_room();
    let mut changes = manager.on_status_change(BufferingPolicy::Unbounded);

    assert_eq!(manager.status().await, RoomStatus::Initialized);
    manager.attach().await.expect("attach should succeed");

    let first = changes.try_next().expect("attaching change");
    assert_eq!(first.previous, RoomStatus::Initialized);
    assert!(matches!(first.current, RoomStatus::Attaching { cause: None }));

    let second = changes.try_next().expect("attached change");
    assert_eq!(second.current, RoomStatus::Attached);

    assert_eq!(manager.status().await, RoomStatus::Attached);
    assert_eq!(messages.attach_calls(), 1);
    assert_eq!(presence.attach_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_attach_on_attached_is_a_no_op() {
    let (manager, messages, _presence) = make_room();
    manager.attach().await.unwrap();

    manager.attach().await.expect("second attach should succeed");

    // The cycle did not run again.
    assert_eq!(messages.attach_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_attaches_share_one_cycle() {
    let (manager, messages, presence) = make_room();
    messages.queue_attach_outcome(MockOutcome::SuccessAfter(
        Duration::from_secs(1),
    ));

    let first = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.attach().await }
    });
    settle().await;
    let second = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.attach().await }
    });

    tokio::time::advance(Duration::from_secs(2)).await;
    first.await.unwrap().expect("first attach");
    second.await.unwrap().expect("second attach");

    assert_eq!(messages.attach_calls(), 1);
    assert_eq!(presence.attach_calls(), 1);
}

// =========================================================================
// Attach: failure branches
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_attach_failure_into_suspended_schedules_retry() {
    let (manager, _messages, presence) = make_room();
    let mut changes = manager.on_status_change(BufferingPolicy::Unbounded);
    presence.queue_attach_outcome(MockOutcome::Failure {
        error: suspension_error(),
        resulting_state: ChannelState::Suspended,
    });

    let error = manager.attach().await.expect_err("attach should fail");

    assert!(error
        .has_code(ErrorCode::AttachmentFailed(RoomFeature::Presence)));
    assert_eq!(error.cause.as_ref().map(|c| c.code), Some(80_003));

    match manager.status().await {
        RoomStatus::Suspended { cause } => {
            assert!(cause.has_code(ErrorCode::AttachmentFailed(
                RoomFeature::Presence
            )));
        }
        other => panic!("expected suspended, got {other}"),
    }

    // Exactly one public `suspended` change, despite the internal
    // awaiting-start-of-retry / retry-running handover.
    wait_for_status(&mut changes, |s| {
        matches!(s, RoomStatus::Suspended { .. })
    })
    .await;
    settle().await;
    if let Some(next) = changes.try_next() {
        assert!(
            !matches!(next.current, RoomStatus::Suspended { .. }),
            "no duplicate suspended event may be emitted"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_detaches_others_and_reattaches_after_recovery() {
    let (manager, messages, presence) = make_room();
    let mut changes = manager.on_status_change(BufferingPolicy::Unbounded);
    presence.queue_attach_outcome(MockOutcome::Failure {
        error: suspension_error(),
        resulting_state: ChannelState::Suspended,
    });

    manager.attach().await.expect_err("attach should fail");

    // Retry's detach phase covers everything except the triggering
    // contributor, which is awaited instead.
    wait_for_status(&mut changes, |s| matches!(s, RoomStatus::Detached))
        .await;
    assert_eq!(messages.detach_calls(), 1);
    assert_eq!(presence.detach_calls(), 0);

    // The triggering contributor recovers on its own; the retry then
    // re-runs the attachment cycle over every contributor.
    presence.emit_state_change(change(
        ChannelState::Attached,
        ChannelState::Suspended,
        ChannelEvent::Attached,
        false,
        None,
    ));

    wait_for_status(&mut changes, |s| matches!(s, RoomStatus::Attached))
        .await;
    assert_eq!(manager.status().await, RoomStatus::Attached);
    assert_eq!(messages.attach_calls(), 2);
    assert_eq!(presence.attach_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_gives_up_when_triggering_contributor_fails() {
    let (manager, _messages, presence) = make_room();
    let mut changes = manager.on_status_change(BufferingPolicy::Unbounded);
    presence.queue_attach_outcome(MockOutcome::Failure {
        error: suspension_error(),
        resulting_state: ChannelState::Suspended,
    });

    manager.attach().await.expect_err("attach should fail");
    wait_for_status(&mut changes, |s| matches!(s, RoomStatus::Detached))
        .await;

    let fatal = ErrorInfo::new(80_002, 500, "channel failed for good");
    presence.emit_state_change(change(
        ChannelState::Failed,
        ChannelState::Suspended,
        ChannelEvent::Failed,
        false,
        Some(fatal.clone()),
    ));

    let failed = wait_for_status(&mut changes, |s| {
        matches!(s, RoomStatus::Failed { .. })
    })
    .await;
    match failed.current {
        RoomStatus::Failed { cause } => assert_eq!(cause.code, 80_002),
        other => panic!("expected failed, got {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_attach_failure_into_failed_runs_rundown() {
    let (manager, messages, presence) = make_room();
    let mut changes = manager.on_status_change(BufferingPolicy::Unbounded);
    let fatal = ErrorInfo::new(80_002, 500, "channel failed");
    presence.queue_attach_outcome(MockOutcome::Failure {
        error: fatal,
        resulting_state: ChannelState::Failed,
    });

    let error = manager.attach().await.expect_err("attach should fail");
    assert!(error
        .has_code(ErrorCode::AttachmentFailed(RoomFeature::Presence)));

    wait_for_status(&mut changes, |s| {
        matches!(s, RoomStatus::Failed { .. })
    })
    .await;

    // Rundown drains the non-failed contributor and leaves the failed
    // one alone; the room stays failed throughout (no further events).
    settle().await;
    assert_eq!(messages.detach_calls(), 1);
    assert_eq!(presence.detach_calls(), 0);
    assert!(changes.try_next().is_none());
    assert!(matches!(
        manager.status().await,
        RoomStatus::Failed { .. }
    ));
}

// =========================================================================
// Detach
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_detach_walks_detaching_detached() {
    let (manager, messages, presence) = make_room();
    manager.attach().await.unwrap();
    let mut changes = manager.on_status_change(BufferingPolicy::Unbounded);

    manager.detach().await.expect("detach should succeed");

    assert!(matches!(
        changes.try_next().expect("detaching change").current,
        RoomStatus::Detaching
    ));
    assert!(matches!(
        changes.try_next().expect("detached change").current,
        RoomStatus::Detached
    ));
    assert_eq!(messages.detach_calls(), 1);
    assert_eq!(presence.detach_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_detach_on_detached_is_a_no_op() {
    let (manager, messages, _presence) = make_room();
    manager.attach().await.unwrap();
    manager.detach().await.unwrap();

    manager.detach().await.expect("second detach should succeed");

    assert_eq!(messages.detach_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_detach_retries_transient_failures_at_250ms() {
    let (manager, messages, _presence) = make_room();
    manager.attach().await.unwrap();
    messages.queue_detach_outcome(MockOutcome::Failure {
        error: ErrorInfo::new(90_000, 500, "not yet"),
        resulting_state: ChannelState::Attached,
    });

    let started = tokio::time::Instant::now();
    manager.detach().await.expect("detach should eventually succeed");

    // One failed attempt, one 250 ms pause, one successful attempt.
    assert_eq!(messages.detach_calls(), 2);
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert_eq!(manager.status().await, RoomStatus::Detached);
}

#[tokio::test(start_paused = true)]
async fn test_detach_records_first_failed_contributor_and_continues() {
    let (manager, messages, presence) = make_room();
    manager.attach().await.unwrap();
    messages.queue_detach_outcome(MockOutcome::Failure {
        error: ErrorInfo::new(90_001, 500, "gone for good"),
        resulting_state: ChannelState::Failed,
    });

    let error = manager.detach().await.expect_err("detach should fail");

    assert!(error
        .has_code(ErrorCode::DetachmentFailed(RoomFeature::Messages)));
    assert_eq!(error.cause.as_ref().map(|c| c.code), Some(90_001));
    // The cycle went on to the second contributor regardless.
    assert_eq!(presence.detach_calls(), 1);
    assert!(matches!(
        manager.status().await,
        RoomStatus::Failed { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_detach_on_failed_room_is_rejected() {
    let (manager, messages, _presence) = make_room();
    manager.attach().await.unwrap();

    messages.emit_state_change(change(
        ChannelState::Failed,
        ChannelState::Attached,
        ChannelEvent::Failed,
        false,
        Some(ErrorInfo::new(80_002, 500, "broken")),
    ));
    settle().await;

    let error = manager.detach().await.expect_err("detach should fail");
    assert!(error.has_code(ErrorCode::RoomInFailedState));
}

// =========================================================================
// Release
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_release_from_initialized_is_immediate() {
    let (manager, messages, presence) = make_room();
    let mut changes = manager.on_status_change(BufferingPolicy::Unbounded);

    manager.release().await;

    assert_eq!(manager.status().await, RoomStatus::Released);
    assert!(matches!(
        changes.try_next().expect("released change").current,
        RoomStatus::Released
    ));
    // No channel was touched.
    assert_eq!(messages.detach_calls(), 0);
    assert_eq!(presence.detach_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_release_on_released_is_a_no_op() {
    let (manager, _messages, _presence) = make_room();
    manager.release().await;
    let mut changes = manager.on_status_change(BufferingPolicy::Unbounded);

    manager.release().await;

    assert!(changes.try_next().is_none());
    assert_eq!(manager.status().await, RoomStatus::Released);
}

#[tokio::test(start_paused = true)]
async fn test_release_drains_attached_contributors() {
    let (manager, messages, presence) = make_room();
    manager.attach().await.unwrap();

    manager.release().await;

    assert_eq!(manager.status().await, RoomStatus::Released);
    assert_eq!(messages.detach_calls(), 1);
    assert_eq!(presence.detach_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_release_skips_failed_contributors() {
    let (manager, messages, presence) = make_room();
    manager.attach().await.unwrap();
    messages.set_state(
        ChannelState::Failed,
        Some(ErrorInfo::new(80_002, 500, "broken")),
    );

    manager.release().await;

    assert_eq!(manager.status().await, RoomStatus::Released);
    assert_eq!(messages.detach_calls(), 0);
    assert_eq!(presence.detach_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_release_waits_for_in_progress_attach() {
    let (manager, messages, _presence) = make_room();
    let mut changes = manager.on_status_change(BufferingPolicy::Unbounded);
    messages.queue_attach_outcome(MockOutcome::SuccessAfter(
        Duration::from_secs(2),
    ));

    let attach = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.attach().await }
    });
    settle().await;
    assert!(matches!(
        manager.status().await,
        RoomStatus::Attaching { .. }
    ));

    let release = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.release().await }
    });
    settle().await;
    // Release is parked behind the attach operation.
    assert!(matches!(
        manager.status().await,
        RoomStatus::Attaching { .. }
    ));

    tokio::time::advance(Duration::from_secs(3)).await;
    attach
        .await
        .unwrap()
        .expect("attach completes with its own result");
    release.await.unwrap();

    let statuses: Vec<RoomStatus> = std::iter::from_fn(|| {
        changes.try_next().map(|c| c.current)
    })
    .collect();
    assert!(matches!(statuses[0], RoomStatus::Attaching { .. }));
    assert_eq!(statuses[1], RoomStatus::Attached);
    assert_eq!(statuses[2], RoomStatus::Releasing);
    assert_eq!(statuses[3], RoomStatus::Released);
}

#[tokio::test(start_paused = true)]
async fn test_operations_rejected_while_releasing_and_after_release() {
    let (manager, messages, _presence) = make_room();
    manager.attach().await.unwrap();
    messages.queue_detach_outcome(MockOutcome::SuccessAfter(
        Duration::from_secs(2),
    ));

    let release = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.release().await }
    });
    settle().await;
    assert_eq!(manager.status().await, RoomStatus::Releasing);

    let attach_err =
        manager.attach().await.expect_err("attach during release");
    assert!(attach_err.has_code(ErrorCode::RoomIsReleasing));
    let detach_err =
        manager.detach().await.expect_err("detach during release");
    assert!(detach_err.has_code(ErrorCode::RoomIsReleasing));

    tokio::time::advance(Duration::from_secs(3)).await;
    release.await.unwrap();

    let attach_err =
        manager.attach().await.expect_err("attach after release");
    assert!(attach_err.has_code(ErrorCode::RoomIsReleased));
    let detach_err =
        manager.detach().await.expect_err("detach after release");
    assert!(detach_err.has_code(ErrorCode::RoomIsReleased));
}

#[tokio::test(start_paused = true)]
async fn test_released_room_ignores_later_channel_events() {
    let (manager, messages, _presence) = make_room();
    manager.attach().await.unwrap();
    manager.release().await;
    let mut changes = manager.on_status_change(BufferingPolicy::Unbounded);

    messages.emit_state_change(change(
        ChannelState::Suspended,
        ChannelState::Detached,
        ChannelEvent::Suspended,
        false,
        Some(suspension_error()),
    ));
    settle().await;

    assert!(changes.try_next().is_none());
    assert_eq!(manager.status().await, RoomStatus::Released);
}

// =========================================================================
// Transient disconnect timeout
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_transient_disconnect_expires_into_attaching() {
    let (manager, messages, _presence) = make_room();
    manager.attach().await.unwrap();
    let mut changes = manager.on_status_change(BufferingPolicy::Unbounded);

    let reason = ErrorInfo::new(80_017, 500, "connection interrupted");
    messages.emit_state_change(change(
        ChannelState::Attaching,
        ChannelState::Attached,
        ChannelEvent::Attaching,
        false,
        Some(reason),
    ));
    settle().await;

    // Within the grace period nothing is surfaced.
    tokio::time::advance(Duration::from_secs(4)).await;
    settle().await;
    assert!(changes.try_next().is_none());
    assert_eq!(manager.status().await, RoomStatus::Attached);

    // At 5 s the room degrades to attaching, carrying the reason.
    tokio::time::advance(Duration::from_secs(2)).await;
    settle().await;
    let degraded = changes.try_next().expect("attaching change");
    match degraded.current {
        RoomStatus::Attaching { cause } => {
            assert_eq!(cause.map(|c| c.code), Some(80_017));
        }
        other => panic!("expected attaching, got {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_reattach_within_grace_period_emits_nothing() {
    let (manager, messages, _presence) = make_room();
    manager.attach().await.unwrap();
    let mut changes = manager.on_status_change(BufferingPolicy::Unbounded);

    messages.emit_state_change(change(
        ChannelState::Attaching,
        ChannelState::Attached,
        ChannelEvent::Attaching,
        false,
        None,
    ));
    settle().await;
    tokio::time::advance(Duration::from_secs(2)).await;
    messages.emit_state_change(change(
        ChannelState::Attached,
        ChannelState::Attaching,
        ChannelEvent::Attached,
        true,
        None,
    ));
    settle().await;

    tokio::time::advance(Duration::from_secs(10)).await;
    settle().await;
    assert!(changes.try_next().is_none());
    assert_eq!(manager.status().await, RoomStatus::Attached);
}

// =========================================================================
// Pending discontinuities
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_discontinuity_during_operation_is_deferred() {
    let (manager, messages, _presence) = make_room();

    // First attachment; mark the contributor as having been attached.
    manager.attach().await.unwrap();
    messages.emit_state_change(change(
        ChannelState::Attached,
        ChannelState::Attached,
        ChannelEvent::Attached,
        true,
        None,
    ));
    settle().await;
    manager.detach().await.unwrap();

    let contributor = manager
        .contributor(RoomFeature::Messages)
        .expect("messages contributor");
    let mut discontinuities =
        contributor.on_discontinuity(BufferingPolicy::Unbounded);

    // Second attach is held open while the update arrives.
    messages.queue_attach_outcome(MockOutcome::SuccessAfter(
        Duration::from_secs(1),
    ));
    let attach = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.attach().await }
    });
    settle().await;

    messages.emit_state_change(change(
        ChannelState::Attached,
        ChannelState::Attached,
        ChannelEvent::Update,
        false,
        Some(ErrorInfo::new(50_000, 500, "continuity lost")),
    ));
    settle().await;
    assert!(
        discontinuities.try_next().is_none(),
        "no discontinuity may surface while the operation runs"
    );

    tokio::time::advance(Duration::from_secs(2)).await;
    attach.await.unwrap().expect("attach should succeed");

    let event = discontinuities
        .try_next()
        .expect("deferred discontinuity surfaces after attachment");
    assert_eq!(event.error.map(|e| e.code), Some(50_000));
    assert!(
        discontinuities.try_next().is_none(),
        "the discontinuity is emitted exactly once"
    );
}

#[tokio::test(start_paused = true)]
async fn test_discontinuity_outside_operation_is_immediate() {
    let (manager, messages, _presence) = make_room();
    manager.attach().await.unwrap();
    messages.emit_state_change(change(
        ChannelState::Attached,
        ChannelState::Attached,
        ChannelEvent::Attached,
        true,
        None,
    ));
    settle().await;

    let contributor = manager
        .contributor(RoomFeature::Messages)
        .expect("messages contributor");
    let mut discontinuities =
        contributor.on_discontinuity(BufferingPolicy::Unbounded);

    messages.emit_state_change(change(
        ChannelState::Attached,
        ChannelState::Attached,
        ChannelEvent::Update,
        false,
        Some(ErrorInfo::new(50_001, 500, "continuity lost")),
    ));
    settle().await;

    let event = discontinuities.try_next().expect("immediate emission");
    assert_eq!(event.error.map(|e| e.code), Some(50_001));
}

#[tokio::test(start_paused = true)]
async fn test_resumed_update_is_not_a_discontinuity() {
    let (manager, messages, _presence) = make_room();
    manager.attach().await.unwrap();
    messages.emit_state_change(change(
        ChannelState::Attached,
        ChannelState::Attached,
        ChannelEvent::Attached,
        true,
        None,
    ));
    settle().await;

    let contributor = manager
        .contributor(RoomFeature::Messages)
        .expect("messages contributor");
    let mut discontinuities =
        contributor.on_discontinuity(BufferingPolicy::Unbounded);

    messages.emit_state_change(change(
        ChannelState::Attached,
        ChannelState::Attached,
        ChannelEvent::Update,
        true,
        None,
    ));
    settle().await;

    assert!(discontinuities.try_next().is_none());
}

// =========================================================================
// Spontaneous channel failure / suspension (no operation in progress)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_spontaneous_failure_fails_room_and_drains_channels() {
    let (manager, messages, presence) = make_room();
    manager.attach().await.unwrap();
    let mut changes = manager.on_status_change(BufferingPolicy::Unbounded);

    messages.emit_state_change(change(
        ChannelState::Failed,
        ChannelState::Attached,
        ChannelEvent::Failed,
        false,
        Some(ErrorInfo::new(80_002, 500, "broken")),
    ));
    settle().await;

    let failed = changes.try_next().expect("failed change");
    match failed.current {
        RoomStatus::Failed { cause } => assert_eq!(cause.code, 80_002),
        other => panic!("expected failed, got {other}"),
    }
    // Best-effort drain covered every contributor.
    assert_eq!(messages.detach_calls(), 1);
    assert_eq!(presence.detach_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_spontaneous_suspension_without_reason_gets_unknown_cause() {
    let (manager, messages, _presence) = make_room();
    manager.attach().await.unwrap();
    let mut changes = manager.on_status_change(BufferingPolicy::Unbounded);

    messages.emit_state_change(change(
        ChannelState::Suspended,
        ChannelState::Attached,
        ChannelEvent::Suspended,
        false,
        None,
    ));
    settle().await;

    let suspended = wait_for_status(&mut changes, |s| {
        matches!(s, RoomStatus::Suspended { .. })
    })
    .await;
    match suspended.current {
        RoomStatus::Suspended { cause } => {
            assert!(cause.has_code(ErrorCode::UnknownError));
        }
        other => panic!("expected suspended, got {other}"),
    }
}

// =========================================================================
// Presence-readiness gate
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_gate_passes_when_attached() {
    let (manager, _messages, _presence) = make_room();
    manager.attach().await.unwrap();

    manager
        .wait_to_be_able_to_perform_presence_operations(
            RoomFeature::Presence,
        )
        .await
        .expect("gate should pass on an attached room");
}

#[tokio::test(start_paused = true)]
async fn test_gate_waits_out_attaching_and_passes_on_attached() {
    let (manager, messages, _presence) = make_room();
    messages.queue_attach_outcome(MockOutcome::SuccessAfter(
        Duration::from_secs(1),
    ));
    let attach = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.attach().await }
    });
    settle().await;

    let gate = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move {
            manager
                .wait_to_be_able_to_perform_presence_operations(
                    RoomFeature::Presence,
                )
                .await
        }
    });
    settle().await;

    tokio::time::advance(Duration::from_secs(2)).await;
    attach.await.unwrap().unwrap();
    gate.await
        .unwrap()
        .expect("gate should pass once the room attaches");
}

#[tokio::test(start_paused = true)]
async fn test_gate_fails_when_attaching_ends_elsewhere() {
    let (manager, messages, presence) = make_room();
    messages.queue_attach_outcome(MockOutcome::SuccessAfter(
        Duration::from_secs(1),
    ));
    presence.queue_attach_outcome(MockOutcome::Failure {
        error: ErrorInfo::new(80_002, 500, "channel failed"),
        resulting_state: ChannelState::Failed,
    });

    let attach = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.attach().await }
    });
    settle().await;

    let gate = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move {
            manager
                .wait_to_be_able_to_perform_presence_operations(
                    RoomFeature::Presence,
                )
                .await
        }
    });
    settle().await;

    tokio::time::advance(Duration::from_secs(2)).await;
    attach.await.unwrap().expect_err("attach fails");

    let error = gate.await.unwrap().expect_err("gate fails");
    assert!(error.has_code(
        ErrorCode::RoomTransitionedToInvalidStateForPresenceOperation
    ));
    // The room's failed cause rides along.
    let cause = error.cause.expect("cause attached");
    assert!(cause.has_code(ErrorCode::AttachmentFailed(
        RoomFeature::Presence
    )));
}

#[tokio::test(start_paused = true)]
async fn test_gate_rejects_other_statuses_outright() {
    let (manager, _messages, _presence) = make_room();

    // Initialized.
    let error = manager
        .wait_to_be_able_to_perform_presence_operations(
            RoomFeature::Typing,
        )
        .await
        .expect_err("gate should reject an initialized room");
    assert!(error.has_code(
        ErrorCode::PresenceOperationRequiresRoomAttach(RoomFeature::Typing)
    ));
    assert_eq!(error.status_code, 400);

    // Released.
    manager.release().await;
    let error = manager
        .wait_to_be_able_to_perform_presence_operations(
            RoomFeature::Presence,
        )
        .await
        .expect_err("gate should reject a released room");
    assert!(error.has_code(
        ErrorCode::PresenceOperationRequiresRoomAttach(
            RoomFeature::Presence
        )
    ));
}
