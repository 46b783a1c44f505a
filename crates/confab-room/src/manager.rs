//! The room lifecycle manager: public operations and shared state.
//!
//! # Concurrency model
//!
//! The manager behaves as a single-threaded cooperative executor over
//! its state. Everything mutable lives in one `tokio::sync::Mutex`; the
//! lock is held across every synchronous segment (status transitions,
//! timeout clearing, waiter registration) and released across every
//! suspension point (channel attach/detach, retry sleeps, waiting on
//! another operation). Because waiter registration and operation
//! completion both run under the lock, a waiter enqueued by one segment
//! is guaranteed to be present before any later completion can run.
//!
//! Background tasks (contributor monitors, transient-disconnect timers,
//! scheduled Retry/Rundown operations) hold only a `Weak` reference to
//! the shared state, so they cannot keep a dropped manager alive; the
//! unbounded detach/release retry loops additionally check a teardown
//! flag each iteration so they stop once the manager is gone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use confab_events::{Broadcaster, BufferingPolicy, Subscription};
use confab_protocol::{ErrorCode, ErrorInfo, RoomFeature};
use confab_realtime::RealtimeChannel;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::contributor::{Contributor, ContributorAnnotation, ContributorId};
use crate::handler::monitor_contributor;
use crate::operations::AttachTrigger;
use crate::status::{OperationId, RoomStatus, RoomStatusChange, Status};

pub(crate) type OperationResult = Result<(), ErrorInfo>;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub(crate) struct Shared<C> {
    pub(crate) room_id: String,
    /// Fixed at construction; never added to or removed from.
    pub(crate) contributors: Vec<Contributor<C>>,
    pub(crate) status_events: Broadcaster<RoomStatusChange>,
    pub(crate) state: Mutex<ManagerState>,
    /// Set when the manager is dropped; the unbounded retry loops check
    /// it so they don't outlive the manager.
    pub(crate) tearing_down: AtomicBool,
}

impl<C> Shared<C> {
    pub(crate) fn is_tearing_down(&self) -> bool {
        self.tearing_down.load(Ordering::Relaxed)
    }
}

pub(crate) struct ManagerState {
    room_id: String,
    pub(crate) status: Status,
    pub(crate) annotations: HashMap<ContributorId, ContributorAnnotation>,
    operation_waiters:
        HashMap<OperationId, Vec<oneshot::Sender<OperationResult>>>,
    status_events: Broadcaster<RoomStatusChange>,
}

impl ManagerState {
    /// Replaces the internal status, emitting a public status change iff
    /// the public mapping changed.
    pub(crate) fn transition_to(&mut self, new: Status) {
        let previous = self.status.room_status();
        tracing::debug!(
            room_id = %self.room_id,
            from = ?self.status,
            to = ?new,
            "status transition"
        );
        self.status = new;
        let current = self.status.room_status();
        if !current.same_case(&previous) {
            tracing::info!(
                room_id = %self.room_id,
                from = %previous,
                to = %current,
                "room status changed"
            );
            self.status_events.emit(RoomStatusChange { current, previous });
        }
    }

    /// Registers a continuation on the operation with id `waited`. The
    /// receiver resolves with a copy of that operation's result, after
    /// the operation has published its final status transition.
    pub(crate) fn register_waiter(
        &mut self,
        waited: OperationId,
        waiting: OperationId,
    ) -> oneshot::Receiver<OperationResult> {
        tracing::debug!(
            room_id = %self.room_id,
            %waited,
            %waiting,
            "operation waiting on another"
        );
        let (tx, rx) = oneshot::channel();
        self.operation_waiters.entry(waited).or_default().push(tx);
        rx
    }

    /// Delivers `result` to every waiter registered on `id`, in
    /// registration order, and forgets the entry.
    pub(crate) fn operation_did_complete(
        &mut self,
        id: OperationId,
        result: &OperationResult,
    ) {
        if let Some(waiters) = self.operation_waiters.remove(&id) {
            tracing::debug!(
                room_id = %self.room_id,
                operation = %id,
                waiters = waiters.len(),
                ok = result.is_ok(),
                "delivering operation result to waiters"
            );
            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }
        }
    }

    /// Cancels one contributor's transient-disconnect timer, if any.
    pub(crate) fn clear_transient_disconnect_timeout(
        &mut self,
        id: ContributorId,
    ) {
        if let Some(annotation) = self.annotations.get_mut(&id) {
            if let Some(timeout) =
                annotation.transient_disconnect_timeout.take()
            {
                tracing::debug!(
                    room_id = %self.room_id,
                    contributor = %id,
                    timeout = timeout.id,
                    "cancelling transient disconnect timeout"
                );
                timeout.cancel();
            }
        }
    }

    /// Cancels every contributor's transient-disconnect timer.
    pub(crate) fn clear_all_transient_disconnect_timeouts(&mut self) {
        let ids: Vec<ContributorId> =
            self.annotations.keys().copied().collect();
        for id in ids {
            self.clear_transient_disconnect_timeout(id);
        }
    }

    pub(crate) fn annotation_mut(
        &mut self,
        id: ContributorId,
    ) -> &mut ContributorAnnotation {
        self.annotations
            .get_mut(&id)
            .expect("annotations cover every contributor")
    }
}

// ---------------------------------------------------------------------------
// RoomLifecycleManager
// ---------------------------------------------------------------------------

/// Coordinates a fixed set of channel contributors into one coherent
/// room lifecycle.
///
/// All operations are safe to call concurrently; internally they are
/// serialized onto the manager's state lock, and operations that must
/// not overlap wait for each other through the operation-waiter
/// machinery.
pub struct RoomLifecycleManager<C: RealtimeChannel> {
    shared: Arc<Shared<C>>,
    monitor_tasks: Vec<JoinHandle<()>>,
}

impl<C: RealtimeChannel> RoomLifecycleManager<C> {
    /// Creates a manager over the given contributors and starts
    /// listening to their state-change streams.
    pub fn new(
        room_id: impl Into<String>,
        contributors: Vec<Contributor<C>>,
    ) -> Self {
        let room_id = room_id.into();
        let status_events = Broadcaster::new();
        let annotations = contributors
            .iter()
            .map(|c| (c.id(), ContributorAnnotation::default()))
            .collect();

        // Subscribe before spawning the monitors so no state change
        // emitted after construction can be missed.
        let subscriptions: Vec<_> = contributors
            .iter()
            .map(|c| c.channel().subscribe_state())
            .collect();

        let shared = Arc::new(Shared {
            room_id: room_id.clone(),
            contributors,
            status_events: status_events.clone(),
            state: Mutex::new(ManagerState {
                room_id: room_id.clone(),
                status: Status::Initialized,
                annotations,
                operation_waiters: HashMap::new(),
                status_events,
            }),
            tearing_down: AtomicBool::new(false),
        });

        let monitor_tasks = subscriptions
            .into_iter()
            .enumerate()
            .map(|(index, subscription)| {
                tokio::spawn(monitor_contributor(
                    Arc::downgrade(&shared),
                    index,
                    subscription,
                ))
            })
            .collect();

        tracing::debug!(
            %room_id,
            contributors = shared.contributors.len(),
            "room lifecycle manager created"
        );

        Self {
            shared,
            monitor_tasks,
        }
    }

    /// The room this manager belongs to.
    pub fn room_id(&self) -> &str {
        &self.shared.room_id
    }

    /// The contributors, in attachment order.
    pub fn contributors(&self) -> &[Contributor<C>] {
        &self.shared.contributors
    }

    /// Looks up the contributor for a feature, if that feature is
    /// enabled on this room.
    pub fn contributor(&self, feature: RoomFeature) -> Option<&Contributor<C>> {
        self.shared
            .contributors
            .iter()
            .find(|c| c.feature() == feature)
    }

    /// Snapshot of the current public room status.
    pub async fn status(&self) -> RoomStatus {
        self.shared.state.lock().await.status.room_status()
    }

    /// Subscribes to public room-status changes. Changes are delivered
    /// in transition order.
    pub fn on_status_change(
        &self,
        policy: BufferingPolicy,
    ) -> Subscription<RoomStatusChange> {
        self.shared.status_events.subscribe(policy)
    }

    // -- Attach ------------------------------------------------------------

    /// Attaches the room: runs the attachment cycle over every
    /// contributor, in order.
    ///
    /// Idempotent when already attached. Fails with `roomIsReleasing` /
    /// `roomIsReleased` in those statuses; otherwise waits for any
    /// operation already in progress before starting.
    pub async fn attach(&self) -> Result<(), ErrorInfo> {
        let operation_id = OperationId::next();
        let mut state = self.shared.state.lock().await;

        loop {
            match &state.status {
                Status::Attached => return Ok(()),
                Status::Releasing { .. } => {
                    return Err(ErrorInfo::from_code(
                        ErrorCode::RoomIsReleasing,
                    ))
                }
                Status::Released => {
                    return Err(ErrorInfo::from_code(
                        ErrorCode::RoomIsReleased,
                    ))
                }
                _ => {}
            }
            match state.status.operation_id() {
                Some(in_progress) => {
                    let waiter =
                        state.register_waiter(in_progress, operation_id);
                    drop(state);
                    // The prior operation's own result does not change
                    // what this attach does next.
                    let _ = waiter.await;
                    state = self.shared.state.lock().await;
                }
                None => break,
            }
        }

        let result = self
            .shared
            .attachment_cycle(
                state,
                AttachTrigger::AttachOperation { operation_id },
            )
            .await;

        let mut state = self.shared.state.lock().await;
        state.operation_did_complete(operation_id, &result);
        result
    }

    // -- Detach ------------------------------------------------------------

    /// Detaches the room: cancels all transient-disconnect timers and
    /// runs the detachment cycle over every contributor.
    ///
    /// Idempotent when already detached. Fails with `roomIsReleasing`,
    /// `roomIsReleased`, or `roomInFailedState`.
    pub async fn detach(&self) -> Result<(), ErrorInfo> {
        let operation_id = OperationId::next();
        let mut state = self.shared.state.lock().await;

        match &state.status {
            Status::Detached
            | Status::DetachedDueToRetryOperation { .. } => return Ok(()),
            Status::Releasing { .. } => {
                return Err(ErrorInfo::from_code(ErrorCode::RoomIsReleasing))
            }
            Status::Released => {
                return Err(ErrorInfo::from_code(ErrorCode::RoomIsReleased))
            }
            Status::Failed { .. }
            | Status::FailedAwaitingStartOfRundownOperation { .. }
            | Status::FailedAndPerformingRundownOperation { .. } => {
                return Err(ErrorInfo::from_code(
                    ErrorCode::RoomInFailedState,
                ))
            }
            _ => {}
        }

        state.clear_all_transient_disconnect_timeouts();
        state.transition_to(Status::Detaching { operation_id });
        drop(state);

        let result = self
            .shared
            .detachment_cycle(crate::operations::DetachTrigger::UserDetach)
            .await;

        let mut state = self.shared.state.lock().await;
        state.operation_did_complete(operation_id, &result);
        result
    }

    // -- Release -----------------------------------------------------------

    /// Releases the room: waits out any in-progress operation, drains
    /// every contributor, and settles in `released`. Never fails.
    ///
    /// From `initialized` or any detached status the transition is
    /// immediate; on `released` this is a no-op.
    pub async fn release(&self) {
        let operation_id = OperationId::next();
        let mut state = self.shared.state.lock().await;

        loop {
            match &state.status {
                Status::Released => return,
                Status::Initialized
                | Status::Detached
                | Status::DetachedDueToRetryOperation { .. } => {
                    state.transition_to(Status::Released);
                    return;
                }
                _ => {}
            }
            match state.status.operation_id() {
                Some(in_progress) => {
                    let waiter =
                        state.register_waiter(in_progress, operation_id);
                    drop(state);
                    let _ = waiter.await;
                    state = self.shared.state.lock().await;
                }
                None => break,
            }
        }

        state.clear_all_transient_disconnect_timeouts();
        state.transition_to(Status::Releasing { operation_id });
        drop(state);

        self.shared.release_cycle().await;

        let mut state = self.shared.state.lock().await;
        state.transition_to(Status::Released);
        state.operation_did_complete(operation_id, &Ok(()));
    }

    // -- Presence-readiness gate -------------------------------------------

    /// The gate every presence-touching feature call passes through.
    ///
    /// Returns immediately when the room is attached. When the room is
    /// attaching, waits for exactly one status change: reaching
    /// `attached` succeeds, anything else fails with
    /// `roomTransitionedToInvalidStateForPresenceOperation`. In any
    /// other status, fails with `presenceOperationRequiresRoomAttach`.
    pub async fn wait_to_be_able_to_perform_presence_operations(
        &self,
        feature: RoomFeature,
    ) -> Result<(), ErrorInfo> {
        let state = self.shared.state.lock().await;
        match state.status.room_status() {
            RoomStatus::Attached => Ok(()),
            RoomStatus::Attaching { .. } => {
                // Subscribing under the lock pins the subscription to
                // the status we just observed: the next emission is the
                // next transition.
                let mut changes = self
                    .shared
                    .status_events
                    .subscribe(BufferingPolicy::Unbounded);
                drop(state);

                match changes.next().await {
                    Some(RoomStatusChange {
                        current: RoomStatus::Attached,
                        ..
                    }) => Ok(()),
                    Some(RoomStatusChange { current, .. }) => {
                        let code = ErrorCode::RoomTransitionedToInvalidStateForPresenceOperation;
                        Err(match current {
                            RoomStatus::Failed { cause }
                            | RoomStatus::Suspended { cause } => {
                                ErrorInfo::with_cause(code, cause)
                            }
                            _ => ErrorInfo::from_code(code),
                        })
                    }
                    None => Err(ErrorInfo::from_code(
                        ErrorCode::RoomTransitionedToInvalidStateForPresenceOperation,
                    )),
                }
            }
            _ => Err(ErrorInfo::from_code(
                ErrorCode::PresenceOperationRequiresRoomAttach(feature),
            )),
        }
    }
}

impl<C: RealtimeChannel> Drop for RoomLifecycleManager<C> {
    fn drop(&mut self) {
        self.shared.tearing_down.store(true, Ordering::Relaxed);
        for task in &self.monitor_tasks {
            task.abort();
        }
        // Best effort: if the lock is free, stop the grace timers now
        // rather than letting them expire against a dead manager.
        if let Ok(mut state) = self.shared.state.try_lock() {
            state.clear_all_transient_disconnect_timeouts();
        }
        tracing::debug!(
            room_id = %self.shared.room_id,
            "room lifecycle manager dropped"
        );
    }
}

// =========================================================================
// Tests (internal bookkeeping; the public surface is covered by the
// integration tests)
// =========================================================================
