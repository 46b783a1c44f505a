//! Broadcast primitive for Confab.
//!
//! A [`Broadcaster`] fans events out to any number of [`Subscription`]s.
//! Emission is synchronous — by the time `emit` returns, the event sits in
//! every live subscriber's queue — while consumption is asynchronous, one
//! event at a time via [`Subscription::next`].
//!
//! Each subscriber chooses its own [`BufferingPolicy`]:
//!
//! - **Unbounded** — the queue grows without limit. Used where losing an
//!   event is worse than memory growth (room status changes).
//! - **Bounded(n)** — at most `n` queued events; on overflow the *oldest*
//!   queued event is dropped. Used by consumers that only care about
//!   recent history (occupancy metrics, typing sets).
//!
//! # Ordering
//!
//! Events emitted by a single producer are observed by every subscriber
//! in emission order. A subscription receives every event emitted after
//! it was created until it is unsubscribed; after [`Subscription::
//! unsubscribe`] (which is idempotent) later emissions are dropped.
//!
//! ```text
//! Broadcaster ──emit──▶ [queue per subscriber] ──next().await──▶ consumer
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::Notify;

/// Counter for generating unique subscription ids.
static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// BufferingPolicy
// ---------------------------------------------------------------------------

/// How a subscriber's queue behaves when the consumer falls behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferingPolicy {
    /// Queue grows without limit; no events are ever dropped.
    Unbounded,

    /// At most `n` queued events. On overflow the oldest queued event is
    /// dropped to make room for the newest.
    Bounded(usize),
}

// ---------------------------------------------------------------------------
// Internal queue state
// ---------------------------------------------------------------------------

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
    /// Events discarded by the bounded drop-oldest policy.
    dropped: u64,
}

struct SubscriberQueue<T> {
    id: u64,
    policy: BufferingPolicy,
    state: Mutex<QueueState<T>>,
    notify: Notify,
}

impl<T> SubscriberQueue<T> {
    fn push(&self, item: T) {
        let mut state = self.state.lock().expect("queue lock poisoned");
        if state.closed {
            return;
        }
        if let BufferingPolicy::Bounded(cap) = self.policy {
            // A zero-capacity queue would drop everything; treat it as 1.
            let cap = cap.max(1);
            while state.items.len() >= cap {
                state.items.pop_front();
                state.dropped += 1;
                tracing::trace!(
                    subscription = self.id,
                    dropped = state.dropped,
                    "bounded subscription overflow — dropping oldest"
                );
            }
        }
        state.items.push_back(item);
        drop(state);
        self.notify.notify_one();
    }

    fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
            state.items.clear();
        }
        self.notify.notify_one();
    }
}

struct Registry<T> {
    subscribers: Mutex<Vec<Arc<SubscriberQueue<T>>>>,
}

impl<T> Drop for Registry<T> {
    fn drop(&mut self) {
        // Last broadcaster gone: wake every consumer with end-of-stream.
        if let Ok(subscribers) = self.subscribers.lock() {
            for queue in subscribers.iter() {
                queue.close();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

/// The producer half: fans each emitted event out to all live
/// subscriptions.
///
/// Cheap to clone; all clones share one subscriber registry. When the
/// last clone drops, every outstanding subscription's stream ends.
pub struct Broadcaster<T> {
    registry: Arc<Registry<T>>,
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Broadcaster<T> {
    /// Delivers `event` to every live subscription, synchronously.
    pub fn emit(&self, event: T) {
        let subscribers = self
            .registry
            .subscribers
            .lock()
            .expect("registry lock poisoned");
        for queue in subscribers.iter() {
            queue.push(event.clone());
        }
    }
}

impl<T> Broadcaster<T> {
    /// Creates a broadcaster with no subscribers.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Registers a new subscriber with the given buffering policy.
    ///
    /// The subscription observes every event emitted after this call
    /// returns.
    pub fn subscribe(&self, policy: BufferingPolicy) -> Subscription<T> {
        let queue = Arc::new(SubscriberQueue {
            id: NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed),
            policy,
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
                dropped: 0,
            }),
            notify: Notify::new(),
        });
        self.registry
            .subscribers
            .lock()
            .expect("registry lock poisoned")
            .push(Arc::clone(&queue));
        Subscription {
            queue,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.registry
            .subscribers
            .lock()
            .expect("registry lock poisoned")
            .len()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// The consumer half: a lazy sequence of events.
///
/// Dropping a subscription unsubscribes it.
pub struct Subscription<T> {
    queue: Arc<SubscriberQueue<T>>,
    registry: Weak<Registry<T>>,
}

impl<T> Subscription<T> {
    /// Waits for the next event.
    ///
    /// Returns `None` once the subscription has been unsubscribed or the
    /// last broadcaster has been dropped and the queue is drained.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            // Register interest before inspecting the queue, so an emit
            // racing with this check cannot be missed.
            let notified = self.queue.notify.notified();
            {
                let mut state =
                    self.queue.state.lock().expect("queue lock poisoned");
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Pops the next event without waiting. Returns `None` when the
    /// queue is currently empty (closed or not).
    pub fn try_next(&mut self) -> Option<T> {
        self.queue
            .state
            .lock()
            .expect("queue lock poisoned")
            .items
            .pop_front()
    }

    /// Tears down this subscription. Later emissions are no longer
    /// delivered to it. Idempotent.
    pub fn unsubscribe(&mut self) {
        self.queue.close();
        if let Some(registry) = self.registry.upgrade() {
            registry
                .subscribers
                .lock()
                .expect("registry lock poisoned")
                .retain(|q| q.id != self.queue.id);
        }
    }

    /// Events discarded so far by the bounded drop-oldest policy.
    pub fn dropped(&self) -> u64 {
        self.queue
            .state
            .lock()
            .expect("queue lock poisoned")
            .dropped
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
