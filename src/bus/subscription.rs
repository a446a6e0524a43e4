//! Subscription handle and per-subscriber queue
//!
//! ```text
//!   subscribe()           begin_drain() / eviction          close()
//!  ───────────► Active ─────────────────────────► Draining ─────────► Closed
//!                 │                                                    ▲
//!                 └──────────── close() (abrupt disconnect) ───────────┘
//! ```
//!
//! The queue and the state live behind one mutex, so an enqueue can never
//! land after the subscription has left `Active`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::config::SlowConsumerPolicy;
use super::notification::Notification;
use super::registry::EventBus;

/// Unique identifier for one registration
///
/// Allocated from a monotonically increasing counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl SubscriptionId {
    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Lifecycle state of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Accepting and delivering notifications
    Active,
    /// No new notifications accepted; queued ones may still be read
    Draining,
    /// Terminal; removed from the bus
    Closed,
}

/// Result of offering a notification to one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Enqueue {
    /// Queued with room to spare
    Queued,
    /// Queue was full; the oldest entry was discarded
    DroppedOldest {
        /// First drop since the consumer last caught up
        started_lagging: bool,
    },
    /// Queue was full; the subscriber was moved to `Draining` and its queue discarded
    Evicted,
    /// Subscriber is no longer `Active`
    Rejected,
}

enum Next {
    Item(Arc<Notification>),
    Empty,
    Finished,
}

struct QueueState {
    state: SubscriptionState,
    buffer: VecDeque<Arc<Notification>>,
    dropped: u64,
    lagging: bool,
}

/// State shared between the owning handle and the bus registry
pub(crate) struct SubscriptionShared {
    id: SubscriptionId,
    capacity: usize,
    queue: Mutex<QueueState>,
    notify: Notify,
}

impl SubscriptionShared {
    pub(crate) fn new(id: SubscriptionId, capacity: usize) -> Self {
        // `BusConfig` fields are public, so the builder floor is not guaranteed
        let capacity = capacity.max(1);
        Self {
            id,
            capacity,
            queue: Mutex::new(QueueState {
                state: SubscriptionState::Active,
                buffer: VecDeque::with_capacity(capacity.min(64)),
                dropped: 0,
                lagging: false,
            }),
            notify: Notify::new(),
        }
    }

    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    pub(crate) fn state(&self) -> SubscriptionState {
        self.queue.lock().state
    }

    /// Offer a notification; never blocks on the consumer
    pub(crate) fn enqueue(
        &self,
        notification: &Arc<Notification>,
        policy: SlowConsumerPolicy,
    ) -> Enqueue {
        let outcome = {
            let mut queue = self.queue.lock();

            if queue.state != SubscriptionState::Active {
                return Enqueue::Rejected;
            }

            if queue.buffer.len() < self.capacity {
                queue.buffer.push_back(Arc::clone(notification));
                Enqueue::Queued
            } else {
                match policy {
                    SlowConsumerPolicy::DropOldest => {
                        queue.buffer.pop_front();
                        queue.buffer.push_back(Arc::clone(notification));
                        queue.dropped += 1;
                        let started_lagging = !queue.lagging;
                        queue.lagging = true;
                        Enqueue::DroppedOldest { started_lagging }
                    }
                    SlowConsumerPolicy::Evict => {
                        queue.dropped += queue.buffer.len() as u64 + 1;
                        queue.buffer.clear();
                        queue.state = SubscriptionState::Draining;
                        Enqueue::Evicted
                    }
                }
            }
        };

        self.notify.notify_one();
        outcome
    }

    /// `Active -> Draining`; returns false if the subscription had already left `Active`
    pub(crate) fn begin_drain(&self) -> bool {
        let changed = {
            let mut queue = self.queue.lock();
            if queue.state == SubscriptionState::Active {
                queue.state = SubscriptionState::Draining;
                true
            } else {
                false
            }
        };

        if changed {
            self.notify.notify_one();
        }
        changed
    }

    /// Transition to `Closed` and discard anything still queued
    pub(crate) fn close(&self) {
        {
            let mut queue = self.queue.lock();
            queue.state = SubscriptionState::Closed;
            queue.buffer.clear();
        }
        self.notify.notify_one();
    }

    fn next(&self) -> Next {
        let mut queue = self.queue.lock();

        match queue.buffer.pop_front() {
            Some(item) => {
                if queue.buffer.is_empty() {
                    queue.lagging = false;
                }
                Next::Item(item)
            }
            None if queue.state == SubscriptionState::Active => Next::Empty,
            None => Next::Finished,
        }
    }

    fn len(&self) -> usize {
        self.queue.lock().buffer.len()
    }

    fn dropped(&self) -> u64 {
        self.queue.lock().dropped
    }
}

/// One client's registered interest in the bus
///
/// Owned by exactly one stream adapter. The bus only keeps a weak reference;
/// dropping the handle always unregisters it.
pub struct Subscription {
    shared: Arc<SubscriptionShared>,
    bus: EventBus,
    created_at: Instant,
}

impl Subscription {
    pub(crate) fn new(shared: Arc<SubscriptionShared>, bus: EventBus) -> Self {
        Self {
            shared,
            bus,
            created_at: Instant::now(),
        }
    }

    /// Registration id
    pub fn id(&self) -> SubscriptionId {
        self.shared.id()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SubscriptionState {
        self.shared.state()
    }

    /// Maximum number of queued notifications
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of notifications waiting to be read
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notifications discarded by the slow-consumer policy
    pub fn dropped(&self) -> u64 {
        self.shared.dropped()
    }

    /// Time since registration
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Wait for the next notification
    ///
    /// Returns `None` once the queue is empty and the subscription is no
    /// longer `Active` (drained, evicted or closed).
    pub async fn recv(&self) -> Option<Arc<Notification>> {
        loop {
            match self.shared.next() {
                Next::Item(item) => return Some(item),
                Next::Finished => return None,
                // A notify_one issued between next() and here leaves a permit,
                // so the wake-up is not lost.
                Next::Empty => self.shared.notify.notified().await,
            }
        }
    }

    /// Take the next queued notification without waiting
    pub fn try_recv(&self) -> Option<Arc<Notification>> {
        match self.shared.next() {
            Next::Item(item) => Some(item),
            Next::Empty | Next::Finished => None,
        }
    }

    /// Stop accepting new notifications while keeping the queued ones readable
    pub fn begin_drain(&self) -> bool {
        self.shared.begin_drain()
    }

    /// Unregister from the bus and move to `Closed`
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.shared.id());
        self.shared.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("queued", &self.len())
            .field("dropped", &self.dropped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(capacity: usize) -> SubscriptionShared {
        SubscriptionShared::new(SubscriptionId(1), capacity)
    }

    fn note(id: &str) -> Arc<Notification> {
        Arc::new(Notification::new("alert").with_id(id))
    }

    fn drain_ids(shared: &SubscriptionShared) -> Vec<String> {
        let mut ids = Vec::new();
        while let Next::Item(item) = shared.next() {
            ids.push(item.id().to_string());
        }
        ids
    }

    #[test]
    fn test_enqueue_fifo() {
        let s = shared(4);
        assert_eq!(s.enqueue(&note("a"), SlowConsumerPolicy::DropOldest), Enqueue::Queued);
        assert_eq!(s.enqueue(&note("b"), SlowConsumerPolicy::DropOldest), Enqueue::Queued);

        assert_eq!(drain_ids(&s), vec!["a", "b"]);
    }

    #[test]
    fn test_drop_oldest_when_full() {
        let s = shared(2);
        s.enqueue(&note("a"), SlowConsumerPolicy::DropOldest);
        s.enqueue(&note("b"), SlowConsumerPolicy::DropOldest);

        assert_eq!(
            s.enqueue(&note("c"), SlowConsumerPolicy::DropOldest),
            Enqueue::DroppedOldest {
                started_lagging: true
            }
        );
        assert_eq!(
            s.enqueue(&note("d"), SlowConsumerPolicy::DropOldest),
            Enqueue::DroppedOldest {
                started_lagging: false
            }
        );

        assert_eq!(s.len(), 2);
        assert_eq!(s.dropped(), 2);
        assert_eq!(drain_ids(&s), vec!["c", "d"]);
    }

    #[test]
    fn test_lagging_resets_after_catch_up() {
        let s = shared(1);
        s.enqueue(&note("a"), SlowConsumerPolicy::DropOldest);
        s.enqueue(&note("b"), SlowConsumerPolicy::DropOldest);
        drain_ids(&s);

        s.enqueue(&note("c"), SlowConsumerPolicy::DropOldest);
        assert_eq!(
            s.enqueue(&note("d"), SlowConsumerPolicy::DropOldest),
            Enqueue::DroppedOldest {
                started_lagging: true
            }
        );
    }

    #[test]
    fn test_evict_when_full() {
        let s = shared(1);
        s.enqueue(&note("a"), SlowConsumerPolicy::Evict);

        assert_eq!(s.enqueue(&note("b"), SlowConsumerPolicy::Evict), Enqueue::Evicted);
        assert_eq!(s.state(), SubscriptionState::Draining);
        assert_eq!(s.len(), 0);
        assert_eq!(s.dropped(), 2);
        assert!(matches!(s.next(), Next::Finished));
    }

    #[test]
    fn test_draining_rejects_but_keeps_queue() {
        let s = shared(4);
        s.enqueue(&note("a"), SlowConsumerPolicy::DropOldest);

        assert!(s.begin_drain());
        assert!(!s.begin_drain());
        assert_eq!(s.enqueue(&note("b"), SlowConsumerPolicy::DropOldest), Enqueue::Rejected);

        assert_eq!(drain_ids(&s), vec!["a"]);
        assert!(matches!(s.next(), Next::Finished));
    }

    #[test]
    fn test_closed_rejects_and_discards() {
        let s = shared(4);
        s.enqueue(&note("a"), SlowConsumerPolicy::DropOldest);
        s.close();

        assert_eq!(s.state(), SubscriptionState::Closed);
        assert_eq!(s.len(), 0);
        assert_eq!(s.enqueue(&note("b"), SlowConsumerPolicy::DropOldest), Enqueue::Rejected);
        assert!(!s.begin_drain());
    }

    #[test]
    fn test_subscription_id_display() {
        assert_eq!(SubscriptionId(7).to_string(), "sub-7");
        assert_eq!(SubscriptionId(7).as_u64(), 7);
    }
}
