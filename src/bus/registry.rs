//! Event bus implementation
//!
//! The central registry that tracks live subscriptions and fans every
//! published notification out to them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::config::BusConfig;
use super::error::BusError;
use super::notification::Notification;
use super::subscription::{Enqueue, Subscription, SubscriptionId, SubscriptionShared};
use crate::stats::{BusCounters, BusStats};

struct BusInner {
    /// Non-owning references to every `Active` or `Draining` subscription
    subscribers: RwLock<HashMap<SubscriptionId, Weak<SubscriptionShared>>>,

    next_id: AtomicU64,

    config: BusConfig,

    counters: BusCounters,
}

/// Process-wide notification bus
///
/// Cloning yields another handle to the same bus. Construct one at startup
/// and pass it to every producer and stream adapter.
///
/// None of the operations perform I/O or wait on a consumer. The registry
/// lock is held only while the map is read or modified; `publish` holds the
/// read side for the duration of its (in-memory) fan-out so that
/// `unsubscribe` cannot interleave with it.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a new bus with default configuration
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Create a new bus with custom configuration
    pub fn with_config(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                config,
                counters: BusCounters::default(),
            }),
        }
    }

    /// Get the bus configuration
    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// Register a new `Active` subscription
    ///
    /// Fails with [`BusError::CapacityExceeded`] when `max_subscribers`
    /// registrations already exist; the caller must refuse the connection.
    pub fn subscribe(&self) -> Result<Subscription, BusError> {
        let max = self.inner.config.max_subscribers;

        let shared = {
            let mut subscribers = self.inner.subscribers.write();
            subscribers.retain(|_, weak| weak.strong_count() > 0);

            if subscribers.len() >= max {
                BusCounters::add(&self.inner.counters.rejected, 1);
                tracing::warn!(
                    subscribers = subscribers.len(),
                    max_subscribers = max,
                    "Subscribe rejected: capacity reached"
                );
                return Err(BusError::CapacityExceeded { max });
            }

            let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
            let shared = Arc::new(SubscriptionShared::new(
                id,
                self.inner.config.queue_capacity,
            ));
            subscribers.insert(id, Arc::downgrade(&shared));

            tracing::debug!(
                subscription = %id,
                subscribers = subscribers.len(),
                "Subscriber added"
            );

            shared
        };

        BusCounters::add(&self.inner.counters.subscribed, 1);
        Ok(Subscription::new(shared, self.clone()))
    }

    /// Remove a subscription and move it to `Closed`
    ///
    /// Unknown or already-removed ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subscribers = self.inner.subscribers.write();

        match subscribers.remove(&id) {
            Some(weak) => {
                if let Some(shared) = weak.upgrade() {
                    shared.close();
                }
                tracing::debug!(
                    subscription = %id,
                    subscribers = subscribers.len(),
                    "Subscriber removed"
                );
            }
            None => {
                tracing::trace!(subscription = %id, "Unsubscribe ignored: not registered");
            }
        }
    }

    /// Deliver a notification to every registered subscription
    ///
    /// Never blocks and never fails. Full queues are handled by the
    /// configured [`SlowConsumerPolicy`](super::SlowConsumerPolicy); a slow
    /// subscriber cannot delay delivery to any other.
    pub fn publish(&self, notification: impl Into<Arc<Notification>>) {
        let notification = notification.into();
        let policy = self.inner.config.slow_consumer_policy;

        let mut delivered = 0u64;
        let mut dropped = 0u64;
        let mut evicted = 0u64;
        let mut stale = Vec::new();

        {
            let subscribers = self.inner.subscribers.read();

            for (id, weak) in subscribers.iter() {
                let Some(shared) = weak.upgrade() else {
                    stale.push(*id);
                    continue;
                };

                match shared.enqueue(&notification, policy) {
                    Enqueue::Queued => delivered += 1,
                    Enqueue::DroppedOldest { started_lagging } => {
                        delivered += 1;
                        dropped += 1;
                        if started_lagging {
                            tracing::warn!(
                                subscription = %id,
                                queue_capacity = self.inner.config.queue_capacity,
                                "Slow subscriber, dropping oldest notifications"
                            );
                        }
                    }
                    Enqueue::Evicted => {
                        evicted += 1;
                        stale.push(*id);
                        tracing::warn!(
                            subscription = %id,
                            queue_capacity = self.inner.config.queue_capacity,
                            "Slow subscriber evicted"
                        );
                    }
                    Enqueue::Rejected => {}
                }
            }

            tracing::trace!(
                notification = notification.id(),
                kind = notification.kind(),
                subscribers = subscribers.len(),
                delivered = delivered,
                "Notification published"
            );
        }

        if !stale.is_empty() {
            let mut subscribers = self.inner.subscribers.write();
            for id in &stale {
                subscribers.remove(id);
            }
        }

        let counters = &self.inner.counters;
        BusCounters::add(&counters.published, 1);
        BusCounters::add(&counters.delivered, delivered);
        BusCounters::add(&counters.dropped, dropped);
        BusCounters::add(&counters.evicted, evicted);
    }

    /// Number of registered subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Check whether an id is currently registered
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.read().contains_key(&id)
    }

    /// Get bus statistics
    pub fn stats(&self) -> BusStats {
        self.inner
            .counters
            .snapshot(self.subscriber_count(), self.inner.config.max_subscribers)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("config", &self.inner.config)
            .finish()
    }
}
