//! Bus configuration

/// Default ceiling on simultaneous subscriptions
pub const DEFAULT_MAX_SUBSCRIBERS: usize = 200;

/// Default per-subscriber queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// What the bus does when a subscriber's queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlowConsumerPolicy {
    /// Discard the oldest queued notification and enqueue the new one
    #[default]
    DropOldest,
    /// Discard the whole queue and remove the subscriber from the bus
    Evict,
}

/// Bus configuration options
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Maximum simultaneous subscriptions
    pub max_subscribers: usize,

    /// Notifications buffered per subscriber before the slow-consumer policy kicks in
    pub queue_capacity: usize,

    /// Policy applied uniformly to every full queue
    pub slow_consumer_policy: SlowConsumerPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_subscribers: DEFAULT_MAX_SUBSCRIBERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            slow_consumer_policy: SlowConsumerPolicy::DropOldest,
        }
    }
}

impl BusConfig {
    /// Set the subscription ceiling
    pub fn max_subscribers(mut self, max: usize) -> Self {
        self.max_subscribers = max;
        self
    }

    /// Set the per-subscriber queue capacity (at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the slow-consumer policy
    pub fn slow_consumer_policy(mut self, policy: SlowConsumerPolicy) -> Self {
        self.slow_consumer_policy = policy;
        self
    }
}
