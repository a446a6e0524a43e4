//! Statistics and metrics for the notification bus

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Bus-wide counters, updated lock-free from `publish` and `subscribe`
#[derive(Debug, Default)]
pub(crate) struct BusCounters {
    pub published: AtomicU64,
    pub delivered: AtomicU64,
    pub dropped: AtomicU64,
    pub evicted: AtomicU64,
    pub subscribed: AtomicU64,
    pub rejected: AtomicU64,
}

impl BusCounters {
    pub fn add(counter: &AtomicU64, n: u64) {
        if n > 0 {
            counter.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self, active_subscribers: usize, max_subscribers: usize) -> BusStats {
        BusStats {
            active_subscribers,
            max_subscribers,
            total_published: self.published.load(Ordering::Relaxed),
            total_delivered: self.delivered.load(Ordering::Relaxed),
            total_dropped: self.dropped.load(Ordering::Relaxed),
            total_evicted: self.evicted.load(Ordering::Relaxed),
            total_subscribed: self.subscribed.load(Ordering::Relaxed),
            total_rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time bus statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    /// Subscriptions currently registered
    pub active_subscribers: usize,
    /// Configured ceiling
    pub max_subscribers: usize,
    /// `publish` calls
    pub total_published: u64,
    /// Notifications placed in a subscriber queue
    pub total_delivered: u64,
    /// Queued notifications discarded by the slow-consumer policy
    pub total_dropped: u64,
    /// Subscribers removed for being slow
    pub total_evicted: u64,
    /// Successful `subscribe` calls
    pub total_subscribed: u64,
    /// `subscribe` calls refused at capacity
    pub total_rejected: u64,
}

/// Per-connection statistics for one stream
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    /// Notifications written to the client (including synthetic ones)
    pub notifications_sent: u64,
    /// Heartbeats written to the client
    pub heartbeats_sent: u64,
    /// Total bytes written
    pub bytes_sent: u64,
    /// When the stream started
    pub started_at: Instant,
}

impl ConnectionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            notifications_sent: 0,
            heartbeats_sent: 0,
            bytes_sent: 0,
            started_at: Instant::now(),
        }
    }

    /// Record one written frame
    pub fn record_frame(&mut self, bytes: usize) {
        self.notifications_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    /// Time since the stream started
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for ConnectionStats {
    fn default() -> Self {
        Self::new()
    }
}
