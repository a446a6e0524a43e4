//! Notification bus for pub/sub fan-out
//!
//! The bus keeps a registry of live subscriptions and copies every published
//! notification into each subscriber's bounded queue. A stream adapter drains
//! that queue onto its own connection.
//!
//! # Architecture
//!
//! ```text
//!                             EventBus (Arc<BusInner>)
//!                     ┌──────────────────────────────────┐
//!                     │ subscribers: HashMap<Id,         │
//!                     │   Weak<SubscriptionShared {      │
//!                     │     state, queue: VecDeque,      │
//!                     │   }>                             │
//!                     │ >                                │
//!                     └────────────────┬─────────────────┘
//!                                      │
//!         ┌────────────────────────────┼────────────────────────────┐
//!         │                            │                            │
//!         ▼                            ▼                            ▼
//!    [Producer]                  [Subscription]               [Subscription]
//!    bus.publish()               sub.recv()                   sub.recv()
//!         │                            │                            │
//!         └──► enqueue (never blocks) ─┴──► StreamAdapter ──► TCP ──┘
//! ```
//!
//! # Sharing
//!
//! Each published notification is wrapped in a single `Arc` and every queue
//! holds a clone of that `Arc`, so the payload is never copied per subscriber.
//!
//! # Slow consumers
//!
//! Queues are bounded. When a queue is full the bus applies one
//! [`SlowConsumerPolicy`] to every subscriber: drop the oldest queued entry
//! (default), or evict the subscriber entirely.

pub mod config;
pub mod error;
pub mod notification;
pub mod registry;
pub mod subscription;

pub use config::{BusConfig, SlowConsumerPolicy};
pub use error::BusError;
pub use notification::{kinds, Notification};
pub use registry::EventBus;
pub use subscription::{Subscription, SubscriptionId, SubscriptionState};
