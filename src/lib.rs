//! notify-hub: in-process notification fan-out over Server-Sent Events
//!
//! A single [`EventBus`] is created at process start and handed to every
//! producer and every stream connection. Producers call
//! [`EventBus::publish`]; each connected client owns one [`Subscription`]
//! whose bounded queue is drained by a [`StreamAdapter`] onto the wire.
//!
//! ```no_run
//! use notify_hub::{EventBus, Notification, NotificationServer, ServerConfig};
//!
//! # async fn example() -> notify_hub::Result<()> {
//! let bus = EventBus::new();
//! let server = NotificationServer::new(ServerConfig::default(), bus.clone());
//!
//! tokio::spawn(async move {
//!     bus.publish(Notification::new("alert").with_field("message", "link down"));
//! });
//!
//! server.run().await
//! # }
//! ```

pub mod bus;
pub mod error;
pub mod server;
pub mod stats;
pub mod stream;

pub use bus::{
    BusConfig, BusError, EventBus, Notification, SlowConsumerPolicy, Subscription,
    SubscriptionId, SubscriptionState,
};
pub use error::{Error, Result};
pub use server::{NotificationServer, ServerConfig};
pub use stats::{BusStats, ConnectionStats};
pub use stream::{StreamAdapter, StreamOutcome, StreamReport};
