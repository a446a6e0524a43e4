//! HTTP front end for the event bus
//!
//! Routes (paths configurable through [`ServerConfig`]):
//!
//! ```text
//! GET  /api/notifications/stream   text/event-stream, one subscription per connection
//! POST /api/notifications          publish one JSON notification (202 Accepted)
//! GET  /api/notifications/stats    bus counters as JSON
//! ```
//!
//! Failures answer with a JSON [`ApiError`] body.

pub mod config;
pub mod error;
pub mod listener;
mod routes;

pub use config::ServerConfig;
pub use error::ApiError;
pub use listener::NotificationServer;
