//! Bus error types

/// Error type for bus operations
///
/// Only `subscribe` can fail. Slow consumers are handled inside `publish`
/// and never reach the producer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The registry already holds `max` subscriptions
    #[error("subscriber capacity exceeded (max {max})")]
    CapacityExceeded { max: usize },
}
