//! Statistics for the bus and individual stream connections

pub mod metrics;

pub use metrics::{BusStats, ConnectionStats};
pub(crate) use metrics::BusCounters;
