//! Event-stream transport
//!
//! [`frame`] turns notifications into `text/event-stream` blocks and back;
//! [`adapter`] drains a subscription onto a connection using that framing.

pub mod adapter;
pub mod frame;

pub use adapter::{StreamAdapter, StreamOutcome, StreamReport};
pub use frame::{encode_event, EventDecoder, STREAM_HEADERS};
