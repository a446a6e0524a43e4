//! Notification records
//!
//! A notification is the unit of fan-out. Its payload is a JSON object that is
//! flattened into the top level of the wire representation:
//!
//! ```json
//! {"id":"n1","type":"alert","timestamp":"2024-05-01T12:00:00Z","severity":"high"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known notification kinds
pub mod kinds {
    /// Synthetic first message on every new stream
    pub const CONNECTED: &str = "connected";
    /// Per-connection keep-alive
    pub const HEARTBEAT: &str = "heartbeat";
    /// Upstream connectivity changed
    pub const CONNECTION_STATUS: &str = "connection-status";
    /// Operator-facing alert
    pub const ALERT: &str = "alert";
    /// Generic state update (settings, topology)
    pub const UPDATE: &str = "update";
}

/// Message carried by the synthetic `connected` notification
pub const CONNECTED_MESSAGE: &str = "Connected to notification stream";

/// Keys the envelope owns; payload entries with these names are discarded
const RESERVED_KEYS: [&str; 3] = ["id", "type", "timestamp"];

fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// An immutable event record
///
/// Built once by a producer, then shared by reference across every
/// subscriber it is delivered to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default = "generate_id")]
    id: String,

    #[serde(rename = "type")]
    kind: String,

    #[serde(default = "Utc::now")]
    timestamp: DateTime<Utc>,

    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl Notification {
    /// Create a notification of the given kind with a fresh id and timestamp
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            kind: kind.into(),
            timestamp: Utc::now(),
            payload: Map::new(),
        }
    }

    /// The synthetic message sent to a stream right after it attaches
    pub fn connected() -> Self {
        Self::new(kinds::CONNECTED).with_field("message", CONNECTED_MESSAGE)
    }

    /// Keep-alive message written to a single idle stream
    pub fn heartbeat() -> Self {
        Self::new(kinds::HEARTBEAT)
    }

    /// Use a producer-assigned id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Override the creation time
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Add one payload field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !RESERVED_KEYS.contains(&key.as_str()) {
            self.payload.insert(key, value.into());
        }
        self
    }

    /// Replace the payload
    pub fn with_payload(mut self, mut payload: Map<String, Value>) -> Self {
        payload.retain(|key, _| !RESERVED_KEYS.contains(&key.as_str()));
        self.payload = payload;
        self
    }

    /// Producer-assigned identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Event category
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Creation time
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Kind-specific data
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Look up a single payload field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}
