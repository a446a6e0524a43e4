//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent requests, open streams included (0 = unlimited)
    ///
    /// Independent of the bus subscriber ceiling, which only counts streams.
    pub max_connections: usize,

    /// Path serving the event stream
    ///
    /// The three paths must differ; equal paths panic when the router is built.
    pub stream_path: String,

    /// Path accepting notifications from producers over HTTP
    pub publish_path: String,

    /// Path reporting bus statistics
    pub stats_path: String,

    /// Heartbeat interval for idle streams (None = no heartbeats)
    pub keepalive_interval: Option<Duration>,

    /// A non-stream response must be ready within this time (408 otherwise)
    pub request_timeout: Duration,

    /// Maximum publish request body
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 0, // Unlimited
            stream_path: "/api/notifications/stream".to_string(),
            publish_path: "/api/notifications".to_string(),
            stats_path: "/api/notifications/stats".to_string(),
            keepalive_interval: Some(Duration::from_secs(30)),
            request_timeout: Duration::from_secs(10),
            max_body_size: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the event stream path
    pub fn stream_path(mut self, path: impl Into<String>) -> Self {
        self.stream_path = path.into();
        self
    }

    /// Set the publish path
    pub fn publish_path(mut self, path: impl Into<String>) -> Self {
        self.publish_path = path.into();
        self
    }

    /// Set the stats path
    pub fn stats_path(mut self, path: impl Into<String>) -> Self {
        self.stats_path = path.into();
        self
    }

    /// Set the heartbeat interval
    pub fn keepalive_interval(mut self, interval: Option<Duration>) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the maximum publish body size
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }
}
