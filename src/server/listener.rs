//! TCP listener and graceful shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::bus::EventBus;
use crate::error::Result;
use crate::server::config::ServerConfig;
use crate::server::routes::{self, AppState};

/// HTTP server exposing an [`EventBus`] as an event stream
pub struct NotificationServer {
    config: Arc<ServerConfig>,
    bus: EventBus,
    connection_semaphore: Option<Arc<Semaphore>>,
    shutdown: CancellationToken,
}

impl NotificationServer {
    /// Create a new server publishing from `bus`
    pub fn new(config: ServerConfig, bus: EventBus) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config: Arc::new(config),
            bus,
            connection_semaphore,
            shutdown: CancellationToken::new(),
        }
    }

    /// The bus streams are subscribed to
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        self.serve_until(listener, std::future::pending()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// Once shutdown begins, open streams flush their queues and close; the
    /// call returns when every connection has finished.
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            stream = %self.config.stream_path,
            max_subscribers = self.bus.config().max_subscribers,
            "Notification server listening"
        );

        let router = routes::router(AppState {
            bus: self.bus.clone(),
            config: Arc::clone(&self.config),
            shutdown: self.shutdown.clone(),
            connections: self.connection_semaphore.clone(),
        });

        let token = self.shutdown.clone();
        let bus = self.bus.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!(
                    streams = bus.subscriber_count(),
                    "Shutdown signal received"
                );
                token.cancel();
            })
            .await?;

        // Covers the listener failing before any signal arrived
        self.shutdown.cancel();
        tracing::info!("Notification server stopped");
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
