//! Stream transport adapter
//!
//! Bridges one [`Subscription`] to one outbound connection. The adapter is
//! the only place that waits on the network: the bus enqueues, the adapter
//! dequeues and writes.

use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::bus::{Notification, Subscription, SubscriptionId};
use crate::error::{Error, Result};
use crate::stats::ConnectionStats;

use super::frame::encode_event;

/// Upper bound on flushing queued notifications during shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The client went away (cancellation signal fired)
    ClientDisconnected,
    /// Writing to the connection failed
    WriteFailed,
    /// The bus ended the subscription (slow-consumer eviction or external unsubscribe)
    Evicted,
    /// Server-initiated shutdown; queued notifications were flushed first
    Shutdown,
}

/// Summary returned when an adapter finishes
#[derive(Debug, Clone)]
pub struct StreamReport {
    /// Subscription the adapter owned
    pub subscription: SubscriptionId,
    /// Why the stream ended
    pub outcome: StreamOutcome,
    /// What was written
    pub stats: ConnectionStats,
}

/// Drives one subscription onto one writer using event-stream framing
///
/// On every exit path the subscription is closed, which unregisters it from
/// the bus.
pub struct StreamAdapter<W> {
    subscription: Subscription,
    writer: W,
    cancel: CancellationToken,
    shutdown: CancellationToken,
    keepalive: Option<Duration>,
    stats: ConnectionStats,
}

impl<W: AsyncWrite + Unpin> StreamAdapter<W> {
    /// Create an adapter
    ///
    /// `cancel` must fire when the underlying connection ends.
    pub fn new(subscription: Subscription, writer: W, cancel: CancellationToken) -> Self {
        Self {
            subscription,
            writer,
            cancel,
            shutdown: CancellationToken::new(),
            keepalive: None,
            stats: ConnectionStats::new(),
        }
    }

    /// Send a heartbeat notification after each idle interval
    pub fn keepalive(mut self, interval: Option<Duration>) -> Self {
        self.keepalive = interval.filter(|d| !d.is_zero());
        self
    }

    /// Token that requests a graceful, flushing close
    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Stream until the connection ends, then release the subscription
    pub async fn run(mut self) -> StreamReport {
        let id = self.subscription.id();
        let outcome = self.stream().await;

        let Self {
            subscription,
            stats,
            ..
        } = self;
        subscription.close();

        tracing::debug!(
            subscription = %id,
            outcome = ?outcome,
            notifications = stats.notifications_sent,
            bytes = stats.bytes_sent,
            duration_ms = stats.duration().as_millis() as u64,
            "Stream closed"
        );

        StreamReport {
            subscription: id,
            outcome,
            stats,
        }
    }

    async fn stream(&mut self) -> StreamOutcome {
        // A shutdown arriving this early still gets the connected frame, then drains
        let connected = Notification::connected();
        if let Err(outcome) = self.send(&connected, true).await {
            return outcome;
        }

        // The ticker only exists to satisfy select!; the branch is disabled without keep-alive
        let period = self.keepalive.unwrap_or(Duration::from_secs(3600));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return StreamOutcome::ClientDisconnected,

                _ = self.shutdown.cancelled() => return self.drain().await,

                next = self.subscription.recv() => match next {
                    Some(notification) => {
                        if let Err(outcome) = self.send(&notification, true).await {
                            return outcome;
                        }
                        ticker.reset();
                    }
                    None => return StreamOutcome::Evicted,
                },

                _ = ticker.tick(), if self.keepalive.is_some() => {
                    let heartbeat = Notification::heartbeat();
                    if let Err(outcome) = self.send(&heartbeat, true).await {
                        return outcome;
                    }
                    self.stats.heartbeats_sent += 1;
                }
            }
        }
    }

    /// `Active -> Draining`, flush what is queued, then stop
    ///
    /// A client that stops reading gets at most `DRAIN_TIMEOUT` to catch up.
    async fn drain(&mut self) -> StreamOutcome {
        self.subscription.begin_drain();

        let flushed = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while let Some(notification) = self.subscription.try_recv() {
                self.send(&notification, false).await?;
            }
            Ok::<(), StreamOutcome>(())
        })
        .await;

        match flushed {
            Ok(Ok(())) => {
                let _ = self.writer.shutdown().await;
                StreamOutcome::Shutdown
            }
            Ok(Err(outcome)) => outcome,
            Err(_) => {
                tracing::debug!(
                    subscription = %self.subscription.id(),
                    left = self.subscription.len(),
                    "Drain timed out"
                );
                StreamOutcome::Shutdown
            }
        }
    }

    /// Write one frame unless the client goes away first
    ///
    /// When `interruptible`, a write that cannot complete immediately is
    /// also abandoned once shutdown begins.
    async fn send(
        &mut self,
        notification: &Notification,
        interruptible: bool,
    ) -> std::result::Result<(), StreamOutcome> {
        let id = self.subscription.id();

        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => Err(StreamOutcome::ClientDisconnected),

            written = write_frame(&mut self.writer, &mut self.stats, notification) => {
                written.map_err(|e| write_failed(id, e))
            }

            _ = self.shutdown.cancelled(), if interruptible => Err(StreamOutcome::Shutdown),
        }
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    stats: &mut ConnectionStats,
    notification: &Notification,
) -> Result<()> {
    let frame = match encode_event(notification) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(
                notification = notification.id(),
                error = %e,
                "Skipping notification that failed to encode"
            );
            return Ok(());
        }
    };

    writer.write_all(&frame).await.map_err(Error::TransportWrite)?;
    writer.flush().await.map_err(Error::TransportWrite)?;
    stats.record_frame(frame.len());
    Ok(())
}

fn write_failed(id: SubscriptionId, error: Error) -> StreamOutcome {
    tracing::debug!(subscription = %id, error = %error, "Stream write failed");
    StreamOutcome::WriteFailed
}
