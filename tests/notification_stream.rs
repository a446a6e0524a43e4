//! End-to-end tests against a running server over real TCP connections

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use notify_hub::bus::kinds;
use notify_hub::stream::EventDecoder;
use notify_hub::{BusConfig, EventBus, Notification, NotificationServer, ServerConfig};

struct TestServer {
    addr: SocketAddr,
    bus: EventBus,
    http: reqwest::Client,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<notify_hub::Result<()>>,
}

impl TestServer {
    async fn start(bus: EventBus) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Short heartbeats let the server notice departed clients through write failures
        let config = ServerConfig::with_addr(addr).keepalive_interval(Some(Duration::from_millis(100)));
        let server = Arc::new(NotificationServer::new(config, bus.clone()));
        let (stop, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            server
                .serve_until(listener, async move {
                    let _ = rx.await;
                })
                .await
        });

        Self {
            addr,
            bus,
            http: reqwest::Client::new(),
            stop: Some(stop),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

struct StreamClient {
    body: ByteStream,
    decoder: EventDecoder,
}

impl StreamClient {
    async fn connect(server: &TestServer) -> Self {
        let response = server
            .http
            .get(server.url("/api/notifications/stream"))
            .header("Accept", "text/event-stream")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");

        Self {
            body: Box::pin(response.bytes_stream()),
            decoder: EventDecoder::new(),
        }
    }

    /// Next notification, skipping heartbeats
    async fn next(&mut self) -> Notification {
        loop {
            while let Some(event) = self.decoder.next_event() {
                let event = event.unwrap();
                if event.kind() != kinds::HEARTBEAT {
                    return event;
                }
            }
            let chunk = tokio::time::timeout(Duration::from_secs(5), self.body.next())
                .await
                .expect("timed out waiting for an event")
                .expect("stream closed")
                .unwrap();
            self.decoder.push(&chunk);
        }
    }

    /// Read until the server ends the stream, returning what arrived
    async fn remaining(mut self) -> Vec<Notification> {
        let mut events = Vec::new();
        loop {
            let chunk = tokio::time::timeout(Duration::from_secs(10), self.body.next())
                .await
                .expect("stream did not end");
            match chunk {
                Some(Ok(bytes)) => self.decoder.push(&bytes),
                _ => break,
            }
            while let Some(event) = self.decoder.next_event() {
                let event = event.unwrap();
                if event.kind() != kinds::HEARTBEAT {
                    events.push(event);
                }
            }
        }
        events
    }
}

async fn wait_for_subscribers(bus: &EventBus, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while bus.subscriber_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber count did not settle");
}

#[tokio::test]
async fn test_stream_receives_connected_then_published_in_order() {
    let server = TestServer::start(EventBus::new()).await;
    let mut client = StreamClient::connect(&server).await;

    let connected = client.next().await;
    assert_eq!(connected.kind(), kinds::CONNECTED);
    wait_for_subscribers(&server.bus, 1).await;

    server.bus.publish(Notification::new("alert").with_id("n1"));
    server.bus.publish(Notification::new("alert").with_id("n2"));

    assert_eq!(client.next().await.id(), "n1");
    assert_eq!(client.next().await.id(), "n2");

    drop(client);
    wait_for_subscribers(&server.bus, 0).await;
    server.stop().await;
}

#[tokio::test]
async fn test_every_client_gets_every_notification() {
    let server = TestServer::start(EventBus::new()).await;
    let mut first = StreamClient::connect(&server).await;
    let mut second = StreamClient::connect(&server).await;
    first.next().await;
    second.next().await;
    wait_for_subscribers(&server.bus, 2).await;

    server.bus.publish(
        Notification::new("connection-status")
            .with_id("s1")
            .with_field("status", "offline"),
    );

    for client in [&mut first, &mut second] {
        let event = client.next().await;
        assert_eq!(event.id(), "s1");
        assert_eq!(event.field("status").and_then(|v| v.as_str()), Some("offline"));
    }

    server.stop().await;
}

#[tokio::test]
async fn test_publish_endpoint_reaches_stream() {
    let server = TestServer::start(EventBus::new()).await;
    let mut client = StreamClient::connect(&server).await;
    client.next().await;
    wait_for_subscribers(&server.bus, 1).await;

    let response = server
        .http
        .post(server.url("/api/notifications"))
        .header("Content-Type", "application/json")
        .body(r#"{"id":"p1","type":"alert","severity":"critical"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["id"], "p1");

    let event = client.next().await;
    assert_eq!(event.id(), "p1");
    assert_eq!(event.field("severity").and_then(|v| v.as_str()), Some("critical"));

    server.stop().await;
}

#[tokio::test]
async fn test_stats_endpoint() {
    let server = TestServer::start(EventBus::new()).await;
    let mut client = StreamClient::connect(&server).await;
    client.next().await;
    wait_for_subscribers(&server.bus, 1).await;
    server.bus.publish(Notification::new("update"));

    let response = server
        .http
        .get(server.url("/api/notifications/stats"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let stats: serde_json::Value = response.json().await.unwrap();
    assert_eq!(stats["active_subscribers"], 1);
    assert_eq!(stats["max_subscribers"], 200);
    assert_eq!(stats["total_published"], 1);

    server.stop().await;
}

#[tokio::test]
async fn test_stream_rejected_at_capacity() {
    let bus = EventBus::with_config(BusConfig::default().max_subscribers(1));
    let server = TestServer::start(bus).await;

    let mut first = StreamClient::connect(&server).await;
    first.next().await;
    wait_for_subscribers(&server.bus, 1).await;

    let response = server
        .http
        .get(server.url("/api/notifications/stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "capacity_exceeded");
    assert_eq!(server.bus.subscriber_count(), 1);

    // A slot frees up once the first client leaves
    drop(first);
    wait_for_subscribers(&server.bus, 0).await;
    let mut replacement = StreamClient::connect(&server).await;
    assert_eq!(replacement.next().await.kind(), kinds::CONNECTED);

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_flushes_and_closes_open_streams() {
    let server = TestServer::start(EventBus::new()).await;
    let mut client = StreamClient::connect(&server).await;
    client.next().await;
    wait_for_subscribers(&server.bus, 1).await;

    let bus = server.bus.clone();
    bus.publish(Notification::new("update").with_id("last-1"));
    bus.publish(Notification::new("update").with_id("last-2"));

    let reader = tokio::spawn(client.remaining());
    server.stop().await;

    let ids: Vec<String> = reader
        .await
        .unwrap()
        .iter()
        .map(|n| n.id().to_string())
        .collect();
    assert_eq!(ids, ["last-1", "last-2"]);
    assert_eq!(bus.subscriber_count(), 0);
}
