//! HTTP routes
//!
//! The stream route hands each client its own [`StreamAdapter`]. The adapter
//! writes into an in-memory pipe whose read side becomes the response body,
//! so framing, keep-alive and drain stay in the adapter while axum owns the
//! socket.
//!
//! ```text
//!   Subscription ──► StreamAdapter ──► duplex ──► ReaderStream ──► Body ──► client
//!                        ▲                                          │
//!                        └──────── cancel (body dropped) ◄──────────┘
//! ```

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;

use crate::bus::{EventBus, Notification};
use crate::server::config::ServerConfig;
use crate::server::error::ApiError;
use crate::stats::BusStats;
use crate::stream::{StreamAdapter, STREAM_HEADERS};

/// Bytes buffered between an adapter and its response body
const STREAM_PIPE_SIZE: usize = 64 * 1024;

/// State shared by every handler
#[derive(Clone)]
pub(crate) struct AppState {
    pub bus: EventBus,
    pub config: Arc<ServerConfig>,
    /// Fired once when the server begins shutting down
    pub shutdown: CancellationToken,
    /// Present when `max_connections > 0`
    pub connections: Option<Arc<Semaphore>>,
}

/// Build the router for the configured paths
///
/// Panics (inside axum) if two of the configured paths are equal.
pub(crate) fn router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    let router = Router::new()
        .route(&config.stream_path, get(stream))
        .route(&config.publish_path, post(publish))
        .route(&config.stats_path, get(stats))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            limit_connections,
        ));

    router.with_state(state)
}

/// Open an event stream
///
/// The client counts as gone once hyper drops the body: a failed write or a
/// closed connection. hyper runs with `half_close` off, so a client that
/// shuts down its write side also ends its stream.
async fn stream(State(state): State<AppState>) -> Result<Response, ApiError> {
    let subscription = state.bus.subscribe()?;
    let id = subscription.id();

    let (writer, reader) = tokio::io::duplex(STREAM_PIPE_SIZE);
    let cancel = CancellationToken::new();
    let adapter = StreamAdapter::new(subscription, writer, cancel.clone())
        .keepalive(state.config.keepalive_interval)
        .shutdown(state.shutdown.clone());

    tokio::spawn(async move {
        let report = adapter.run().await;
        tracing::debug!(
            subscription = %report.subscription,
            outcome = ?report.outcome,
            notifications = report.stats.notifications_sent,
            "Stream finished"
        );
    });

    tracing::debug!(subscription = %id, "Stream opened");

    // The guard fires `cancel` once the server drops the body, i.e. the client left
    let guard = cancel.drop_guard();
    let body = ReaderStream::new(reader).map(move |chunk| {
        let _guard = &guard;
        chunk
    });

    let mut response = Body::from_stream(body).into_response();
    for (name, value) in STREAM_HEADERS {
        response.headers_mut().insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    Ok(response)
}

async fn publish(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let body = body.map_err(ApiError::body)?;
    let notification: Notification =
        serde_json::from_slice(&body).map_err(ApiError::invalid_notification)?;

    let id = notification.id().to_string();
    tracing::debug!(notification = %id, kind = notification.kind(), "Publish over HTTP");
    state.bus.publish(notification);

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "id": id, "status": "accepted" })),
    ))
}

async fn stats(State(state): State<AppState>) -> Json<BusStats> {
    Json(state.bus.stats())
}

async fn not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::new(
        StatusCode::NOT_FOUND,
        "not_found",
        format!("no route for {} {}", method, uri.path()),
    )
}

/// Bound concurrent requests; a stream holds its permit until its body is dropped
async fn limit_connections(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(semaphore) = state.connections.as_ref() else {
        return next.run(request).await;
    };

    let permit = match Arc::clone(semaphore).try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!(path = %request.uri().path(), "Connection rejected: limit reached");
            return ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "connection_limit",
                format!("at most {} concurrent connections", state.config.max_connections),
            )
            .into_response();
        }
    };

    next.run(request).await.map(|body| {
        Body::from_stream(body.into_data_stream().map(move |chunk| {
            let _permit = &permit;
            chunk
        }))
    })
}
