//! HTTP error responses
//!
//! Every failed request gets the same JSON body:
//!
//! ```json
//! {"error":"capacity_exceeded","message":"subscriber capacity exceeded (max 200)"}
//! ```

use std::fmt;

use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::bus::BusError;

/// An error answered directly to the client
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Create an error response
    pub fn new(status: StatusCode, code: &'static str, message: impl fmt::Display) -> Self {
        Self {
            status,
            code,
            message: message.to_string(),
        }
    }

    /// Response status
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Publish body could not be read
    pub(crate) fn body(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::new(StatusCode::PAYLOAD_TOO_LARGE, "body_too_large", rejection.body_text())
        } else {
            Self::new(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text())
        }
    }

    /// Publish body is not a notification
    pub(crate) fn invalid_notification(error: serde_json::Error) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_notification", error)
    }
}

impl From<BusError> for ApiError {
    fn from(error: BusError) -> Self {
        match error {
            BusError::CapacityExceeded { .. } => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "capacity_exceeded", error)
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.code,
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_error_maps_to_503() {
        let error = ApiError::from(BusError::CapacityExceeded { max: 200 });

        assert_eq!(error.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.code(), "capacity_exceeded");
        assert_eq!(
            error.to_string(),
            "capacity_exceeded (503 Service Unavailable): subscriber capacity exceeded (max 200)"
        );
    }

    #[tokio::test]
    async fn test_error_body() {
        let response = ApiError::new(StatusCode::NOT_FOUND, "not_found", "no route").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "not_found");
        assert_eq!(value["message"], "no route");
    }
}
