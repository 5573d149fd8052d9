//! Poker service error types.
//!
//! On the WebSocket only `RoomNotFound`, `NameTaken` and `InvalidDisplayName`
//! reach a client, and only through create/join acknowledgements. Everything
//! else is logged server-side and turned into a silent no-op by the
//! controller. The HTTP API renders errors as `{"error":{"code","message"}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Poker service error type.
///
/// Maps to the wire `error` codes carried in acknowledgements:
/// - `RoomNotFound` -> `"RoomNotFound"`
/// - `NameTaken` -> `"NameTaken"`
/// - `InvalidDisplayName` -> `"InvalidDisplayName"`
/// - `Draining` -> `"Unavailable"`
/// - `Internal` -> `"Internal"`
///
/// Authority actions by a non-holder are silent no-ops and have no variant.
#[derive(Debug, Error)]
pub enum PokerError {
    /// Target room is not live.
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Another live connection in the room already uses this display name.
    #[error("Display name already taken")]
    NameTaken,

    /// Display name is blank after trimming.
    #[error("Invalid display name")]
    InvalidDisplayName,

    /// Server is shutting down and no longer accepts connections.
    #[error("Server is draining")]
    Draining,

    /// Internal error (RNG failure, closed actor channel).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PokerError {
    /// Returns the wire error code for this error.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            PokerError::RoomNotFound(_) => "RoomNotFound",
            PokerError::NameTaken => "NameTaken",
            PokerError::InvalidDisplayName => "InvalidDisplayName",
            PokerError::Draining => "Unavailable",
            PokerError::Internal(_) => "Internal",
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            PokerError::RoomNotFound(_) => "Room not found".to_string(),
            PokerError::NameTaken => "This name is already taken in the room".to_string(),
            PokerError::InvalidDisplayName => "Display name must not be blank".to_string(),
            PokerError::Draining => "Server is shutting down, please reconnect".to_string(),
            PokerError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

impl PokerError {
    /// HTTP status for the REST surface.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            PokerError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            PokerError::NameTaken => StatusCode::CONFLICT,
            PokerError::InvalidDisplayName => StatusCode::BAD_REQUEST,
            PokerError::Draining => StatusCode::SERVICE_UNAVAILABLE,
            PokerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body for HTTP responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for PokerError {
    fn into_response(self) -> Response {
        if let PokerError::Internal(reason) = &self {
            tracing::error!(target: "poker.http", error = %reason, "Request failed");
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.client_message(),
            },
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Failure reason carried by a `joinResult` acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinError {
    /// No live room with that id.
    RoomNotFound,
    /// Display name held by a different live connection in the room.
    NameTaken,
    /// Display name blank after trimming.
    InvalidDisplayName,
}

impl From<JoinError> for PokerError {
    fn from(err: JoinError) -> Self {
        match err {
            JoinError::RoomNotFound => PokerError::RoomNotFound(String::new()),
            JoinError::NameTaken => PokerError::NameTaken,
            JoinError::InvalidDisplayName => PokerError::InvalidDisplayName,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            PokerError::RoomNotFound("AB12CD".to_string()).error_code(),
            "RoomNotFound"
        );
        assert_eq!(PokerError::NameTaken.error_code(), "NameTaken");
        assert_eq!(
            PokerError::InvalidDisplayName.error_code(),
            "InvalidDisplayName"
        );
        assert_eq!(
            PokerError::Internal("rng".to_string()).error_code(),
            "Internal"
        );
        assert_eq!(PokerError::Draining.error_code(), "Unavailable");
    }

    #[test]
    fn test_client_messages_hide_internal_details() {
        let err = PokerError::Internal("SystemRandom failed: errno 5".to_string());
        assert!(!err.client_message().contains("errno"));
        assert_eq!(err.client_message(), "An internal error occurred");
    }

    #[test]
    fn test_join_error_wire_values() {
        assert_eq!(
            serde_json::to_string(&JoinError::RoomNotFound).unwrap(),
            "\"RoomNotFound\""
        );
        assert_eq!(
            serde_json::to_string(&JoinError::NameTaken).unwrap(),
            "\"NameTaken\""
        );
    }

    #[test]
    fn test_join_error_conversion() {
        let err: PokerError = JoinError::NameTaken.into();
        assert!(matches!(err, PokerError::NameTaken));
        assert_eq!(err.error_code(), "NameTaken");
    }

    #[tokio::test]
    async fn test_into_response_hides_internal_reason() {
        use http_body_util::BodyExt;

        let response = PokerError::Internal("mailbox closed".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.error.code, "Internal");
        assert!(!parsed.error.message.contains("mailbox"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            PokerError::RoomNotFound(String::new()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(PokerError::Draining.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(PokerError::NameTaken.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", PokerError::RoomNotFound("ZZ99ZZ".to_string())),
            "Room not found: ZZ99ZZ"
        );
        assert_eq!(format!("{}", PokerError::NameTaken), "Display name already taken");
    }
}
