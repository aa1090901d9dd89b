//! Error types and HTTP error response handling.
//!
//! This module defines all server errors and how they are converted into
//! HTTP responses. Expected business denials carry pre-composed messages
//! meant for end users; unexpected failures are reported generically.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::models::access_code::RedeemRejection;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Database Errors**: store unreachable or a query failed (500)
/// - **Validation Errors**: missing or malformed request data (400)
/// - **Business Denials**: the code cannot be redeemed by this requester (400)
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed.
    ///
    /// Details are logged but never returned to the caller.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Request body or parameters are invalid.
    #[error("{0}")]
    InvalidRequest(String),

    /// No usable network address could be derived for the requester.
    #[error("Unable to determine client address")]
    UnknownRequester,

    /// The registry refused to redeem the code.
    #[error(transparent)]
    CodeRejected(#[from] RedeemRejection),

    /// This address has redeemed the code before. There is no recovery.
    #[error(
        "This code has already been used on this device. Each code can only be used once per device and access cannot be recovered."
    )]
    CodeAlreadyUsed,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "success": false,
///   "error": "Human-readable error message"
/// }
/// ```
///
/// # Status Code Mapping
///
/// - `Database` → 500 Internal Server Error (hides details from client)
/// - everything else → 400 Bad Request
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::Database(ref err) => {
                tracing::error!(error = %err, "Session store failure");
                "An internal error occurred".to_string()
            }
            ref other => other.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "error": message
        }));

        (status, body).into_response()
    }
}
