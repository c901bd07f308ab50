use serde_json::Value;
use thiserror::Error;

use crate::auth::AuthError;

/// Notice for 5xx responses
pub const SERVER_ERROR_NOTICE: &str = "Server error, please try again later";

/// Notice for 4xx responses without a usable `detail`
pub const CLIENT_ERROR_NOTICE: &str = "Request error, please check your input";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized after token renewal: {0}")]
    RequestAuthFailed(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Request rejected ({status}): {message}")]
    ClientError { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Map a non-success status to an error. A 401 only reaches this point
    /// once recovery has already been tried.
    pub fn from_status(status: u16, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status {
            401 => ApiError::RequestAuthFailed(truncated),
            400..=499 => ApiError::ClientError {
                status,
                message: truncated,
            },
            500..=599 => ApiError::ServerError {
                status,
                message: truncated,
            },
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RequestAuthFailed(_) => Some(401),
            ApiError::ServerError { status, .. } | ApiError::ClientError { status, .. } => Some(*status),
            ApiError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Human-readable messages from an error body.
///
/// The backend reports errors as `{"detail": "..."}`, or for validation
/// failures as `{"detail": [{"msg": "...", ...}, ...]}`.
pub fn detail_messages(body: &str) -> Vec<String> {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").cloned());

    match detail {
        Some(Value::String(message)) if !message.is_empty() => vec![message],
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .map(|item| {
                item.get("msg")
                    .and_then(Value::as_str)
                    .unwrap_or(CLIENT_ERROR_NOTICE)
                    .to_string()
            })
            .collect(),
        _ => vec![CLIENT_ERROR_NOTICE.to_string()],
    }
}
