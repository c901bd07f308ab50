use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid username or password: {0}")]
    CredentialsRejected(String),

    #[error("Token renewal is disabled for this session")]
    RenewalDisabled,

    #[error("Token renewal failed: {0}")]
    RenewalFailed(String),

    #[error("Session expired - please log in again")]
    SessionExpired,

    #[error("Identity endpoint error (status {status}): {message}")]
    Endpoint { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}
