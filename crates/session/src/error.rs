//! Error types for AT Protocol session management

/// Errors from session establishment and refresh.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("login failed: {0}")]
    InvalidCredentials(String),

    #[error("session exchange failed: {0}")]
    SessionExchange(String),

    #[error("malformed JWT: {0}")]
    MalformedToken(String),

    #[error("not connected")]
    NotConnected,
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
