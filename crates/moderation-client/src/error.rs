//! Error types for the moderation client facade

/// Errors from typed moderation operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("session error: {0}")]
    Session(#[from] session::Error),

    #[error("transport error: {0}")]
    Transport(#[from] transport::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("client not ready: session has not been established")]
    NotReady,
}

/// Result alias for moderation client operations.
pub type Result<T> = std::result::Result<T, Error>;
