//! Error types for the REST executor

/// Errors surfaced by [`crate::executor::RestExecutor`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request failed after retries: {0}")]
    Http(String),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Json(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;
