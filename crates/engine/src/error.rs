//! Error types for the moderation engine

/// Errors from engine components. Most per-item failures (malformed URI,
/// dropped emission) are handled as logged-and-counted outcomes rather
/// than propagated errors — this type covers the remainder.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("moderation client error: {0}")]
    Client(#[from] moderation_client::Error),

    #[error("queue closed")]
    QueueClosed,
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
