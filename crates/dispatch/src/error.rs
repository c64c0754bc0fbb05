use thiserror::Error;

/// Errors that can occur when dispatching commands.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The destination queue cannot accept commands (its consumer is
    /// gone or the broker is unreachable). The command was not
    /// enqueued; the current saga step must surface this rather than
    /// drop it.
    #[error("Queue unavailable: {0}")]
    QueueUnavailable(String),

    /// The queue's receiver was already taken by another consumer.
    #[error("Queue already consumed: {0}")]
    AlreadyConsumed(String),
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;
