use thiserror::Error;

/// Errors that can occur while delivering realtime events.
#[derive(Debug, Error)]
pub enum FanoutError {
    /// Every sender of the channel has been dropped.
    #[error("event channel closed")]
    ChannelClosed,

    /// The underlying transport refused the event.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type for fan-out operations.
pub type Result<T> = std::result::Result<T, FanoutError>;
