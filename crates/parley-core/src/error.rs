use thiserror::Error;

/// Top-level error type for Parley.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Error from the reasoning service.
    #[error("provider error: {0}")]
    Provider(String),

    /// Error from the delivery gateway.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Durable store error.
    #[error("store error: {0}")]
    Store(String),

    /// An external call exceeded its deadline.
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// The operation was cancelled (shutdown).
    #[error("cancelled")]
    Cancelled,

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
