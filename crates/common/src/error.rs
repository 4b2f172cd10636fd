use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Series too short for the requested lookback. Skip the unit this cycle.
    #[error("insufficient data: need at least {required} points, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Market data fetch failed. Retry next cycle.
    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    /// Alert delivery failed. The alert record stays unsent so the next
    /// cycle retries.
    #[error("notification delivery failed: {0}")]
    NotificationDelivery(String),

    /// Missing or invalid required option. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
