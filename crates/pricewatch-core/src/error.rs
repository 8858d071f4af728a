use thiserror::Error;

/// Failure taxonomy shared by every pricewatch component.
///
/// Per-item contexts (one alert, one bot instance, one history source) swallow
/// these and move on; only failures with no next step reach the caller.
#[derive(Error, Debug)]
pub enum PriceWatchError {
    #[error("No usable price history: {0}")]
    DataUnavailable(String),

    #[error("Model fitting failed: {0}")]
    ModelFitting(String),

    #[error("Lookup failed: {0}")]
    Lookup(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type PriceWatchResult<T> = Result<T, PriceWatchError>;

impl PriceWatchError {
    /// Wrap any displayable storage error.
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        PriceWatchError::Persistence(err.to_string())
    }

    pub fn lookup(err: impl std::fmt::Display) -> Self {
        PriceWatchError::Lookup(err.to_string())
    }
}
