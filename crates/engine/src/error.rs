//! Error taxonomy for the signal engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed, too short or unordered candle input
    #[error("Validation error: {0}")]
    Validation(String),

    /// No trained classifier artifact is loaded
    #[error("No trained model available: {0}")]
    MissingModel(String),

    /// One timeframe could not be fetched or validated
    #[error("Partial data for {timeframe}: {reason}")]
    PartialData { timeframe: String, reason: String },

    /// The primary timeframe could not be fetched
    #[error("Fetch error for {symbol} {timeframe}: {reason}")]
    Fetch {
        symbol: String,
        timeframe: String,
        reason: String,
    },

    /// Classifier artifact unreadable or internally inconsistent
    #[error("Model artifact error: {0}")]
    Artifact(String),

    #[error("Indicator error: {0}")]
    Indicator(#[from] ta::errors::TaError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
