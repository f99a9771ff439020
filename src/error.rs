//! Engine error taxonomy

use thiserror::Error;

/// Errors raised by the position and risk control engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Broker unreachable or a call exceeded its time budget
    #[error("Broker connectivity: {0}")]
    Connectivity(String),
    /// Price, leverage or precision data unusable for this instrument
    #[error("Invalid instrument state: {0}")]
    InvalidInstrumentState(String),
    /// The venue rejected every probed filling mode
    #[error("No acceptable filling mode for {0}")]
    NoAcceptableFillingMode(String),
    /// The broker answered with a non-success comment
    #[error("Order rejected for {symbol}: {comment}")]
    OrderRejected { symbol: String, comment: String },
    /// Caller-supplied volume or risk/reward fractions are unusable
    #[error("Invalid risk parameters: {0}")]
    InvalidRiskParameters(String),
}

impl EngineError {
    /// Whether the next polling tick may succeed without operator action
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Connectivity(_))
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EngineError::InvalidInstrumentState(format!("malformed broker payload: {err}"))
        } else {
            EngineError::Connectivity(err.to_string())
        }
    }
}

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, EngineError>;
