//! Error taxonomy for the bridge.
//!
//! Every failure that can reach a webhook caller is one of these kinds,
//! and each kind maps to exactly one HTTP status.

use crate::risk::RiskViolation;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while authenticating, resolving contracts or routing orders.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Missing credentials, login refused, or no trading account available.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Caller-supplied input that cannot be acted on.
    #[error("{0}")]
    Validation(String),

    /// Tradovate answered with a non-success HTTP status.
    #[error("broker returned HTTP {status}")]
    Broker {
        status: u16,
        /// Decoded response body, when it was JSON.
        body: Option<serde_json::Value>,
        /// Raw response body.
        text: String,
    },

    /// The inbound webhook body was not valid JSON.
    #[error("invalid JSON payload: {0}")]
    Protocol(String),

    /// Shared secret missing or wrong.
    #[error("unauthorized")]
    Unauthorized,

    /// Timeout, connection failure or undecodable broker response.
    #[error("broker transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl BridgeError {
    /// HTTP status reported to the webhook caller for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BridgeError::Validation(_) | BridgeError::Protocol(_) => StatusCode::BAD_REQUEST,
            BridgeError::Unauthorized => StatusCode::UNAUTHORIZED,
            BridgeError::Broker { .. } | BridgeError::Transport(_) => StatusCode::BAD_GATEWAY,
            BridgeError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RiskViolation> for BridgeError {
    fn from(violation: RiskViolation) -> Self {
        BridgeError::Validation(violation.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
