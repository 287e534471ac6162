//! Error types for the exchange connector

use thiserror::Error;

/// Result type alias for exchange operations
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Errors that can occur while talking to a venue
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Transport failure (connect, TLS, timeout, non-JSON body)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Venue reported an explicit error message
    #[error("API error: {message}")]
    Api { message: String },

    /// A post-only order was rejected because it would have traded
    #[error("Post-only order rejected: {message}")]
    PostOnlyRejected { message: String },

    /// Request could not be signed
    #[error("Signing error: {0}")]
    Signing(String),

    /// Configured venue name is not supported
    #[error("Unknown exchange: {0}")]
    UnknownVenue(String),
}

impl ExchangeError {
    /// Classify a venue-reported error message.
    ///
    /// Venues phrase post-only rejections differently; anything that reads like one
    /// becomes [`ExchangeError::PostOnlyRejected`] so callers can tell it apart.
    pub fn from_api_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        if lower.contains("post_only")
            || lower.contains("post-only")
            || lower.contains("postonly")
            || lower.contains("would have traded")
        {
            Self::PostOnlyRejected { message }
        } else {
            Self::Api { message }
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// True when the venue refused a maker order because it would have crossed the book
    pub fn is_post_only_rejection(&self) -> bool {
        matches!(self, Self::PostOnlyRejected { .. })
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_only_classification() {
        for msg in ["POST_ONLY_FAILED", "Order is post-only", "postOnly rejected", "Unable to place post-only order: would have traded"] {
            assert!(ExchangeError::from_api_message(msg).is_post_only_rejection(), "{msg}");
        }
    }

    #[test]
    fn test_plain_api_error() {
        let err = ExchangeError::from_api_message("INSUFFICIENT_FUNDS");
        assert!(!err.is_post_only_rejection());
        assert_eq!(err.to_string(), "API error: INSUFFICIENT_FUNDS");
    }
}
