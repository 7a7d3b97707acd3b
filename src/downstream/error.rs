use crate::resilience::retry::RetryableError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownstreamError {
    #[error("Temperature service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl RetryableError for DownstreamError {
    fn is_retryable(&self) -> bool {
        match self {
            // Connection failures and timeouts
            DownstreamError::NetworkError(_) => true,
            // Server errors and request timeout
            DownstreamError::Status { status, .. } => *status >= 500 || *status == 408,
            DownstreamError::SerializationError(_) => false,
            DownstreamError::InvalidUrl(_) => false,
        }
    }
}

impl DownstreamError {
    pub fn from_status_code(status: u16, message: String) -> Self {
        DownstreamError::Status { status, message }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            DownstreamError::Status { status, .. } => Some(*status),
            DownstreamError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        for status in [500, 502, 503, 504] {
            let error = DownstreamError::from_status_code(status, "Server error".to_string());
            assert!(error.is_retryable(), "HTTP {} should be retryable", status);
        }
    }

    #[test]
    fn test_request_timeout_is_retryable() {
        let error = DownstreamError::from_status_code(408, "Request Timeout".to_string());
        assert!(error.is_retryable());
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        for status in [400, 401, 403, 404, 422] {
            let error = DownstreamError::from_status_code(status, "Client error".to_string());
            assert!(!error.is_retryable(), "HTTP {} should not be retryable", status);
        }
    }

    #[test]
    fn test_serialization_error_not_retryable() {
        let error: DownstreamError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(!error.is_retryable());
        assert_eq!(error.status_code(), None);
    }

    #[test]
    fn test_status_message() {
        let error = DownstreamError::from_status_code(503, "down".to_string());
        assert_eq!(error.to_string(), "Temperature service returned HTTP 503: down");
        assert_eq!(error.status_code(), Some(503));
    }
}
