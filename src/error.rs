use poem::http::StatusCode;
use poem::Error as PoemError;
use thiserror::Error;

/// The caller abandoned the call before it finished
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled by caller")]
pub struct Cancelled;

/// Terminal error of one logical call through the executor
#[derive(Error, Debug)]
pub enum CallError<E> {
    /// The breaker rejected the call; the operation was never invoked
    #[error("circuit breaker is open for {dependency}")]
    CircuitOpen { dependency: String },

    /// The operation failed after retries; carries the last failure
    #[error("downstream call failed: {0}")]
    Downstream(E),

    /// Cancellation or timeout on the caller side
    #[error("call cancelled before completion")]
    Cancelled,
}

impl<E> CallError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CallError::CircuitOpen { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CallError::Cancelled)
    }

    pub fn into_downstream(self) -> Option<E> {
        match self {
            CallError::Downstream(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<Cancelled> for CallError<E> {
    fn from(_: Cancelled) -> Self {
        CallError::Cancelled
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failure threshold must be at least 1")]
    ZeroFailureThreshold,

    #[error("break duration must be greater than zero")]
    ZeroBreakDuration,

    #[error("temperature service URL is empty")]
    MissingServiceUrl,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Gateway timeout")]
    GatewayTimeout,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl<E: std::fmt::Display> From<CallError<E>> for AppError {
    fn from(err: CallError<E>) -> Self {
        match err {
            CallError::CircuitOpen { .. } => AppError::ServiceUnavailable(err.to_string()),
            CallError::Downstream(e) => AppError::BadGateway(e.to_string()),
            CallError::Cancelled => AppError::GatewayTimeout,
        }
    }
}

impl From<AppError> for PoemError {
    fn from(err: AppError) -> Self {
        PoemError::from_string(err.to_string(), err.status_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_error_helpers() {
        let open: CallError<String> = CallError::CircuitOpen {
            dependency: "temperature".to_string(),
        };
        assert!(open.is_circuit_open());
        assert!(!open.is_cancelled());
        assert_eq!(open.to_string(), "circuit breaker is open for temperature");

        let cancelled: CallError<String> = Cancelled.into();
        assert!(cancelled.is_cancelled());

        let failed: CallError<String> = CallError::Downstream("HTTP 500".to_string());
        assert_eq!(failed.into_downstream(), Some("HTTP 500".to_string()));
    }

    #[test]
    fn test_app_error_status_codes() {
        let open: CallError<String> = CallError::CircuitOpen {
            dependency: "temperature".to_string(),
        };
        assert_eq!(AppError::from(open).status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let failed: CallError<String> = CallError::Downstream("boom".to_string());
        assert_eq!(AppError::from(failed).status_code(), StatusCode::BAD_GATEWAY);

        let cancelled: CallError<String> = CallError::Cancelled;
        assert_eq!(AppError::from(cancelled).status_code(), StatusCode::GATEWAY_TIMEOUT);
    }
}
