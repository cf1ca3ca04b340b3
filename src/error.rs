//! Unified error hierarchy for liftrs
//!
//! Structured error types for the analytics pipeline, with integration into
//! the tracing system. Data unavailability (no history, no baseline) is not
//! an error anywhere in this crate; errors are reserved for store failures
//! and invalid arguments.

use thiserror::Error;

/// Top-level error type for all liftrs operations
#[derive(Debug, Error)]
pub enum LiftrsError {
    /// Data access failures from the backing store
    #[error("Data access error: {0}")]
    DataAccess(#[from] DataAccessError),

    /// Analytics calculation errors
    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised by `DataAccess` implementations
#[derive(Debug, Error)]
pub enum DataAccessError {
    /// Underlying store rejected or failed the query
    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    /// Connection to the store failed
    #[error("Store connection failed: {reason}")]
    ConnectionFailed { reason: String },

    /// Referenced row does not exist
    #[error("Record not found: {entity}.{id}")]
    NotFound { entity: String, id: String },

    /// Row contents could not be decoded into a domain type
    #[error("Invalid row in {entity}: {reason}")]
    InvalidRow { entity: String, reason: String },
}

impl From<rusqlite::Error> for DataAccessError {
    fn from(err: rusqlite::Error) -> Self {
        DataAccessError::QueryFailed {
            reason: err.to_string(),
        }
    }
}

/// Errors raised by the scoring components
#[derive(Debug, Error)]
pub enum CalculationError {
    /// Invalid parameter
    #[error("Invalid parameter for {calculation}: {parameter}={value}")]
    InvalidParameter {
        calculation: String,
        parameter: String,
        value: String,
    },

    /// Invalid time window
    #[error("Invalid window for {calculation}: {reason}")]
    InvalidWindow { calculation: String, reason: String },
}

/// Result type alias for liftrs operations
pub type Result<T> = std::result::Result<T, LiftrsError>;

impl LiftrsError {
    /// Check if the error is worth retrying at a higher layer
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LiftrsError::DataAccess(DataAccessError::ConnectionFailed { .. })
                | LiftrsError::Io(_)
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            LiftrsError::DataAccess(DataAccessError::NotFound { .. }) => ErrorSeverity::Warning,
            LiftrsError::Calculation(_) => ErrorSeverity::Warning,
            LiftrsError::DataAccess(_) => ErrorSeverity::Error,
            LiftrsError::Configuration(_) | LiftrsError::Io(_) => ErrorSeverity::Error,
            LiftrsError::Internal(_) => ErrorSeverity::Critical,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents the operation but the system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical | ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = LiftrsError::DataAccess(DataAccessError::NotFound {
            entity: "template".to_string(),
            id: "t1".to_string(),
        });
        assert_eq!(err.severity(), ErrorSeverity::Warning);

        let err = LiftrsError::Internal("boom".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_error_retryable() {
        let err = LiftrsError::DataAccess(DataAccessError::ConnectionFailed {
            reason: "timeout".to_string(),
        });
        assert!(err.is_retryable());

        let err = LiftrsError::Calculation(CalculationError::InvalidWindow {
            calculation: "fatigue".to_string(),
            reason: "start after end".to_string(),
        });
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_data_access_error_display() {
        let err = DataAccessError::QueryFailed {
            reason: "syntax".to_string(),
        };
        assert!(err.to_string().contains("Query failed"));
    }
}
