//! Core error types for WITNESS.

/// Core result type
pub type WitnessResult<T> = Result<T, WitnessError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WitnessError {
    /// No record is held for the execution ID
    #[error("Execution record not found: {execution_id}")]
    RecordNotFound {
        /// Requested execution ID
        execution_id: String,
    },

    /// Record already reached a terminal state
    #[error("Execution {execution_id} is already {state}")]
    AlreadyTerminal {
        /// Execution ID
        execution_id: String,
        /// Terminal state name
        state: String,
    },

    /// Configuration value rejected
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Configuration could not be decoded
    #[error("Config parse error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for WitnessError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WitnessError::RecordNotFound {
            execution_id: "ping_1_abcd".to_string(),
        };
        assert_eq!(format!("{}", err), "Execution record not found: ping_1_abcd");

        let err = WitnessError::AlreadyTerminal {
            execution_id: "ping_1_abcd".to_string(),
            state: "completed".to_string(),
        };
        assert_eq!(format!("{}", err), "Execution ping_1_abcd is already completed");
    }

    #[test]
    fn test_config_error_from_json() {
        let err: WitnessError = serde_json::from_str::<u64>("nope").unwrap_err().into();
        assert!(matches!(err, WitnessError::Config(_)));
    }

    #[test]
    fn test_error_equality() {
        let a = WitnessError::Config("x".to_string());
        let b = WitnessError::Config("x".to_string());
        assert_eq!(a, b);
        assert_ne!(
            a,
            WitnessError::InvalidConfig {
                field: "capacity".to_string(),
                reason: "x".to_string()
            }
        );
    }
}
