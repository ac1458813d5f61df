//! Execution records and their lifecycle states.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use witness_core::{ExecutionId, Timestamp};

/// Lifecycle state of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Invocation started, no outcome yet
    Pending,
    /// Tool returned a result
    Completed,
    /// Tool raised an error, timed out, or was cancelled
    Failed,
}

impl ExecutionState {
    /// Whether no further transition is possible
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One real tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Unique execution ID
    pub execution_id: ExecutionId,
    /// Invoked tool
    pub tool_name: String,
    /// Call arguments, kept for diagnostics only
    pub arguments: serde_json::Value,
    /// When the call started
    pub started_at: Timestamp,
    /// Current state
    pub state: ExecutionState,
    /// Tool output, set once completed
    pub result: Option<serde_json::Value>,
    /// Error description, set once failed
    pub error: Option<String>,
    /// Start-to-terminal wall time
    pub duration: Option<Duration>,
}

impl ExecutionRecord {
    /// Create a pending record
    #[must_use]
    pub fn pending(
        execution_id: ExecutionId,
        tool_name: String,
        arguments: serde_json::Value,
        started_at: Timestamp,
    ) -> Self {
        Self {
            execution_id,
            tool_name,
            arguments,
            started_at,
            state: ExecutionState::Pending,
            result: None,
            error: None,
            duration: None,
        }
    }

    /// Age of the record at `now`
    #[must_use]
    pub fn age_at(&self, now: Timestamp) -> Duration {
        now.duration_since(&self.started_at)
    }

    /// Whether the record has outlived `retention` at `now`
    #[must_use]
    pub fn is_expired_at(&self, now: Timestamp, retention: Duration) -> bool {
        self.age_at(now) > retention
    }

    /// Diagnostic view of the record
    #[must_use]
    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            execution_id: self.execution_id.clone(),
            tool_name: self.tool_name.clone(),
            state: self.state,
            started_at: self.started_at,
            duration: self.duration,
        }
    }
}

/// Operator-facing view of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    /// Execution ID
    pub execution_id: ExecutionId,
    /// Invoked tool
    pub tool_name: String,
    /// Current state
    pub state: ExecutionState,
    /// When the call started
    pub started_at: Timestamp,
    /// Start-to-terminal wall time, if terminal
    pub duration: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_at(millis: u64) -> ExecutionRecord {
        ExecutionRecord::pending(
            ExecutionId::from("ping_1_deadbeef"),
            "ping".to_string(),
            serde_json::json!({"host": "example.com"}),
            Timestamp::from_millis(millis),
        )
    }

    #[test]
    fn test_pending_record() {
        let record = record_at(1_000);
        assert_eq!(record.state, ExecutionState::Pending);
        assert!(record.result.is_none());
        assert!(record.error.is_none());
        assert!(record.duration.is_none());
    }

    #[test]
    fn test_state_terminal() {
        assert!(!ExecutionState::Pending.is_terminal());
        assert!(ExecutionState::Completed.is_terminal());
        assert!(ExecutionState::Failed.is_terminal());
        assert_eq!(ExecutionState::Failed.to_string(), "failed");
    }

    #[test]
    fn test_expiry_boundary() {
        let record = record_at(1_000);
        let retention = Duration::from_secs(300);
        assert!(!record.is_expired_at(Timestamp::from_millis(301_000), retention));
        assert!(record.is_expired_at(Timestamp::from_millis(301_001), retention));
    }

    #[test]
    fn test_summary_fields() {
        let summary = record_at(5).summary();
        assert_eq!(summary.tool_name, "ping");
        assert_eq!(summary.state, ExecutionState::Pending);
        assert_eq!(summary.started_at, Timestamp::from_millis(5));
    }

    #[test]
    fn test_state_serde() {
        assert_eq!(
            serde_json::to_string(&ExecutionState::Completed).unwrap(),
            "\"completed\""
        );
    }
}
