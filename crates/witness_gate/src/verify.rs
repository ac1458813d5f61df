//! Claim verification against the execution registry.
//!
//! Checks run in a fixed order and stop at the first failure: missing ID,
//! unknown ID, expired record, tool mismatch, unfinished execution.

use crate::claim::Claim;
use serde::Serialize;
use witness_registry::{ExecutionRecord, ExecutionRegistry, ExecutionState};

/// Bare references that stand for "no ID" rather than an ID
const PLACEHOLDER_IDS: &[&str] = &["null", "none", "nil", "n/a", "na", "unknown", "tbd", "pending"];

/// Why a claim failed verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// The claim cites no execution ID
    MissingExecutionId,
    /// No record exists under the cited ID
    NotFound,
    /// The record is older than the retention window
    Expired,
    /// The claim names a different tool than the one that ran
    ToolNameMismatch,
    /// The execution is still pending or failed
    ExecutionIncomplete,
}

impl InvalidReason {
    /// Stable reason code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingExecutionId => "missing_execution_id",
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::ToolNameMismatch => "tool_name_mismatch",
            Self::ExecutionIncomplete => "execution_incomplete",
        }
    }
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of checking one claim
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The claim matches a real, completed, retained execution
    Valid {
        /// The matching record, carrying the real result
        record: ExecutionRecord,
    },
    /// The claim could not be verified
    Invalid {
        /// Reason code
        reason: InvalidReason,
        /// Human-readable explanation
        detail: String,
        /// Tool that actually ran, when a record was found
        recorded_tool: Option<String>,
    },
}

impl Verdict {
    fn invalid(reason: InvalidReason, detail: impl Into<String>, recorded_tool: Option<&str>) -> Self {
        Self::Invalid {
            reason,
            detail: detail.into(),
            recorded_tool: recorded_tool.map(str::to_string),
        }
    }

    /// Check if the claim verified
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Reason code when invalid
    #[must_use]
    pub fn reason(&self) -> Option<InvalidReason> {
        match self {
            Self::Valid { .. } => None,
            Self::Invalid { reason, .. } => Some(*reason),
        }
    }

    /// Matching record when valid
    #[must_use]
    pub fn record(&self) -> Option<&ExecutionRecord> {
        match self {
            Self::Valid { record } => Some(record),
            Self::Invalid { .. } => None,
        }
    }
}

/// Checks claims against an execution registry
#[derive(Debug, Clone, Copy)]
pub struct Verifier<'a> {
    registry: &'a ExecutionRegistry,
}

impl<'a> Verifier<'a> {
    /// Create a verifier over `registry`
    #[must_use]
    pub fn new(registry: &'a ExecutionRegistry) -> Self {
        Self { registry }
    }

    /// Verify a structured claim
    #[must_use]
    pub fn verify_claim(&self, claim: &Claim) -> Verdict {
        self.verify(claim.execution_id.as_deref(), claim.tool_name.as_deref())
    }

    /// Verify a bare execution-ID reference
    #[must_use]
    pub fn verify_reference(&self, execution_id: &str) -> Verdict {
        let trimmed = execution_id.trim();
        let placeholder = PLACEHOLDER_IDS
            .iter()
            .any(|p| p.eq_ignore_ascii_case(trimmed));
        let id = Some(trimmed).filter(|id| !id.is_empty() && !placeholder);
        self.verify(id, None)
    }

    /// Verify an execution ID and optional claimed tool name
    #[must_use]
    pub fn verify(&self, execution_id: Option<&str>, tool_name: Option<&str>) -> Verdict {
        let Some(execution_id) = execution_id else {
            return Verdict::invalid(
                InvalidReason::MissingExecutionId,
                "no execution ID cited",
                None,
            );
        };

        let Some(record) = self.registry.lookup(execution_id) else {
            return Verdict::invalid(
                InvalidReason::NotFound,
                "no execution recorded under this ID",
                None,
            );
        };
        let recorded_tool = Some(record.tool_name.as_str());

        let now = self.registry.now();
        let retention = self.registry.config().retention();
        if record.is_expired_at(now, retention) {
            return Verdict::invalid(
                InvalidReason::Expired,
                format!(
                    "execution is {}s old, retention window is {}s",
                    record.age_at(now).as_secs(),
                    retention.as_secs()
                ),
                recorded_tool,
            );
        }

        if let Some(claimed) = tool_name {
            if claimed != record.tool_name {
                return Verdict::invalid(
                    InvalidReason::ToolNameMismatch,
                    format!("claimed `{}` but the execution ran `{}`", claimed, record.tool_name),
                    recorded_tool,
                );
            }
        }

        match record.state {
            ExecutionState::Completed => Verdict::Valid { record },
            ExecutionState::Pending => Verdict::invalid(
                InvalidReason::ExecutionIncomplete,
                "execution has not completed",
                recorded_tool,
            ),
            ExecutionState::Failed => Verdict::invalid(
                InvalidReason::ExecutionIncomplete,
                format!(
                    "execution failed: {}",
                    record.error.as_deref().unwrap_or("unknown error")
                ),
                recorded_tool,
            ),
        }
    }
}
