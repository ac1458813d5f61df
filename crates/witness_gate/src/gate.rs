//! Response gate.
//!
//! A response passes only when every claim and every bare execution ID in it
//! verifies. Otherwise the whole response is replaced by a remediation
//! message listing each problem found.

use crate::claim::Extraction;
use crate::extract::{ClaimExtractor, PatternExtractor};
use crate::verify::{InvalidReason, Verdict, Verifier};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};
use witness_core::GateConfig;
use witness_registry::{ExecutionRecord, ExecutionRegistry};

/// One claim that failed verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Tool named by the claim, or by the matching record
    pub tool_name: Option<String>,
    /// Execution ID cited by the claim
    pub execution_id: Option<String>,
    /// Reason code
    pub reason: InvalidReason,
    /// Human-readable explanation
    pub detail: String,
}

impl Issue {
    fn from_verdict(tool_name: Option<&str>, execution_id: Option<&str>, verdict: Verdict) -> Option<Self> {
        match verdict {
            Verdict::Valid { .. } => None,
            Verdict::Invalid {
                reason,
                detail,
                recorded_tool,
            } => Some(Self {
                tool_name: tool_name.map(str::to_string).or(recorded_tool),
                execution_id: execution_id.map(str::to_string),
                reason,
                detail,
            }),
        }
    }
}

/// Result of reviewing a response
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// Every claim verified; the response is unchanged
    Passed {
        /// The original response
        response: String,
        /// Records backing the verified claims, in order of appearance
        verified: Vec<ExecutionRecord>,
    },
    /// At least one claim failed; the response was withheld
    Rejected {
        /// Remediation text shown instead of the response
        message: String,
        /// Every failed claim, in order of appearance
        issues: Vec<Issue>,
        /// Records backing the claims that did verify
        verified: Vec<ExecutionRecord>,
    },
}

impl GateOutcome {
    /// Check if the response passed
    #[must_use]
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }

    /// Issues found, empty when passed
    #[must_use]
    pub fn issues(&self) -> &[Issue] {
        match self {
            Self::Passed { .. } => &[],
            Self::Rejected { issues, .. } => issues,
        }
    }

    /// Records backing the claims that verified
    #[must_use]
    pub fn verified(&self) -> &[ExecutionRecord] {
        match self {
            Self::Passed { verified, .. } | Self::Rejected { verified, .. } => verified,
        }
    }

    /// Text to show the user
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Passed { response, .. } => response,
            Self::Rejected { message, .. } => message,
        }
    }
}

/// Decides whether a generated response may be shown to the user
pub struct Gatekeeper {
    registry: Arc<ExecutionRegistry>,
    extractor: Box<dyn ClaimExtractor>,
    config: GateConfig,
}

impl Gatekeeper {
    /// Create a gatekeeper with default configuration
    #[must_use]
    pub fn new(registry: Arc<ExecutionRegistry>) -> Self {
        Self::with_config(registry, GateConfig::default())
    }

    /// Create a gatekeeper with custom configuration
    #[must_use]
    pub fn with_config(registry: Arc<ExecutionRegistry>, config: GateConfig) -> Self {
        let extractor = PatternExtractor::new().with_lenient(config.lenient_blocks);
        Self {
            registry,
            extractor: Box::new(extractor),
            config,
        }
    }

    /// Replace the claim extractor
    #[must_use]
    pub fn with_extractor(mut self, extractor: impl ClaimExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Registry claims are checked against
    #[must_use]
    pub fn registry(&self) -> &Arc<ExecutionRegistry> {
        &self.registry
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Review a response, reporting every failed claim
    #[must_use]
    pub fn review(&self, response: &str) -> GateOutcome {
        let extraction = self.extractor.extract(response);
        if extraction.is_empty() {
            debug!("response makes no tool claims");
            return GateOutcome::Passed {
                response: response.to_string(),
                verified: Vec::new(),
            };
        }

        let (verified, issues) = self.check(&extraction);
        if issues.is_empty() {
            info!(
                claims = extraction.claims.len(),
                references = extraction.referenced_ids.len(),
                "response passed verification"
            );
            return GateOutcome::Passed {
                response: response.to_string(),
                verified,
            };
        }

        for issue in &issues {
            warn!(
                tool = issue.tool_name.as_deref().unwrap_or("unknown"),
                execution_id = issue.execution_id.as_deref().unwrap_or("none"),
                reason = %issue.reason,
                "unverified tool claim"
            );
        }
        GateOutcome::Rejected {
            message: remediation_message(&issues, self.config.max_issues_listed),
            issues,
            verified,
        }
    }

    /// Return the response if it verifies, or a remediation message
    #[must_use]
    pub fn filter(&self, response: &str) -> String {
        self.review(response).into_text()
    }

    fn check(&self, extraction: &Extraction) -> (Vec<ExecutionRecord>, Vec<Issue>) {
        let verifier = Verifier::new(&self.registry);
        let mut verified = Vec::new();
        let mut issues = Vec::new();

        let claims = extraction.claims.iter().map(|claim| {
            (
                claim.tool_name.as_deref(),
                claim.execution_id.as_deref(),
                verifier.verify_claim(claim),
            )
        });
        let references = extraction
            .referenced_ids
            .iter()
            .map(|id| (None, Some(id.as_str()), verifier.verify_reference(id)));

        for (tool_name, execution_id, verdict) in claims.chain(references) {
            match verdict {
                Verdict::Valid { record } => verified.push(record),
                invalid => issues.extend(Issue::from_verdict(tool_name, execution_id, invalid)),
            }
        }
        (verified, issues)
    }
}

/// Render the message shown in place of a rejected response.
///
/// Output depends only on `issues` and `max_listed`.
#[must_use]
pub fn remediation_message(issues: &[Issue], max_listed: usize) -> String {
    let mut message = String::from(
        "Unverified tool results detected. This response was withheld because it \
         reports tool output that cannot be traced to a completed execution.\n",
    );

    for (n, issue) in issues.iter().take(max_listed).enumerate() {
        let _ = writeln!(
            message,
            "{}. tool: {}, execution_id: {}, reason: {} ({})",
            n + 1,
            issue.tool_name.as_deref().unwrap_or("unknown"),
            issue.execution_id.as_deref().unwrap_or("none"),
            issue.reason,
            issue.detail
        );
    }
    if issues.len() > max_listed {
        let _ = writeln!(message, "... and {} more", issues.len() - max_listed);
    }

    message.push_str("Run the tools again and report only the results they return, citing each execution_id.");
    message
}
