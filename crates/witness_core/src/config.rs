//! Tracking and gate configuration.

use crate::error::{WitnessError, WitnessResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default retention window in seconds
pub const DEFAULT_RETENTION_SECS: u64 = 300;

/// Default number of records retained
pub const DEFAULT_CAPACITY: usize = 100;

/// Execution tracking configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// How long a record stays verifiable, in seconds
    pub retention_secs: u64,
    /// Maximum number of records retained
    pub capacity: usize,
    /// Timeout applied to tools without an override, in milliseconds
    pub default_timeout_ms: Option<u64>,
    /// Per-tool timeout overrides, in milliseconds
    pub tool_timeouts_ms: BTreeMap<String, u64>,
}

impl TrackingConfig {
    /// Create a config with default retention and capacity
    #[must_use]
    pub fn new() -> Self {
        Self {
            retention_secs: DEFAULT_RETENTION_SECS,
            capacity: DEFAULT_CAPACITY,
            default_timeout_ms: None,
            tool_timeouts_ms: BTreeMap::new(),
        }
    }

    /// Default config seeded with the network diagnostic operation timeouts
    #[must_use]
    pub fn with_network_defaults() -> Self {
        [
            ("ping", 5_000),
            ("dns_query", 10_000),
            ("dns_lookup", 10_000),
            ("web_request", 15_000),
            ("port_scan", 30_000),
            ("traceroute", 30_000),
            ("network_discovery", 120_000),
            ("nmap_basic", 60_000),
            ("nmap_service", 120_000),
            ("nmap_os", 180_000),
            ("comprehensive_scan", 600_000),
        ]
        .into_iter()
        .fold(Self::new(), |config, (tool, ms)| {
            config.with_tool_timeout(tool, Duration::from_millis(ms))
        })
    }

    /// Set retention window
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention_secs = retention.as_secs();
        self
    }

    /// Set record capacity
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set fallback timeout
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// Set timeout for one tool
    #[must_use]
    pub fn with_tool_timeout(mut self, tool: &str, timeout: Duration) -> Self {
        self.tool_timeouts_ms
            .insert(tool.to_string(), duration_ms(timeout));
        self
    }

    /// Retention window as a duration
    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Timeout for `tool`, falling back to the default
    #[must_use]
    pub fn timeout_for(&self, tool: &str) -> Option<Duration> {
        self.tool_timeouts_ms
            .get(tool)
            .copied()
            .or(self.default_timeout_ms)
            .map(Duration::from_millis)
    }

    /// Check invariants
    ///
    /// # Errors
    ///
    /// Returns error if capacity or retention is zero
    pub fn validate(&self) -> WitnessResult<()> {
        if self.capacity == 0 {
            return Err(WitnessError::InvalidConfig {
                field: "capacity".to_string(),
                reason: "must retain at least one record".to_string(),
            });
        }
        if self.retention_secs == 0 {
            return Err(WitnessError::InvalidConfig {
                field: "retention_secs".to_string(),
                reason: "retention window must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Parse and validate a JSON config
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or fails validation
    pub fn from_json(json: &str) -> WitnessResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Response gate configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Issues itemised in a remediation message before summarising the rest
    pub max_issues_listed: usize,
    /// Accept single-quoted dict literals as structured blocks
    pub lenient_blocks: bool,
}

impl GateConfig {
    /// Create a gate config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_issues_listed: 50,
            lenient_blocks: true,
        }
    }

    /// Set listing limit
    #[must_use]
    pub fn with_max_issues_listed(mut self, max: usize) -> Self {
        self.max_issues_listed = max;
        self
    }

    /// Toggle lenient block parsing
    #[must_use]
    pub fn with_lenient_blocks(mut self, lenient: bool) -> Self {
        self.lenient_blocks = lenient;
        self
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
