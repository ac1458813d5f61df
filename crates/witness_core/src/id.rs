//! Execution identifiers.
//!
//! An ID reads `<tool>_<stamp>_<suffix>`: the sanitised tool name, a strictly
//! increasing microsecond stamp, and eight hex characters of a v4 UUID.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use uuid::Uuid;

/// Execution identifier - names exactly one tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(String);

impl ExecutionId {
    /// Wrap an existing identifier string
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Compose an identifier from its parts
    #[must_use]
    pub fn compose(tool_name: &str, stamp: u64) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{}_{}_{}", sanitize(tool_name), stamp, &suffix[..8]))
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ExecutionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ExecutionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ExecutionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Allocates execution IDs with strictly increasing stamps.
///
/// Not synchronised; the owner serialises access.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last_stamp: u64,
}

impl IdGenerator {
    /// Create a generator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next ID for `tool_name` at time `now`
    pub fn allocate(&mut self, tool_name: &str, now: Timestamp) -> ExecutionId {
        let micros = now.as_millis().saturating_mul(1_000);
        let stamp = micros.max(self.last_stamp.saturating_add(1));
        self.last_stamp = stamp;
        ExecutionId::compose(tool_name, stamp)
    }
}

fn sanitize(tool_name: &str) -> String {
    let cleaned: String = tool_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "tool".to_string()
    } else {
        cleaned
    }
}
