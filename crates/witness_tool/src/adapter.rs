//! Tracking adapter for tool invocations.
//!
//! Every call through the adapter is bracketed by `begin` and `complete` or
//! `fail` on the execution registry. Successful results carry the
//! `execution_id` and `executed_at` fields so downstream text can cite them.

use crate::trait_::{Tool, ToolError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use witness_core::{ExecutionId, Timestamp};
use witness_registry::ExecutionRegistry;

/// Field carrying the execution ID in augmented output
pub const EXECUTION_ID_FIELD: &str = "execution_id";

/// Field carrying the execution time in augmented output
pub const EXECUTED_AT_FIELD: &str = "executed_at";

/// Field holding a scalar result once wrapped into a mapping
pub const RESULT_FIELD: &str = "result";

/// Merge tracking fields into a tool result.
///
/// Objects gain the fields in place, overwriting any the tool supplied.
/// Anything else is wrapped as `{"result": value, ...}`.
#[must_use]
pub fn augment_output(value: Value, execution_id: &ExecutionId, executed_at: Timestamp) -> Value {
    let mut map = match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert(RESULT_FIELD.to_string(), other);
            map
        }
    };
    map.insert(
        EXECUTION_ID_FIELD.to_string(),
        Value::String(execution_id.to_string()),
    );
    map.insert(
        EXECUTED_AT_FIELD.to_string(),
        Value::String(executed_at.to_rfc3339()),
    );
    Value::Object(map)
}

/// Fails the record if dropped while the invocation is still in flight.
struct PendingGuard<'a> {
    registry: &'a ExecutionRegistry,
    execution_id: &'a ExecutionId,
    started: Instant,
    reason: &'static str,
    armed: bool,
}

impl<'a> PendingGuard<'a> {
    fn new(
        registry: &'a ExecutionRegistry,
        execution_id: &'a ExecutionId,
        started: Instant,
        reason: &'static str,
    ) -> Self {
        Self {
            registry,
            execution_id,
            started,
            reason,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(execution_id = %self.execution_id, reason = self.reason, "invocation abandoned");
        if let Err(err) = self
            .registry
            .fail(self.execution_id.as_str(), self.reason, self.started.elapsed())
        {
            debug!(execution_id = %self.execution_id, %err, "could not record abandoned invocation");
        }
    }
}

/// Record the outcome of a finished call and shape what the caller sees.
fn settle<E: Display>(
    registry: &ExecutionRegistry,
    tool_name: &str,
    execution_id: &ExecutionId,
    outcome: Result<Value, E>,
    elapsed: Duration,
) -> Result<Value, E> {
    match outcome {
        Ok(value) => {
            if let Err(err) = registry.complete(execution_id.as_str(), value.clone(), elapsed) {
                warn!(execution_id = %execution_id, tool = tool_name, %err, "could not record completion");
            }
            Ok(augment_output(value, execution_id, registry.now()))
        }
        Err(err) => {
            warn!(execution_id = %execution_id, tool = tool_name, error = %err, "tool invocation failed");
            if let Err(record_err) = registry.fail(execution_id.as_str(), err.to_string(), elapsed) {
                warn!(execution_id = %execution_id, tool = tool_name, err = %record_err, "could not record failure");
            }
            Err(err)
        }
    }
}

/// Tool wrapper that records every invocation
pub struct TrackedTool<T> {
    /// The underlying tool
    inner: T,
    /// Where invocations are recorded
    registry: Arc<ExecutionRegistry>,
    /// Upper bound on a single call
    timeout: Option<Duration>,
}

impl<T: Tool> TrackedTool<T> {
    /// Wrap `inner`, taking its timeout from the registry config
    #[must_use]
    pub fn new(inner: T, registry: Arc<ExecutionRegistry>) -> Self {
        let timeout = registry.config().timeout_for(inner.name());
        Self {
            inner,
            registry,
            timeout,
        }
    }

    /// Override the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The wrapped tool
    #[must_use]
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// The registry invocations are recorded in
    #[must_use]
    pub fn registry(&self) -> &Arc<ExecutionRegistry> {
        &self.registry
    }
}

#[async_trait]
impl<T: Tool> Tool for TrackedTool<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        let tool_name = self.inner.name();
        let started = Instant::now();
        let execution_id = self.registry.begin(tool_name, arguments.clone());
        let mut guard = PendingGuard::new(
            &self.registry,
            &execution_id,
            started,
            "cancelled before completion",
        );

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.invoke(arguments))
                .await
                .unwrap_or_else(|_| {
                    Err(ToolError::Timeout {
                        tool: tool_name.to_string(),
                        after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    })
                }),
            None => self.inner.invoke(arguments).await,
        };
        guard.disarm();

        settle(
            &self.registry,
            tool_name,
            &execution_id,
            outcome,
            started.elapsed(),
        )
    }
}

/// Wrap a synchronous callable so each call is tracked.
///
/// The returned closure has the same signature as `func`. Errors are
/// recorded and handed back unchanged.
pub fn track_fn<F, E>(
    registry: Arc<ExecutionRegistry>,
    tool_name: impl Into<String>,
    func: F,
) -> impl Fn(Value) -> Result<Value, E>
where
    F: Fn(Value) -> Result<Value, E>,
    E: Display,
{
    let tool_name = tool_name.into();
    move |arguments| {
        let started = Instant::now();
        let execution_id = registry.begin(&tool_name, arguments.clone());
        let mut guard = PendingGuard::new(
            &registry,
            &execution_id,
            started,
            "aborted before completion",
        );
        let outcome = func(arguments);
        guard.disarm();
        drop(guard);
        settle(&registry, &tool_name, &execution_id, outcome, started.elapsed())
    }
}
