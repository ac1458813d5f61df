//! Bounded execution registry.
//!
//! The lookup index and the retention queue live behind one mutex, so a
//! record is reachable by ID exactly while it sits in the queue.

use crate::record::{ExecutionRecord, ExecutionState, RecordSummary};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};
use witness_core::{
    Clock, ExecutionId, IdGenerator, SystemClock, Timestamp, TrackingConfig, WitnessError,
    WitnessResult,
};

#[derive(Debug, Default)]
struct Inner {
    /// Records by execution ID
    records: HashMap<ExecutionId, ExecutionRecord>,
    /// Execution IDs, oldest first
    order: VecDeque<ExecutionId>,
    ids: IdGenerator,
}

impl Inner {
    /// Drop records from the front while over capacity or expired.
    ///
    /// The queue is ordered by start time, so the first retained record
    /// ends the scan.
    fn evict(&mut self, now: Timestamp, retention: Duration, capacity: usize) -> usize {
        let mut evicted = 0;
        while let Some(oldest) = self.order.front() {
            let over_capacity = self.order.len() > capacity;
            let expired = self
                .records
                .get(oldest)
                .is_none_or(|r| r.is_expired_at(now, retention));
            if !over_capacity && !expired {
                break;
            }
            if let Some(id) = self.order.pop_front() {
                self.records.remove(&id);
                debug!(execution_id = %id, over_capacity, "evicted execution record");
                evicted += 1;
            }
        }
        evicted
    }
}

/// Registry of real tool executions
///
/// Owned by the agent session and shared by reference with the invocation
/// wrapper and the gatekeeper.
#[derive(Debug)]
pub struct ExecutionRegistry {
    config: TrackingConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl ExecutionRegistry {
    /// Create a registry on the system clock
    #[must_use]
    pub fn new(config: TrackingConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a registry on a custom clock.
    ///
    /// A zero capacity is raised to one so a fresh record is always
    /// retrievable.
    #[must_use]
    pub fn with_clock(mut config: TrackingConfig, clock: Arc<dyn Clock>) -> Self {
        if config.capacity == 0 {
            warn!("registry capacity of zero raised to one");
            config.capacity = 1;
        }
        Self {
            config,
            clock,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Current time on the registry clock
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Whether `record` is past the retention window right now
    #[must_use]
    pub fn is_expired(&self, record: &ExecutionRecord) -> bool {
        record.is_expired_at(self.now(), self.config.retention())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every mutation completes in one step, so a poisoned guard still
        // holds consistent structures.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the start of an invocation and return its execution ID
    pub fn begin(&self, tool_name: &str, arguments: serde_json::Value) -> ExecutionId {
        let mut inner = self.lock();
        // Read under the lock so the queue stays in start order.
        let now = self.now();

        let id = loop {
            let candidate = inner.ids.allocate(tool_name, now);
            if !inner.records.contains_key(&candidate) {
                break candidate;
            }
            debug!(execution_id = %candidate, "execution id collision, regenerating");
        };

        let record = ExecutionRecord::pending(id.clone(), tool_name.to_string(), arguments, now);
        inner.records.insert(id.clone(), record);
        inner.order.push_back(id.clone());
        inner.evict(now, self.config.retention(), self.config.capacity);

        debug!(execution_id = %id, tool = tool_name, "execution started");
        id
    }

    /// Mark a pending invocation as completed
    ///
    /// # Errors
    ///
    /// Returns error if the record is unknown or already terminal
    pub fn complete(
        &self,
        execution_id: &str,
        result: serde_json::Value,
        duration: Duration,
    ) -> WitnessResult<()> {
        self.finish(execution_id, duration, |record| {
            record.state = ExecutionState::Completed;
            record.result = Some(result);
        })?;
        debug!(execution_id, ?duration, "execution completed");
        Ok(())
    }

    /// Mark a pending invocation as failed
    ///
    /// # Errors
    ///
    /// Returns error if the record is unknown or already terminal
    pub fn fail(
        &self,
        execution_id: &str,
        error: impl Into<String>,
        duration: Duration,
    ) -> WitnessResult<()> {
        let error = error.into();
        debug!(execution_id, %error, ?duration, "execution failed");
        self.finish(execution_id, duration, |record| {
            record.state = ExecutionState::Failed;
            record.error = Some(error);
        })
    }

    fn finish(
        &self,
        execution_id: &str,
        duration: Duration,
        apply: impl FnOnce(&mut ExecutionRecord),
    ) -> WitnessResult<()> {
        let mut inner = self.lock();
        let record = inner
            .records
            .get_mut(execution_id)
            .ok_or_else(|| WitnessError::RecordNotFound {
                execution_id: execution_id.to_string(),
            })?;
        if record.state.is_terminal() {
            return Err(WitnessError::AlreadyTerminal {
                execution_id: execution_id.to_string(),
                state: record.state.to_string(),
            });
        }
        apply(record);
        record.duration = Some(duration);
        Ok(())
    }

    /// Find a record by execution ID.
    ///
    /// Records past the retention window but not yet pruned are still
    /// returned; callers judge age with [`ExecutionRegistry::is_expired`].
    #[must_use]
    pub fn lookup(&self, execution_id: &str) -> Option<ExecutionRecord> {
        self.lock().records.get(execution_id).cloned()
    }

    /// Remove expired and over-capacity records, returning how many went
    pub fn prune(&self) -> usize {
        let now = self.now();
        let evicted = self
            .lock()
            .evict(now, self.config.retention(), self.config.capacity);
        if evicted > 0 {
            debug!(evicted, "pruned execution registry");
        }
        evicted
    }

    /// The `k` most recent records, newest first
    #[must_use]
    pub fn recent(&self, k: usize) -> Vec<RecordSummary> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.records.get(id))
            .take(k)
            .map(ExecutionRecord::summary)
            .collect()
    }

    /// Number of records held
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Check if no records are held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ExecutionRegistry {
    fn default() -> Self {
        Self::new(TrackingConfig::default())
    }
}
