//! WITNESS Execution Registry
//!
//! Authoritative, in-memory account of which tool invocations really
//! happened. Records are retained for a bounded count and a bounded time,
//! whichever runs out first.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod record;
pub mod registry;

pub use record::{ExecutionRecord, ExecutionState, RecordSummary};
pub use registry::ExecutionRegistry;
