//! WITNESS Core Types
//!
//! Shared vocabulary for execution tracking: identifiers, clocks,
//! configuration, and errors. This crate performs no I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod id;
pub mod time;

// Re-exports
pub use config::{GateConfig, TrackingConfig};
pub use error::{WitnessError, WitnessResult};
pub use id::{ExecutionId, IdGenerator};
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
