//! WITNESS Tool System
//!
//! Tool interface plus the tracking wrapper that records every real
//! invocation in an [`witness_registry::ExecutionRegistry`].
//! The wrapper observes tool errors but never masks them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod toolbox;
pub mod trait_;

pub use adapter::{augment_output, track_fn, TrackedTool};
pub use toolbox::Toolbox;
pub use trait_::{FnTool, Tool, ToolError};
