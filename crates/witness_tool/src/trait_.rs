//! Tool trait

use async_trait::async_trait;
use serde_json::Value;

/// Error raised by a tool invocation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// The tool ran and reported failure
    #[error("Tool failed: {message}")]
    Failed {
        /// Failure description
        message: String,
    },

    /// The tool did not return in time
    #[error("{tool} timed out after {after_ms} ms")]
    Timeout {
        /// Tool name
        tool: String,
        /// Limit that elapsed
        after_ms: u64,
    },

    /// The invocation was abandoned before the tool returned
    #[error("{tool} cancelled before completion")]
    Cancelled {
        /// Tool name
        tool: String,
    },

    /// Arguments rejected
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// Why the input was rejected
        reason: String,
    },

    /// No tool registered under the name
    #[error("Tool not found: {name}")]
    NotFound {
        /// Requested name
        name: String,
    },

    /// Name already taken
    #[error("Tool already registered: {name}")]
    AlreadyRegistered {
        /// Conflicting name
        name: String,
    },
}

impl ToolError {
    /// Shorthand for [`ToolError::Failed`]
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// An external capability the agent can invoke.
///
/// Implementations are plain calls: one argument value in, one result value
/// or one error out.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;

    /// Run the tool
    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError>;
}

/// Tool backed by a synchronous closure
pub struct FnTool<F> {
    name: String,
    func: F,
}

impl<F> FnTool<F>
where
    F: Fn(Value) -> Result<Value, ToolError> + Send + Sync,
{
    /// Create a tool named `name` that runs `func`
    #[must_use]
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F> Tool for FnTool<F>
where
    F: Fn(Value) -> Result<Value, ToolError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        (self.func)(arguments)
    }
}
