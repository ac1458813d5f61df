//! Named set of tracked tools.

use crate::adapter::TrackedTool;
use crate::trait_::{Tool, ToolError};
use futures::future::join_all;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use witness_registry::ExecutionRegistry;

/// Tools available to the agent, each wrapped for tracking on registration
pub struct Toolbox {
    /// Shared execution registry
    registry: Arc<ExecutionRegistry>,
    /// Tracked tools by name, in registration order
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl Toolbox {
    /// Create an empty toolbox recording into `registry`
    #[must_use]
    pub fn new(registry: Arc<ExecutionRegistry>) -> Self {
        Self {
            registry,
            tools: IndexMap::new(),
        }
    }

    /// The registry invocations are recorded in
    #[must_use]
    pub fn registry(&self) -> &Arc<ExecutionRegistry> {
        &self.registry
    }

    /// Register a tool, wrapping it for tracking
    ///
    /// # Errors
    ///
    /// Returns error if the name is taken
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered { name });
        }
        let tracked = TrackedTool::new(tool, Arc::clone(&self.registry));
        self.tools.insert(name, Arc::new(tracked));
        Ok(())
    }

    /// Get a tracked tool by name
    ///
    /// # Errors
    ///
    /// Returns error if tool not found
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.tools
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| ToolError::NotFound {
                name: name.to_string(),
            })
    }

    /// Remove a tool
    ///
    /// # Errors
    ///
    /// Returns error if tool not found
    pub fn unregister(&mut self, name: &str) -> Result<(), ToolError> {
        self.tools
            .shift_remove(name)
            .map(|_| ())
            .ok_or_else(|| ToolError::NotFound {
                name: name.to_string(),
            })
    }

    /// Registered tool names, in registration order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Check if a tool is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if no tools are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool by name
    ///
    /// # Errors
    ///
    /// Returns error if the tool is unknown or the tool itself fails
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let tool = self.get(name)?;
        tool.invoke(arguments).await
    }

    /// Invoke independent tools concurrently; results keep call order
    pub async fn invoke_all(&self, calls: Vec<(String, Value)>) -> Vec<Result<Value, ToolError>> {
        join_all(
            calls
                .into_iter()
                .map(|(name, arguments)| async move { self.invoke(&name, arguments).await }),
        )
        .await
    }
}
