//! Tool trait: typed external functions the model may call.
//!
//! A tool declares an input and an output [`Schema`]. The registry validates
//! arguments before the handler runs and validates the handler's result
//! before anyone sees it, so a tool can never hand malformed data to a flow.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RegistryError, ToolError};
use crate::model::ToolDefinition;
use crate::schema::Schema;

/// A tool call proposed by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call ID (matches the model's function call id when it sends one)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: Value,
}

/// A completed, validated tool execution, as recorded by the adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecution {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
    pub output: Value,
    pub duration_ms: u64,
}

/// The core Tool trait.
///
/// Handlers receive arguments that already passed `input_schema`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "getWeatherForecast").
    fn name(&self) -> &str;

    /// What the tool does (sent to the model).
    fn description(&self) -> &str;

    fn input_schema(&self) -> &Schema;

    fn output_schema(&self) -> &Schema;

    /// Run the handler with validated arguments.
    async fn call(&self, arguments: Value) -> Result<Value, ToolError>;

    /// Convert this tool into a declaration for the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.input_schema().to_json_schema(),
        }
    }
}

/// A registry of available tools.
///
/// Built once, then shared behind an `Arc`; invocation only needs `&self`.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Names must be unique.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Declarations for the named tools, in the order given.
    pub fn definitions<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<ToolDefinition>, ToolError> {
        names
            .iter()
            .map(|name| {
                self.get(name.as_ref())
                    .map(|t| t.to_definition())
                    .ok_or_else(|| ToolError::NotFound(name.as_ref().to_string()))
            })
            .collect()
    }

    /// Declarations for every registered tool, sorted by name.
    pub fn all_definitions(&self) -> Vec<ToolDefinition> {
        self.names()
            .into_iter()
            .filter_map(|name| self.get(name).map(|t| t.to_definition()))
            .collect()
    }

    /// Validate arguments, run the handler, validate its result.
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let arguments = tool
            .input_schema()
            .validate(&arguments)
            .map_err(|failure| ToolError::InputInvalid {
                tool: name.to_string(),
                failure,
            })?;

        let start = Instant::now();
        let output = tool.call(arguments).await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        match tool.output_schema().validate(&output) {
            Ok(output) => {
                tracing::debug!(tool = %name, duration_ms, "Tool completed");
                Ok(output)
            }
            Err(failure) => {
                tracing::error!(
                    tool = %name,
                    path = %failure.path,
                    expected = %failure.expected,
                    actual = %failure.actual,
                    "Tool returned output that violates its own schema"
                );
                Err(ToolError::OutputInvalid {
                    tool: name.to_string(),
                    failure,
                })
            }
        }
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
