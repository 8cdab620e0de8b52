//! Tool abstractions: the registry boundary the loop executes against.
//!
//! The loop only sees [`ToolRegistry`]: resolve a name, run it, get back a
//! serialized payload or an error message. "Tool not found" is an error
//! *value*, never a panic, so the loop's absorption policy applies uniformly.
//!
//! [`ToolSet`] is the in-process registry built from [`Tool`] implementations;
//! [`RoutedRegistry`] fans `server:tool` names out to several registries.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::model::ToolDescriptor;
use crate::step::ToolCall;

/// The registry boundary consumed by the orchestration loop.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Descriptions of every tool, passed to the model unchanged.
    fn descriptors(&self) -> Vec<ToolDescriptor>;

    /// Execute one call. `Ok` carries the serialized payload, `Err` a message.
    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, String>;

    /// Whether calls of one iteration are independent and may run concurrently.
    fn supports_parallel(&self) -> bool {
        false
    }
}

/// A single executable capability.
///
/// Each tool validates its own arguments, typically by deserializing them
/// into a parameter struct with [`parse_arguments`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculator").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's arguments.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: Map<String, Value>,
        ctx: &ToolContext,
    ) -> Result<Value, ToolError>;

    fn to_descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            argument_schema: self.parameters_schema(),
        }
    }
}

/// Deserialize an open argument map into a tool's typed parameters.
pub fn parse_arguments<T: DeserializeOwned>(
    tool_name: &str,
    arguments: Map<String, Value>,
) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(arguments)).map_err(|e| ToolError::InvalidArguments {
        tool_name: tool_name.to_string(),
        reason: e.to_string(),
    })
}

/// An in-process registry of [`Tool`]s.
pub struct ToolSet {
    tools: BTreeMap<String, Box<dyn Tool>>,
    parallel: bool,
}

impl ToolSet {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            parallel: false,
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Declare that the registered tools are side-effect isolated from each other.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolSet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolRegistry for ToolSet {
    fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.to_descriptor()).collect()
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, String> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()).to_string())?;

        match tool.execute(call.arguments.clone(), ctx).await {
            Ok(Value::String(text)) => Ok(text),
            Ok(value) => serde_json::to_string(&value).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    fn supports_parallel(&self) -> bool {
        self.parallel
    }
}

/// Routes `server:tool` names to named sub-registries.
pub struct RoutedRegistry {
    servers: BTreeMap<String, Arc<dyn ToolRegistry>>,
}

impl RoutedRegistry {
    pub fn new() -> Self {
        Self {
            servers: BTreeMap::new(),
        }
    }

    /// Mount a registry under a server prefix.
    pub fn mount(mut self, server: impl Into<String>, registry: Arc<dyn ToolRegistry>) -> Self {
        let server = server.into();
        tracing::debug!(server = %server, "Mounting tool registry");
        self.servers.insert(server, registry);
        self
    }

    pub fn servers(&self) -> Vec<&str> {
        self.servers.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for RoutedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolRegistry for RoutedRegistry {
    fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.servers
            .iter()
            .flat_map(|(server, registry)| {
                registry.descriptors().into_iter().map(move |mut d| {
                    d.name = format!("{server}:{}", d.name);
                    d
                })
            })
            .collect()
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, String> {
        let (server, tool) = call.name.split_once(':').ok_or_else(|| {
            format!(
                "Invalid tool name format. Expected 'server:tool', got: {}",
                call.name
            )
        })?;

        let registry = self
            .servers
            .get(server)
            .ok_or_else(|| format!("Tool server not found: {server}"))?;

        let routed = ToolCall {
            name: tool.to_string(),
            arguments: call.arguments.clone(),
        };
        registry.execute(&routed, ctx).await
    }

    fn supports_parallel(&self) -> bool {
        self.servers.values().all(|r| r.supports_parallel())
    }
}
