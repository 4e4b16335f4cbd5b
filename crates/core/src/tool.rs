//! Tool plugins and the registry that dispatches to them.
//!
//! The set of tools is closed: every plugin belongs to one [`ToolKind`], and
//! the model addresses tools by the kind's wire name. A name that maps to no
//! kind, or to a kind with no registered plugin, produces an "unknown tool"
//! result instead of an error, so the rest of the response's tool calls still
//! run and the model sees what went wrong.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Error text used when a tool call names no registered plugin.
pub const UNKNOWN_TOOL: &str = "unknown tool";

/// The closed set of tool kinds the agent knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    #[serde(rename = "math_tool")]
    Math,
    #[serde(rename = "weather_tool")]
    Weather,
}

impl ToolKind {
    /// Every kind, in advertisement order.
    pub const ALL: [ToolKind; 2] = [ToolKind::Math, ToolKind::Weather];

    /// The name the model uses to call this tool.
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Math => "math_tool",
            ToolKind::Weather => "weather_tool",
        }
    }

    /// Exact-match lookup of a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A tool definition advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool_name: String,

    #[serde(default)]
    pub args: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(tool_name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
        }
    }
}

/// Input echoed back with the output (if any) of one tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallData {
    pub input: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
}

/// The outcome of one tool execution, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool_name: String,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wall-clock duration, filled in by the registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,

    pub data: ToolCallData,
}

impl ToolCallResult {
    pub fn success(
        tool_name: impl Into<String>,
        input: serde_json::Value,
        output: serde_json::Value,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            error: None,
            execution_time_ms: None,
            data: ToolCallData {
                input,
                output: Some(output),
            },
        }
    }

    pub fn failure(
        tool_name: impl Into<String>,
        input: serde_json::Value,
        error: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            error: Some(error.into()),
            execution_time_ms: None,
            data: ToolCallData {
                input,
                output: None,
            },
        }
    }

    /// The result for a call whose name matches no registered plugin.
    pub fn unknown_tool(call: &ToolCallRequest) -> Self {
        Self::failure(call.tool_name.clone(), call.args.clone(), UNKNOWN_TOOL)
    }
}

/// The core Plugin trait.
///
/// `execute` is infallible by signature: invalid input and failures of any
/// external service must be reported as `ToolCallResult::failure`.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Which tool this plugin implements.
    fn kind(&self) -> ToolKind;

    /// The unique name of this tool (e.g., "math_tool").
    fn name(&self) -> &str {
        self.kind().name()
    }

    /// The schema advertised to the model.
    fn tool_details(&self) -> ToolDefinition;

    /// Run the tool on the model-supplied arguments.
    async fn execute(&self, input: serde_json::Value) -> ToolCallResult;
}

/// A registry of available plugins.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the model
/// 2. Dispatch the model's tool calls by name
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
    definitions: Vec<ToolDefinition>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            definitions: Vec::new(),
        }
    }

    /// Register a plugin. Replaces any existing plugin of the same kind,
    /// keeping its position in the advertisement order.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        let definition = plugin.tool_details();
        match self.plugins.iter().position(|p| p.kind() == plugin.kind()) {
            Some(idx) => {
                self.plugins[idx] = plugin;
                self.definitions[idx] = definition;
            }
            None => {
                self.plugins.push(plugin);
                self.definitions.push(definition);
            }
        }
    }

    /// Get the plugin registered for a kind.
    pub fn get(&self, kind: ToolKind) -> Option<&dyn Plugin> {
        self.plugins
            .iter()
            .find(|p| p.kind() == kind)
            .map(|p| p.as_ref())
    }

    /// Look up a plugin by the exact name the model used.
    pub fn resolve(&self, name: &str) -> Option<&dyn Plugin> {
        ToolKind::from_name(name).and_then(|kind| self.get(kind))
    }

    /// All tool definitions, in registration order.
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Execute one tool call. Never fails: unknown names and panicking
    /// plugins both come back as failure results.
    pub async fn execute(&self, call: &ToolCallRequest) -> ToolCallResult {
        let Some(plugin) = self.resolve(&call.tool_name) else {
            warn!(tool = %call.tool_name, "Model requested an unknown tool");
            return ToolCallResult::unknown_tool(call);
        };

        let start = Instant::now();
        let outcome = AssertUnwindSafe(plugin.execute(call.args.clone()))
            .catch_unwind()
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let mut result = match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(tool = %call.tool_name, "Tool plugin panicked");
                ToolCallResult::failure(plugin.name(), call.args.clone(), "tool execution panicked")
            }
        };
        result.execution_time_ms = Some(duration_ms);

        debug!(
            tool = %call.tool_name,
            success = result.success,
            duration_ms,
            "Tool executed"
        );
        result
    }

    /// Execute every call of one model response.
    ///
    /// Calls run concurrently; the results come back in request order, one
    /// per request.
    pub async fn execute_plugins(&self, calls: &[ToolCallRequest]) -> Vec<ToolCallResult> {
        futures::future::join_all(calls.iter().map(|call| self.execute(call))).await
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
