//! Agent and Tool Definitions
//!
//! An [`AgentDefinition`] is the immutable description of a realtime agent: its
//! name, its behavioural instructions, and the tools the runtime may call while
//! a conversation is in progress.

use crate::search::Page;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use std::{fmt, sync::Arc};
use tracing::{info, instrument, warn};

/// A passage returned to the agent runtime by a retrieval tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    pub text: String,
    pub page: Page,
    pub relevance: f64,
}

/// The `content` of a tool response: either a plain message or passages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolContent {
    Message(String),
    Passages(Vec<Passage>),
}

/// The payload handed back to the agent runtime after a tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    pub content: ToolContent,
}

impl ToolOutput {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            content: ToolContent::Message(text.into()),
        }
    }

    pub fn passages(passages: Vec<Passage>) -> Self {
        Self {
            content: ToolContent::Passages(passages),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| json!({ "error": e.to_string() }))
    }
}

/// The behaviour behind a tool.
///
/// Handlers are infallible by contract: failures must be turned into a
/// user-facing [`ToolOutput`] so the conversation can continue.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> ToolOutput;
}

/// A named, schema-described function the agent runtime can invoke.
#[derive(Clone)]
pub struct ToolDefinition {
    /// Identifier the runtime uses when it calls the tool.
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
    handler: Arc<dyn ToolHandler>,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler,
        }
    }

    pub async fn invoke(&self, arguments: Value) -> ToolOutput {
        self.handler.call(arguments).await
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Everything the realtime backend needs to know about an agent.
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    pub name: String,
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
}

impl AgentDefinition {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            tools: Vec::new(),
        }
    }

    /// Adds a tool, replacing any existing tool with the same name.
    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name == tool.name) {
            warn!(tool = %tool.name, "Replacing tool with duplicate name");
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
        self
    }

    pub fn tool(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Dispatches a tool call coming from the agent runtime.
    ///
    /// `arguments` is the raw JSON text sent by the runtime. Unknown tools and
    /// unparsable arguments yield an `{"error": ...}` payload rather than a
    /// failure, so the runtime always receives an answer.
    #[instrument(name = "tool_call", skip(self, arguments), fields(agent = %self.name))]
    pub async fn invoke_tool(&self, name: &str, arguments: &str) -> Value {
        let Some(tool) = self.tool(name) else {
            warn!("Agent runtime called an unknown tool");
            return json!({ "error": format!("Unknown tool '{}'", name) });
        };

        let arguments = if arguments.trim().is_empty() {
            json!({})
        } else {
            match serde_json::from_str(arguments) {
                Ok(value) => value,
                Err(e) => {
                    warn!(error = %e, "Tool arguments are not valid JSON");
                    return json!({ "error": format!("Invalid arguments: {}", e) });
                }
            }
        };

        info!("Executing tool");
        tool.invoke(arguments).await.to_json()
    }
}
