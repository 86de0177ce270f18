//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act: list a directory,
//! read a file, run a command, or anything a plugin supplies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ToolError;

/// The normalized input of an action request.
///
/// The model may write its action input either as a bare literal
/// (`Action Input: src/`) or as a key-value mapping
/// (`Action Input: {"path": "src/"}`). The parser resolves which one it is
/// exactly once; tools and the registry never look at raw reply text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionInput {
    /// A bare literal string.
    Literal(String),
    /// A structured key-value mapping.
    Structured(serde_json::Map<String, serde_json::Value>),
}

impl ActionInput {
    /// Build a literal input.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// Build a structured input from a JSON value.
    ///
    /// Returns `None` if the value is not an object.
    pub fn structured(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Object(map) => Some(Self::Structured(map)),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(text) => Some(text),
            Self::Structured(_) => None,
        }
    }

    pub fn as_structured(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        match self {
            Self::Literal(_) => None,
            Self::Structured(map) => Some(map),
        }
    }

    /// Look up a string field of a structured input.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.as_structured()
            .and_then(|map| map.get(key))
            .and_then(|v| v.as_str())
    }

    /// The primary text argument of a tool.
    ///
    /// A literal input *is* the primary argument; a structured input
    /// provides it under `key`.
    pub fn text_arg(&self, key: &str) -> Option<&str> {
        match self {
            Self::Literal(text) => Some(text.as_str()),
            Self::Structured(_) => self.get_str(key),
        }
    }

    /// The input as a JSON value (a string or an object).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Literal(text) => serde_json::Value::String(text.clone()),
            Self::Structured(map) => serde_json::Value::Object(map.clone()),
        }
    }
}

impl fmt::Display for ActionInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.write_str(text),
            Self::Structured(map) => {
                let json = serde_json::to_string(map).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

/// Metadata the registry and prompt builder need about a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name.
    pub name: String,
    /// Description shown to the backend.
    pub description: String,
    /// Whether the tool requires dangerous tools to be enabled.
    pub dangerous: bool,
}

/// The core Tool trait.
///
/// Each tool (built-in or plugin-provided) implements this trait and is
/// registered in the tool registry, which gates and dispatches calls.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "list_dir", "command_line").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the backend).
    fn description(&self) -> &str;

    /// Whether this tool's effects are powerful enough to require the
    /// dangerous-tools opt-in.
    fn dangerous(&self) -> bool {
        false
    }

    /// Execute the tool with the given input and return its textual output.
    async fn execute(&self, input: &ActionInput) -> std::result::Result<String, ToolError>;

    /// Snapshot this tool's metadata.
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            dangerous: self.dangerous(),
        }
    }
}
