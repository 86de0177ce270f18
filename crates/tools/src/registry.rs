//! Tool registry and safety gate.
//!
//! The registry maps tool names to tool instances, populated at startup
//! from the built-in tools and the plugin loader. It is read-only once
//! built and shared across runs. Every call goes through [`ToolRegistry::dispatch`]:
//!
//! 1. unknown name: `ToolNotAvailable`
//! 2. dangerous tool while dangerous tools are disabled: `ToolNotAvailable`
//!    (indistinguishable from 1)
//! 3. otherwise the tool runs under the per-call timeout, with panics
//!    captured as execution failures.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use stepwise_core::{
    ActionInput, ObservationKind, RunConfig, Tool, ToolDescriptor, ToolError, truncate_text,
};
use tracing::{debug, info, warn};

use crate::error::RegistryError;

/// Where a registered tool came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSource {
    Builtin,
    Plugin(String),
}

impl fmt::Display for ToolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolSource::Builtin => write!(f, "built-in"),
            ToolSource::Plugin(name) => write!(f, "plugin '{name}'"),
        }
    }
}

struct Entry {
    tool: Arc<dyn Tool>,
    descriptor: ToolDescriptor,
    source: ToolSource,
}

/// The text recorded for one dispatch, already bounded for the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub text: String,
    pub kind: ObservationKind,
}

/// A registry of available tools, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names are unique: a second tool with the same name
    /// is rejected and the first one stays.
    pub fn register(&mut self, tool: Arc<dyn Tool>, source: ToolSource) -> Result<(), RegistryError> {
        let descriptor = tool.descriptor();
        if descriptor.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if let Some(&idx) = self.index.get(&descriptor.name) {
            return Err(RegistryError::DuplicateName {
                name: descriptor.name,
                existing: self.entries[idx].source.to_string(),
            });
        }

        debug!(tool = %descriptor.name, source = %source, dangerous = descriptor.dangerous, "Registered tool");
        self.index.insert(descriptor.name.clone(), self.entries.len());
        self.entries.push(Entry {
            tool,
            descriptor,
            source,
        });
        Ok(())
    }

    pub fn register_builtin(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        self.register(tool, ToolSource::Builtin)
    }

    fn entry(&self, name: &str) -> Option<&Entry> {
        self.index.get(name).map(|&idx| &self.entries[idx])
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.entry(name).map(|e| &e.tool)
    }

    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.entry(name).map(|e| &e.descriptor)
    }

    pub fn source(&self, name: &str) -> Option<&ToolSource> {
        self.entry(name).map(|e| &e.source)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All registered descriptors, gated or not.
    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.descriptor.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the gate lets `descriptor` through under `config`.
    fn permitted(descriptor: &ToolDescriptor, config: &RunConfig) -> bool {
        !descriptor.dangerous || config.dangerous_tools_enabled
    }

    /// Whether a call to `name` would be attempted under `config`.
    pub fn is_available(&self, name: &str, config: &RunConfig) -> bool {
        self.descriptor(name)
            .is_some_and(|d| Self::permitted(d, config))
    }

    /// The descriptors the backend gets to see: gated tools are left out.
    pub fn catalog(&self, config: &RunConfig) -> Vec<&ToolDescriptor> {
        self.descriptors()
            .filter(|d| Self::permitted(d, config))
            .collect()
    }

    /// Run a tool through the safety gate.
    pub async fn dispatch(
        &self,
        name: &str,
        input: &ActionInput,
        config: &RunConfig,
    ) -> Result<String, ToolError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| ToolError::NotAvailable(name.to_string()))?;

        if !Self::permitted(&entry.descriptor, config) {
            info!(tool = %name, "Refused dangerous tool (dangerous tools are disabled)");
            return Err(ToolError::NotAvailable(name.to_string()));
        }

        let started = Instant::now();
        let call = AssertUnwindSafe(entry.tool.execute(input)).catch_unwind();
        let result = match tokio::time::timeout(config.tool_timeout, call).await {
            Err(_) => Err(ToolError::Timeout {
                tool_name: name.to_string(),
                timeout_ms: config.tool_timeout.as_millis() as u64,
            }),
            Ok(Err(panic)) => Err(ToolError::ExecutionFailed {
                tool_name: name.to_string(),
                reason: format!("tool panicked: {}", panic_message(panic.as_ref())),
            }),
            Ok(Ok(result)) => result,
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(output) => {
                debug!(tool = %name, duration_ms, output_chars = output.len(), "Tool succeeded")
            }
            Err(e) => warn!(tool = %name, duration_ms, error = %e, "Tool failed"),
        }
        result
    }

    /// Dispatch and turn the outcome into a bounded observation.
    ///
    /// Failures never escape: they become observations of the matching kind,
    /// cut to `max_error_chars`. Successful output is cut to
    /// `max_observation_chars`.
    pub async fn invoke(&self, name: &str, input: &ActionInput, config: &RunConfig) -> Observation {
        match self.dispatch(name, input, config).await {
            Ok(output) => Observation {
                text: truncate_text(&output, config.max_observation_chars),
                kind: ObservationKind::Output,
            },
            Err(err) => Observation {
                kind: ObservationKind::from(&err),
                text: truncate_text(&format!("Error: {err}"), config.max_error_chars),
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".into()
    }
}
