//! The immutable per-run configuration.
//!
//! Built once (by `stepwise-config` or directly in tests) and passed
//! explicitly to the loop controller, the tool registry, and the plugin
//! loader. Nothing in the runtime reads global mutable settings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Which language-model service answers REASONING steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// OpenAI chat completions, or any compatible endpoint.
    #[serde(rename = "openai")]
    OpenAi,
    /// A local Ollama server.
    Ollama,
    /// Google Gemini.
    Gemini,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::OpenAi => write!(f, "openai"),
            BackendKind::Ollama => write!(f, "ollama"),
            BackendKind::Gemini => write!(f, "gemini"),
        }
    }
}

/// Backend selection plus connection and retry parameters.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    pub kind: BackendKind,
    pub model: String,
    pub api_key: Option<String>,
    /// Overrides the service's default base URL.
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub stop: Vec<String>,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Total attempts for one prompt, first try included.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on each further retry.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl std::fmt::Debug for BackendSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSettings")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field(
                "api_key",
                &self.api_key.as_ref().map(|_| "[REDACTED]").unwrap_or("None"),
            )
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("stop", &self.stop)
            .field("request_timeout", &self.request_timeout)
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff", &self.initial_backoff)
            .field("max_backoff", &self.max_backoff)
            .finish()
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: BackendKind::OpenAi,
            model: "gpt-4o-mini".into(),
            api_key: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: Some(1000),
            stop: vec!["\nObservation:".into()],
            request_timeout: Duration::from_secs(120),
            max_attempts: 3,
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// Everything one run needs to know about its environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Upper bound on ACTING/OBSERVING cycles; always > 0.
    pub max_iterations: u32,
    /// Opt-in for tools flagged `dangerous`.
    pub dangerous_tools_enabled: bool,
    pub backend: BackendSettings,
    /// Root directory scanned for plugin subdirectories.
    pub plugin_dir: PathBuf,
    /// Plugin directory names to load, in order.
    pub enabled_plugins: Vec<String>,
    /// Per-tool configuration blocks, keyed by plugin directory then tool name.
    pub tool_settings: HashMap<String, HashMap<String, serde_json::Value>>,
    /// Deadline for a single tool call.
    pub tool_timeout: Duration,
    /// Bound on tool- and parser-originated error text in the transcript.
    pub max_error_chars: usize,
    /// Bound on successful tool output in the transcript.
    pub max_observation_chars: usize,
}

impl RunConfig {
    /// Whether a plugin directory is on the enable-list.
    pub fn is_plugin_enabled(&self, plugin_dir_name: &str) -> bool {
        self.enabled_plugins.iter().any(|p| p == plugin_dir_name)
    }

    /// The configuration block addressed by `(plugin, tool)`, if any.
    pub fn tool_settings(&self, plugin: &str, tool: &str) -> Option<&serde_json::Value> {
        self.tool_settings.get(plugin).and_then(|tools| tools.get(tool))
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_dangerous_tools(mut self, enabled: bool) -> Self {
        self.dangerous_tools_enabled = enabled;
        self
    }

    pub fn with_plugins(mut self, dir: impl Into<PathBuf>, enabled: Vec<String>) -> Self {
        self.plugin_dir = dir.into();
        self.enabled_plugins = enabled;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            dangerous_tools_enabled: false,
            backend: BackendSettings::default(),
            plugin_dir: PathBuf::from("plugins"),
            enabled_plugins: Vec::new(),
            tool_settings: HashMap::new(),
            tool_timeout: Duration::from_secs(60),
            max_error_chars: 500,
            max_observation_chars: 8000,
        }
    }
}
