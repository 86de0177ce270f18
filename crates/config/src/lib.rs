//! Configuration loading, validation, and management for Stepwise.
//!
//! Loads configuration from `stepwise.toml` (or a path given on the command
//! line) with environment variable overrides, validates it, and turns it
//! into the immutable [`RunConfig`] the runtime consumes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use stepwise_core::{BackendKind, BackendSettings, RunConfig};

/// Default configuration file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "stepwise.toml";

/// The root configuration structure.
///
/// Maps directly to `stepwise.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upper bound on tool-use iterations per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Allow tools flagged as dangerous (shell access and the like)
    #[serde(default)]
    pub enable_dangerous_tools: bool,

    /// Directory built-in file tools are scoped to
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,

    /// Deadline for a single tool call
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    #[serde(default = "default_max_error_chars")]
    pub max_error_chars: usize,

    #[serde(default = "default_max_observation_chars")]
    pub max_observation_chars: usize,

    /// Language-model backend
    #[serde(default)]
    pub backend: BackendConfig,

    /// Plugin discovery
    #[serde(default)]
    pub plugins: PluginsConfig,

    /// Per-tool configuration blocks: `[tools.<plugin>.<tool>]`
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tools: HashMap<String, HashMap<String, serde_json::Value>>,
}

fn default_max_iterations() -> u32 {
    15
}
fn default_workspace_dir() -> PathBuf {
    PathBuf::from("workspace")
}
fn default_tool_timeout_secs() -> u64 {
    60
}
fn default_max_error_chars() -> usize {
    500
}
fn default_max_observation_chars() -> usize {
    8000
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_provider")]
    pub provider: BackendKind,

    /// Model name; each provider has its own default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Attempts per prompt, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_stop")]
    pub stop: Vec<String>,
}

fn default_provider() -> BackendKind {
    BackendKind::OpenAi
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> Option<u32> {
    Some(1000)
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    5000
}
fn default_max_backoff_ms() -> u64 {
    60_000
}
fn default_stop() -> Vec<String> {
    vec!["\nObservation:".into()]
}

impl BackendConfig {
    /// The configured model, or the provider's default.
    pub fn resolved_model(&self) -> String {
        if let Some(model) = &self.model {
            return model.clone();
        }
        match self.provider {
            BackendKind::OpenAi => "gpt-4o-mini".into(),
            BackendKind::Ollama => "llama3".into(),
            BackendKind::Gemini => "gemini-1.5-flash-latest".into(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            stop: default_stop(),
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff_ms", &self.initial_backoff_ms)
            .field("max_backoff_ms", &self.max_backoff_ms)
            .field("stop", &self.stop)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Root directory holding one subdirectory per plugin
    #[serde(default = "default_plugin_dir")]
    pub dir: PathBuf,

    /// Plugin directory names to load, in load order
    #[serde(default)]
    pub enabled: Vec<String>,
}

fn default_plugin_dir() -> PathBuf {
    PathBuf::from("plugins")
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            dir: default_plugin_dir(),
            enabled: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `stepwise.toml` in the current directory.
    ///
    /// Also checks environment variables:
    /// - `STEPWISE_PROVIDER`, `STEPWISE_MODEL` (override the file)
    /// - `OPENAI_API_KEY` / `GOOGLE_API_KEY` (used when the file has no key)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let base = path.parent().unwrap_or(Path::new(""));
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            let mut config = Self::default();
            config.rebase_paths(base);
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        config.rebase_paths(base);
        Ok(config)
    }

    /// Anchor relative `workspace_dir` and `plugins.dir` at `base`, the
    /// directory holding the config file.
    pub fn rebase_paths(&mut self, base: &Path) {
        if self.workspace_dir.is_relative() {
            self.workspace_dir = base.join(&self.workspace_dir);
        }
        if self.plugins.dir.is_relative() {
            self.plugins.dir = base.join(&self.plugins.dir);
        }
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("STEPWISE_PROVIDER") {
            self.backend.provider = parse_provider(&provider)?;
        }

        if let Some(model) = lookup("STEPWISE_MODEL") {
            self.backend.model = Some(model);
        }

        if self.backend.api_key.is_none() {
            self.backend.api_key = match self.backend.provider {
                BackendKind::OpenAi => lookup("OPENAI_API_KEY"),
                BackendKind::Gemini => lookup("GOOGLE_API_KEY"),
                BackendKind::Ollama => None,
            };
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "max_iterations must be > 0".into(),
            ));
        }

        if self.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tool_timeout_secs must be > 0".into(),
            ));
        }

        if self.backend.temperature < 0.0 || self.backend.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "backend.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.backend.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "backend.max_attempts must be > 0".into(),
            ));
        }

        if self.backend.initial_backoff_ms > self.backend.max_backoff_ms {
            return Err(ConfigError::ValidationError(
                "backend.initial_backoff_ms must not exceed backend.max_backoff_ms".into(),
            ));
        }

        if let Some(name) = self.plugins.enabled.iter().find(|n| n.trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "plugins.enabled contains an empty name: {name:?}"
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.backend.api_key.is_some()
    }

    /// Build the immutable per-run configuration.
    pub fn to_run_config(&self) -> RunConfig {
        let backend = &self.backend;
        RunConfig {
            max_iterations: self.max_iterations,
            dangerous_tools_enabled: self.enable_dangerous_tools,
            backend: BackendSettings {
                kind: backend.provider,
                model: backend.resolved_model(),
                api_key: backend.api_key.clone(),
                base_url: backend.base_url.clone(),
                temperature: backend.temperature,
                max_tokens: backend.max_tokens,
                stop: backend.stop.clone(),
                request_timeout: Duration::from_secs(backend.request_timeout_secs),
                max_attempts: backend.max_attempts,
                initial_backoff: Duration::from_millis(backend.initial_backoff_ms),
                max_backoff: Duration::from_millis(backend.max_backoff_ms),
            },
            plugin_dir: self.plugins.dir.clone(),
            enabled_plugins: self.plugins.enabled.clone(),
            tool_settings: self.tools.clone(),
            tool_timeout: Duration::from_secs(self.tool_timeout_secs),
            max_error_chars: self.max_error_chars,
            max_observation_chars: self.max_observation_chars,
        }
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_provider(value: &str) -> Result<BackendKind, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "openai" => Ok(BackendKind::OpenAi),
        "ollama" => Ok(BackendKind::Ollama),
        "gemini" => Ok(BackendKind::Gemini),
        other => Err(ConfigError::ValidationError(format!(
            "unknown provider '{other}' (expected openai, ollama or gemini)"
        ))),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            enable_dangerous_tools: false,
            workspace_dir: default_workspace_dir(),
            tool_timeout_secs: default_tool_timeout_secs(),
            max_error_chars: default_max_error_chars(),
            max_observation_chars: default_max_observation_chars(),
            backend: BackendConfig::default(),
            plugins: PluginsConfig::default(),
            tools: HashMap::new(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_iterations, 15);
        assert!(!config.enable_dangerous_tools);
        assert_eq!(config.backend.provider, BackendKind::OpenAi);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.max_iterations, config.max_iterations);
        assert_eq!(parsed.backend.stop, config.backend.stop);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.backend.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let config = AppConfig {
            max_iterations: 0,
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/stepwise.toml"));
        let config = result.unwrap();
        assert_eq!(config.max_iterations, 15);
    }

    #[test]
    fn full_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
max_iterations = 5
enable_dangerous_tools = true
tool_timeout_secs = 10

[backend]
provider = "ollama"
model = "mistral"
base_url = "http://gpu-box:11434"
max_attempts = 2
initial_backoff_ms = 100

[plugins]
dir = "my_plugins"
enabled = ["weather", "notes"]

[tools.weather.forecast]
units = "metric"
days = 3
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.max_iterations, 5);
        assert!(config.enable_dangerous_tools);
        assert_eq!(config.backend.provider, BackendKind::Ollama);
        assert_eq!(config.plugins.enabled, vec!["weather", "notes"]);

        let run = config.to_run_config();
        assert_eq!(run.backend.model, "mistral");
        assert_eq!(run.backend.max_attempts, 2);
        assert_eq!(run.backend.initial_backoff, Duration::from_millis(100));
        assert_eq!(run.tool_timeout, Duration::from_secs(10));
        let dir = file.path().parent().unwrap();
        assert_eq!(run.plugin_dir, dir.join("my_plugins"));
        assert_eq!(config.workspace_dir, dir.join("workspace"));
        let forecast = run.tool_settings("weather", "forecast").unwrap();
        assert_eq!(forecast["units"], "metric");
        assert_eq!(forecast["days"], 3);
    }

    #[test]
    fn relative_dirs_follow_the_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("project");
        std::fs::create_dir(&nested).unwrap();
        let path = nested.join("stepwise.toml");
        std::fs::write(
            &path,
            "workspace_dir = \"scratch\"\n\n[plugins]\ndir = \"/opt/stepwise/plugins\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.workspace_dir, nested.join("scratch"));
        assert_eq!(config.plugins.dir, PathBuf::from("/opt/stepwise/plugins"));

        let missing = AppConfig::load_from(&nested.join("absent.toml")).unwrap();
        assert_eq!(missing.workspace_dir, nested.join("workspace"));
        assert_eq!(missing.plugins.dir, nested.join("plugins"));
    }

    #[test]
    fn bare_file_name_keeps_paths_relative() {
        let mut config = AppConfig::default();
        config.rebase_paths(Path::new("stepwise.toml").parent().unwrap());
        assert_eq!(config.workspace_dir, PathBuf::from("workspace"));
        assert_eq!(config.plugins.dir, PathBuf::from("plugins"));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "max_iterations = \"many\"").unwrap();
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_provider_and_model() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("STEPWISE_PROVIDER", "Gemini"),
                ("STEPWISE_MODEL", "gemini-pro"),
                ("GOOGLE_API_KEY", "g-key"),
                ("OPENAI_API_KEY", "o-key"),
            ]))
            .unwrap();
        assert_eq!(config.backend.provider, BackendKind::Gemini);
        assert_eq!(config.backend.model.as_deref(), Some("gemini-pro"));
        assert_eq!(config.backend.api_key.as_deref(), Some("g-key"));
    }

    #[test]
    fn file_api_key_wins_over_env() {
        let mut config = AppConfig::default();
        config.backend.api_key = Some("from-file".into());
        config
            .apply_env(env(&[("OPENAI_API_KEY", "from-env")]))
            .unwrap();
        assert_eq!(config.backend.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn unknown_provider_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(env(&[("STEPWISE_PROVIDER", "anthropic")]))
            .unwrap_err();
        assert!(err.to_string().contains("anthropic"));
    }

    #[test]
    fn provider_default_models() {
        let mut backend = BackendConfig::default();
        assert_eq!(backend.resolved_model(), "gpt-4o-mini");
        backend.provider = BackendKind::Ollama;
        assert_eq!(backend.resolved_model(), "llama3");
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.backend.api_key = Some("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
    }
}
