pub mod init;
pub mod plugins;
pub mod run;
pub mod tools;

use std::path::Path;

use stepwise_config::{AppConfig, DEFAULT_CONFIG_FILE};
use stepwise_core::RunConfig;
use stepwise_tools::{PluginLoadReport, ToolRegistry, default_registry, load_plugins};

/// Load the configuration file (or defaults) plus environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    AppConfig::load_with_env(path).map_err(|e| format!("Failed to load config: {e}").into())
}

/// Built-in tools plus every enabled plugin.
pub fn build_registry(
    app: &AppConfig,
    config: &RunConfig,
) -> Result<(ToolRegistry, PluginLoadReport), Box<dyn std::error::Error>> {
    let mut registry = default_registry(&app.workspace_dir)?;
    let report = load_plugins(&mut registry, config);
    Ok((registry, report))
}
