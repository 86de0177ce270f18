//! Tools for Stepwise: the registry with its safety gate, the plugin
//! loader, and the built-in tools.
//!
//! Tools give the agent the ability to interact with the world: list and
//! read files in its workspace, run shell commands (only when dangerous
//! tools are enabled), and whatever enabled plugins contribute.

pub mod command_line;
pub mod error;
pub mod list_dir;
pub mod plugin;
pub mod process_tool;
pub mod read_file;
pub mod registry;
mod workspace;

use std::path::Path;
use std::sync::Arc;

pub use error::{PluginError, RegistryError};
pub use plugin::{
    LoadedPlugin, PluginEntry, PluginFailure, PluginLoadReport, PluginManifest, discover_plugins,
    load_plugins,
};
pub use process_tool::ProcessTool;
pub use registry::{Observation, ToolRegistry, ToolSource};

/// Create a registry holding the built-in tools, scoped to `workspace`.
///
/// `command_line` is always registered; it is flagged dangerous, so the
/// safety gate hides and refuses it unless dangerous tools are enabled.
pub fn default_registry(workspace: &Path) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register_builtin(Arc::new(list_dir::ListDirTool::new(workspace)))?;
    registry.register_builtin(Arc::new(read_file::ReadFileTool::new(workspace)))?;
    registry.register_builtin(Arc::new(command_line::CommandLineTool::new(workspace)))?;
    Ok(registry)
}
