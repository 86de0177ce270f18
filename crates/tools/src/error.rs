//! Registry and plugin-loading errors.

use std::path::PathBuf;
use thiserror::Error;

/// Registration failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Tool '{name}' is already registered (by {existing})")]
    DuplicateName { name: String, existing: String },

    #[error("Tool name must not be empty")]
    EmptyName,
}

/// A failure while resolving one plugin. Recorded per plugin; never
/// stops other plugins from loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("Plugin directory not found: {0}")]
    DirectoryMissing(PathBuf),

    #[error("Plugin manifest not found: {0}")]
    MissingManifest(PathBuf),

    #[error("Invalid plugin manifest {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("Invalid tool '{tool}': {reason}")]
    InvalidTool { tool: String, reason: String },

    #[error("Tool '{tool}' depends on missing command '{command}'")]
    MissingCommand { tool: String, command: String },

    #[error("Tool '{tool}' rejected: {source}")]
    Registration {
        tool: String,
        #[source]
        source: RegistryError,
    },
}
