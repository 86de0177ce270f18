//! Plugin loader: resolves enabled plugin directories into registered tools.
//!
//! A plugin is a subdirectory of the plugin root holding a `plugin.toml`:
//!
//! ```toml
//! [[tools]]
//! name = "weather"
//! description = "Look up the weather for a city."
//! dangerous = false
//! command = "./weather.sh"
//! args = ["--json"]
//! ```
//!
//! Resolution runs once at startup. Each enabled plugin either contributes
//! its tools or yields a [`PluginFailure`]; one broken plugin never stops
//! the others or the built-in tools from loading.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use stepwise_core::{RunConfig, Tool};
use tracing::{debug, info, warn};

use crate::error::PluginError;
use crate::process_tool::ProcessTool;
use crate::registry::{ToolRegistry, ToolSource};

/// Manifest file expected in every plugin directory.
pub const MANIFEST_FILE: &str = "plugin.toml";

/// Parsed `plugin.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginManifest {
    #[serde(default)]
    pub tools: Vec<ToolManifest>,
}

/// One `[[tools]]` entry. Fields default to empty so that structural
/// problems surface as [`PluginError::InvalidTool`] rather than TOML errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dangerous: bool,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl PluginManifest {
    /// Read and parse `plugin.toml` from `dir`.
    pub fn load(dir: &Path) -> Result<Self, PluginError> {
        let path = dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(PluginError::MissingManifest(path));
        }
        let content = std::fs::read_to_string(&path).map_err(|e| PluginError::InvalidManifest {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let manifest: Self = toml::from_str(&content).map_err(|e| PluginError::InvalidManifest {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        if manifest.tools.is_empty() {
            return Err(PluginError::InvalidManifest {
                path,
                reason: "declares no [[tools]]".into(),
            });
        }
        Ok(manifest)
    }
}

impl ToolManifest {
    fn validate(&self) -> Result<(), PluginError> {
        let invalid = |reason: &str| PluginError::InvalidTool {
            tool: self.name.clone(),
            reason: reason.into(),
        };
        if self.name.trim().is_empty() {
            return Err(invalid("missing 'name'"));
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(invalid("'name' must not contain whitespace"));
        }
        if self.description.trim().is_empty() {
            return Err(invalid("missing 'description'"));
        }
        if self.command.trim().is_empty() {
            return Err(invalid("missing 'command'"));
        }
        Ok(())
    }
}

/// A plugin directory found under the plugin root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginEntry {
    pub name: String,
    pub path: PathBuf,
    pub enabled: bool,
}

/// A plugin that loaded, with the tools it registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPlugin {
    pub name: String,
    pub tools: Vec<String>,
}

/// A captured per-plugin failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginFailure {
    pub plugin: String,
    pub error: PluginError,
}

/// Outcome of the startup resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginLoadReport {
    pub loaded: Vec<LoadedPlugin>,
    pub failures: Vec<PluginFailure>,
}

impl PluginLoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures_for<'a>(&'a self, plugin: &'a str) -> impl Iterator<Item = &'a PluginError> {
        self.failures
            .iter()
            .filter(move |f| f.plugin == plugin)
            .map(|f| &f.error)
    }

    pub fn loaded(&self, plugin: &str) -> Option<&LoadedPlugin> {
        self.loaded.iter().find(|p| p.name == plugin)
    }
}

/// List plugin directories under the plugin root, sorted by name, marking
/// which ones the configuration enables. A missing root yields nothing.
pub fn discover_plugins(config: &RunConfig) -> Vec<PluginEntry> {
    let entries = match std::fs::read_dir(&config.plugin_dir) {
        Ok(e) => e,
        Err(e) => {
            debug!(dir = %config.plugin_dir.display(), error = %e, "Plugin root not readable");
            return Vec::new();
        }
    };

    let mut plugins: Vec<PluginEntry> = entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            if name.starts_with('.') || name.starts_with("__") {
                return None;
            }
            Some(PluginEntry {
                enabled: config.is_plugin_enabled(&name),
                path: entry.path(),
                name,
            })
        })
        .collect();
    plugins.sort_by(|a, b| a.name.cmp(&b.name));
    plugins
}

/// Resolve every enabled plugin and register its tools in `registry`.
///
/// Plugins are processed in enable-list order. A manifest-level failure
/// drops that plugin only; a tool whose name is already taken is rejected
/// on its own while the rest of its plugin still registers.
pub fn load_plugins(registry: &mut ToolRegistry, config: &RunConfig) -> PluginLoadReport {
    let mut report = PluginLoadReport::default();
    let mut seen = HashSet::new();

    for plugin in &config.enabled_plugins {
        if !seen.insert(plugin.as_str()) {
            continue;
        }

        let dir = config.plugin_dir.join(plugin);
        let tools = if dir.is_dir() {
            resolve_plugin(&dir, plugin, config)
        } else {
            Err(PluginError::DirectoryMissing(dir))
        };

        let tools = match tools {
            Ok(tools) => tools,
            Err(error) => {
                warn!(plugin = %plugin, error = %error, "Failed to load plugin");
                report.failures.push(PluginFailure {
                    plugin: plugin.clone(),
                    error,
                });
                continue;
            }
        };

        let mut registered = Vec::new();
        for tool in tools {
            let name = tool.descriptor().name;
            match registry.register(Arc::new(tool), ToolSource::Plugin(plugin.clone())) {
                Ok(()) => registered.push(name),
                Err(source) => {
                    warn!(plugin = %plugin, tool = %name, error = %source, "Rejected plugin tool");
                    report.failures.push(PluginFailure {
                        plugin: plugin.clone(),
                        error: PluginError::Registration { tool: name, source },
                    });
                }
            }
        }

        info!(plugin = %plugin, tools = ?registered, "Loaded plugin");
        report.loaded.push(LoadedPlugin {
            name: plugin.clone(),
            tools: registered,
        });
    }

    report
}

/// Turn one plugin directory into process-backed tools.
fn resolve_plugin(dir: &Path, plugin: &str, config: &RunConfig) -> Result<Vec<ProcessTool>, PluginError> {
    let manifest = PluginManifest::load(dir)?;
    let workdir = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());

    manifest
        .tools
        .iter()
        .map(|entry| -> Result<ProcessTool, PluginError> {
            entry.validate()?;
            let program = resolve_command(&workdir, &entry.command).ok_or_else(|| {
                PluginError::MissingCommand {
                    tool: entry.name.clone(),
                    command: entry.command.clone(),
                }
            })?;
            Ok(
                ProcessTool::new(&entry.name, &entry.description, program, &workdir)
                    .with_args(entry.args.clone())
                    .with_dangerous(entry.dangerous)
                    .with_config(config.tool_settings(plugin, &entry.name).cloned()),
            )
        })
        .collect()
}

/// Locate a tool's command: paths are taken relative to the plugin
/// directory, bare program names are looked up on `PATH`. Only executable
/// files count.
fn resolve_command(plugin_dir: &Path, command: &str) -> Option<PathBuf> {
    resolve_command_in(plugin_dir, command, std::env::var_os("PATH"))
}

fn resolve_command_in(
    plugin_dir: &Path,
    command: &str,
    search_path: Option<OsString>,
) -> Option<PathBuf> {
    which::which_in(command.trim(), search_path, plugin_dir).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::ActionInput;

    fn write_plugin(root: &Path, name: &str, manifest: &str) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
        dir
    }

    fn config(root: &Path, enabled: &[&str]) -> RunConfig {
        RunConfig::default().with_plugins(root, enabled.iter().map(|s| s.to_string()).collect())
    }

    const ECHO_MANIFEST: &str = r#"
[[tools]]
name = "shout"
description = "Echoes its input back."
command = "cat"
"#;

    #[test]
    fn missing_manifest_is_captured() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("empty")).unwrap();

        let mut registry = ToolRegistry::new();
        let report = load_plugins(&mut registry, &config(root.path(), &["empty"]));
        assert!(matches!(
            report.failures[0].error,
            PluginError::MissingManifest(_)
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn broken_plugin_does_not_block_others() {
        let root = tempfile::tempdir().unwrap();
        write_plugin(root.path(), "broken", "[[tools]]\nname = ");
        write_plugin(root.path(), "good", ECHO_MANIFEST);

        let mut registry = ToolRegistry::new();
        let report = load_plugins(&mut registry, &config(root.path(), &["broken", "good"]));

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].plugin, "broken");
        assert!(matches!(
            report.failures[0].error,
            PluginError::InvalidManifest { .. }
        ));
        assert_eq!(report.loaded("good").unwrap().tools, vec!["shout"]);
        assert_eq!(
            registry.source("shout"),
            Some(&ToolSource::Plugin("good".into()))
        );
    }

    #[test]
    fn disabled_plugins_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        write_plugin(root.path(), "good", ECHO_MANIFEST);

        let mut registry = ToolRegistry::new();
        let report = load_plugins(&mut registry, &config(root.path(), &[]));
        assert!(report.loaded.is_empty());
        assert!(report.is_clean());
        assert!(registry.is_empty());
    }

    #[test]
    fn enabled_but_absent_directory_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let mut registry = ToolRegistry::new();
        let report = load_plugins(&mut registry, &config(root.path(), &["ghost"]));
        assert!(matches!(
            report.failures_for("ghost").next(),
            Some(PluginError::DirectoryMissing(_))
        ));
    }

    #[test]
    fn structural_validation() {
        let root = tempfile::tempdir().unwrap();
        write_plugin(
            root.path(),
            "nodesc",
            "[[tools]]\nname = \"x\"\ncommand = \"cat\"\n",
        );
        write_plugin(
            root.path(),
            "nocmd",
            "[[tools]]\nname = \"x\"\ndescription = \"d\"\ncommand = \"./missing.sh\"\n",
        );

        let mut registry = ToolRegistry::new();
        let report = load_plugins(&mut registry, &config(root.path(), &["nodesc", "nocmd"]));
        assert!(matches!(
            report.failures_for("nodesc").next(),
            Some(PluginError::InvalidTool { .. })
        ));
        assert!(matches!(
            report.failures_for("nocmd").next(),
            Some(PluginError::MissingCommand { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn colliding_tool_rejected_not_overwritten() {
        let root = tempfile::tempdir().unwrap();
        write_plugin(root.path(), "first", ECHO_MANIFEST);
        write_plugin(root.path(), "second", ECHO_MANIFEST);

        let mut registry = ToolRegistry::new();
        let report = load_plugins(&mut registry, &config(root.path(), &["first", "second"]));

        assert_eq!(
            registry.source("shout"),
            Some(&ToolSource::Plugin("first".into()))
        );
        assert!(matches!(
            report.failures_for("second").next(),
            Some(PluginError::Registration { .. })
        ));
        assert!(report.loaded("second").unwrap().tools.is_empty());
    }

    #[test]
    fn dangerous_flag_and_config_carried() {
        let root = tempfile::tempdir().unwrap();
        write_plugin(
            root.path(),
            "ops",
            r#"
[[tools]]
name = "deploy"
description = "Deploys things."
dangerous = true
command = "cat"
"#,
        );

        let mut registry = ToolRegistry::new();
        load_plugins(&mut registry, &config(root.path(), &["ops"]));
        assert!(registry.descriptor("deploy").unwrap().dangerous);
        assert!(registry.catalog(&RunConfig::default()).is_empty());
    }

    #[test]
    fn discover_lists_sorted_with_enabled_flag() {
        let root = tempfile::tempdir().unwrap();
        write_plugin(root.path(), "zeta", ECHO_MANIFEST);
        write_plugin(root.path(), "alpha", ECHO_MANIFEST);
        std::fs::create_dir(root.path().join("__pycache__")).unwrap();

        let found = discover_plugins(&config(root.path(), &["zeta"]));
        let summary: Vec<_> = found.iter().map(|p| (p.name.as_str(), p.enabled)).collect();
        assert_eq!(summary, vec![("alpha", false), ("zeta", true)]);
    }

    #[test]
    fn missing_root_discovers_nothing() {
        let cfg = config(Path::new("/nonexistent/stepwise/plugins"), &[]);
        assert!(discover_plugins(&cfg).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn loaded_tool_dispatches_through_registry() {
        let root = tempfile::tempdir().unwrap();
        write_plugin(root.path(), "echoes", ECHO_MANIFEST);

        let cfg = config(root.path(), &["echoes"]);
        let mut registry = ToolRegistry::new();
        load_plugins(&mut registry, &cfg);

        let output = registry
            .dispatch("shout", &ActionInput::literal("hey"), &cfg)
            .await
            .unwrap();
        assert_eq!(output, r#""hey""#);
    }

    #[cfg(unix)]
    fn write_file(path: &Path, body: &str, mode: u32) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::write(path, body).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_executable_file_on_path_does_not_shadow_program() {
        let root = tempfile::tempdir().unwrap();
        let shadow = root.path().join("shadow");
        let real = root.path().join("real");
        std::fs::create_dir_all(&shadow).unwrap();
        std::fs::create_dir_all(&real).unwrap();
        write_file(&shadow.join("fixture_tool"), "not a program", 0o644);
        write_file(&real.join("fixture_tool"), "#!/bin/sh\necho ok\n", 0o755);

        let search = std::env::join_paths([&shadow, &real]).unwrap();
        let program = resolve_command_in(root.path(), "fixture_tool", Some(search)).unwrap();
        assert!(program.starts_with(&real));

        let tool = ProcessTool::new("t", "Fixture", program, root.path());
        let output = tool.execute(&ActionInput::literal("")).await.unwrap();
        assert_eq!(output, "ok");
    }

    #[cfg(unix)]
    #[test]
    fn only_non_executable_candidates_resolve_to_nothing() {
        let root = tempfile::tempdir().unwrap();
        write_file(&root.path().join("fixture_tool"), "data", 0o644);
        let search = std::env::join_paths([root.path()]).unwrap();
        assert!(resolve_command_in(root.path(), "fixture_tool", Some(search)).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_relative_command_is_missing() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_plugin(
            root.path(),
            "stale",
            "[[tools]]\nname = \"x\"\ndescription = \"d\"\ncommand = \"./run.sh\"\n",
        );
        write_file(&dir.join("run.sh"), "#!/bin/sh\necho hi\n", 0o644);

        let mut registry = ToolRegistry::new();
        let report = load_plugins(&mut registry, &config(root.path(), &["stale"]));
        assert!(matches!(
            report.failures_for("stale").next(),
            Some(PluginError::MissingCommand { .. })
        ));
        assert!(registry.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn executable_relative_command_resolves_in_plugin_dir() {
        let root = tempfile::tempdir().unwrap();
        write_file(&root.path().join("run.sh"), "#!/bin/sh\n", 0o755);
        let program = resolve_command_in(root.path(), "./run.sh", None).unwrap();
        assert!(program.ends_with("run.sh"));
    }
}
