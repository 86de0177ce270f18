//! `stepwise plugins`: plugin directories, enable flags and load outcomes.

use std::path::Path;

use stepwise_tools::discover_plugins;

pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let app = super::load_config(config_path)?;
    let config = app.to_run_config();

    println!("Plugins in {}", config.plugin_dir.display());
    println!();

    let entries = discover_plugins(&config);
    if entries.is_empty() {
        println!("  (no plugin directories found)");
    }

    let (_, report) = super::build_registry(&app, &config)?;
    for entry in &entries {
        if !entry.enabled {
            println!("  [ ] {}", entry.name);
            continue;
        }
        match report.loaded(&entry.name) {
            Some(loaded) if loaded.tools.is_empty() => {
                println!("  [x] {}: no tools registered", entry.name)
            }
            Some(loaded) => println!("  [x] {}: {}", entry.name, loaded.tools.join(", ")),
            None => println!("  [x] {}: failed", entry.name),
        }
        for error in report.failures_for(&entry.name) {
            println!("        error: {error}");
        }
    }

    // Enabled names with no directory on disk.
    for failure in &report.failures {
        if !entries.iter().any(|e| e.name == failure.plugin) {
            println!("  [x] {}: {}", failure.plugin, failure.error);
        }
    }

    println!();
    println!("Enable plugins by listing them under [plugins] enabled = [...] in stepwise.toml.");
    Ok(())
}
