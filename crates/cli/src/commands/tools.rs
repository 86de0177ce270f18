//! `stepwise tools`: what the agent gets to see.

use std::path::Path;

pub fn run(config_path: Option<&Path>, enable_dangerous_tools: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = super::load_config(config_path)?;
    if enable_dangerous_tools {
        app.enable_dangerous_tools = true;
    }
    let config = app.to_run_config();
    let (registry, _) = super::build_registry(&app, &config)?;

    println!("Available tools");
    println!("===============");
    println!();
    for descriptor in registry.descriptors() {
        let source = registry
            .source(&descriptor.name)
            .map(ToString::to_string)
            .unwrap_or_default();
        let visible = registry.is_available(&descriptor.name, &config);
        let marker = match (descriptor.dangerous, visible) {
            (true, true) => " [dangerous]",
            (true, false) => " [dangerous, disabled]",
            _ => "",
        };
        println!("  {} ({source}){marker}", descriptor.name);
        println!("      {}", descriptor.description);
    }

    let hidden = registry.len() - registry.catalog(&config).len();
    if hidden > 0 {
        println!();
        println!("  {hidden} tool(s) hidden from the agent; pass --enable-dangerous-tools to allow them.");
    }
    Ok(())
}
