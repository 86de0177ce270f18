//! `stepwise run`: drive one goal to a terminal state.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use stepwise_agent::{ReactLoop, RunEvent};
use stepwise_core::{RunState, RunStatus, Step};
use stepwise_providers::build_backend;
use tracing::{info, warn};

pub struct RunOptions {
    pub goal: String,
    pub enable_dangerous_tools: bool,
    pub max_iterations: Option<u32>,
    pub json: bool,
}

pub async fn run(
    config_path: Option<&Path>,
    options: RunOptions,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut app = super::load_config(config_path)?;
    if options.enable_dangerous_tools {
        app.enable_dangerous_tools = true;
    }
    if let Some(max) = options.max_iterations {
        if max == 0 {
            return Err("--max-iterations must be > 0".into());
        }
        app.max_iterations = max;
    }
    if app.enable_dangerous_tools {
        warn!("Dangerous tools are ENABLED: the agent may run shell commands in the workspace");
    }

    if !app.workspace_dir.exists() {
        std::fs::create_dir_all(&app.workspace_dir)?;
        info!(path = %app.workspace_dir.display(), "Created workspace directory");
    }

    let config = app.to_run_config();
    let backend = build_backend(&config).map_err(|e| format!("Backend unavailable: {e}"))?;
    let (registry, report) = super::build_registry(&app, &config)?;
    for failure in &report.failures {
        eprintln!("  [plugin] {}: {}", failure.plugin, failure.error);
    }

    let agent = ReactLoop::new(backend, Arc::new(registry), Arc::new(config));
    let mut handle = agent.run_stream(options.goal.clone());

    let cancel = handle.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n  Interrupt received, stopping after the current step...");
            cancel.cancel();
        }
    });

    if !options.json {
        println!();
        println!("  Goal: {}", options.goal);
        println!();
    }
    while let Some(event) = handle.events.recv().await {
        if let RunEvent::Step { index, step } = event
            && !options.json
        {
            print_step(index, &step);
        }
    }
    let state = handle.task.await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_result(&state);
    }

    Ok(match state.status() {
        RunStatus::Completed { .. } => ExitCode::SUCCESS,
        RunStatus::Aborted => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    })
}

fn print_step(index: usize, step: &Step) {
    println!("  --- Step {} ---", index + 1);
    if !step.thought.is_empty() {
        println!("  Thought: {}", step.thought);
    }
    if let Some(action) = &step.action {
        println!("  Action: {action}");
    }
    if let Some(input) = &step.action_input {
        println!("  Action Input: {input}");
    }
    for (i, line) in step.observation.lines().enumerate() {
        if i == 0 {
            println!("  Observation: {line}");
        } else {
            println!("    {line}");
        }
    }
    println!();
}

fn print_result(state: &RunState) {
    let elapsed = state.elapsed().num_milliseconds() as f64 / 1000.0;
    println!("  ==================== Result ====================");
    match state.status() {
        RunStatus::Completed { answer } => println!("  {answer}"),
        RunStatus::Failed { reason } => println!("  Run failed: {reason}"),
        RunStatus::Aborted => println!("  Run aborted."),
        RunStatus::Running => println!("  Run did not finish."),
    }
    println!("  ================================================");
    println!(
        "  {} iteration(s) in {elapsed:.2}s",
        state.iteration_count()
    );
}
