//! Stepwise CLI: the main entry point.
//!
//! Commands:
//! - `run`      Run the agent on a goal until it answers, fails or is interrupted
//! - `tools`    Show the tool catalog under the current configuration
//! - `plugins`  Show plugin directories and how loading them went
//! - `init`     Write a default `stepwise.toml`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "stepwise",
    about = "Stepwise: a ReAct agent runtime",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ./stepwise.toml)
    #[arg(short, long, global = true, env = "STEPWISE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent on a goal
    Run {
        /// What the agent should accomplish
        #[arg(required = true, num_args = 1..)]
        goal: Vec<String>,

        /// Allow tools flagged as dangerous (overrides the config file)
        #[arg(long)]
        enable_dangerous_tools: bool,

        /// Override the iteration budget
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Print the final run state as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the tools the agent can see
    Tools {
        /// Show tools as if dangerous tools were enabled
        #[arg(long)]
        enable_dangerous_tools: bool,
    },

    /// List plugin directories and their load status
    Plugins,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Run {
            goal,
            enable_dangerous_tools,
            max_iterations,
            json,
        } => {
            let options = commands::run::RunOptions {
                goal: goal.join(" "),
                enable_dangerous_tools,
                max_iterations,
                json,
            };
            return commands::run::run(config, options).await;
        }
        Commands::Tools {
            enable_dangerous_tools,
        } => commands::tools::run(config, enable_dangerous_tools)?,
        Commands::Plugins => commands::plugins::run(config)?,
        Commands::Init { force } => commands::init::run(config, force)?,
    }

    Ok(ExitCode::SUCCESS)
}
