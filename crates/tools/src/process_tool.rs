//! Process-backed tool: a plugin tool implemented by an external command.
//!
//! Protocol: the command is spawned in the plugin directory, the action
//! input is written to stdin as JSON (a string for literal input, an object
//! for structured input), the tool's configuration block is passed as JSON
//! in `STEPWISE_TOOL_CONFIG`, and stdout is the observation. A non-zero
//! exit is an execution failure carrying stderr.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use stepwise_core::{ActionInput, Tool, ToolError};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Environment variable carrying the per-tool configuration block.
pub const TOOL_CONFIG_ENV: &str = "STEPWISE_TOOL_CONFIG";

pub struct ProcessTool {
    name: String,
    description: String,
    dangerous: bool,
    program: PathBuf,
    args: Vec<String>,
    workdir: PathBuf,
    config: Option<serde_json::Value>,
}

impl ProcessTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        program: impl Into<PathBuf>,
        workdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            dangerous: false,
            program: program.into(),
            args: Vec::new(),
            workdir: workdir.into(),
            config: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_dangerous(mut self, dangerous: bool) -> Self {
        self.dangerous = dangerous;
        self
    }

    pub fn with_config(mut self, config: Option<serde_json::Value>) -> Self {
        self.config = config;
        self
    }

    fn failed(&self, reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: self.name.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Tool for ProcessTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn dangerous(&self) -> bool {
        self.dangerous
    }

    async fn execute(&self, input: &ActionInput) -> Result<String, ToolError> {
        let payload = serde_json::to_vec(&input.to_json())
            .map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        let config = match &self.config {
            Some(value) => serde_json::to_string(value).map_err(|e| self.failed(e.to_string()))?,
            None => "{}".to_string(),
        };

        debug!(tool = %self.name, program = %self.program.display(), "Spawning plugin tool");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.workdir)
            .env(TOOL_CONFIG_ENV, config)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.failed(format!("failed to start '{}': {e}", self.program.display())))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A tool that ignores its input may exit before reading it.
            if let Err(e) = stdin.write_all(&payload).await {
                debug!(tool = %self.name, error = %e, "Plugin tool did not read its input");
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.failed(e.to_string()))?;

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failed(format!("exit status {code}: {}", stderr.trim())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}
