//! Command line tool: run a shell command in the workspace.
//!
//! Flagged dangerous. The registry refuses it unless dangerous tools are
//! enabled for the run.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use stepwise_core::{ActionInput, Tool, ToolError};
use tokio::process::Command;
use tracing::warn;

pub struct CommandLineTool {
    workdir: PathBuf,
}

impl CommandLineTool {
    pub fn new(workdir: impl AsRef<Path>) -> Self {
        Self {
            workdir: workdir.as_ref().to_path_buf(),
        }
    }

    fn render(command: &str, code: i32, stdout: &str, stderr: &str) -> String {
        let section = |label: &str, text: &str| {
            let text = text.trim();
            if text.is_empty() {
                format!("{label}: (empty)")
            } else {
                format!("{label}:\n{text}")
            }
        };
        format!(
            "Command executed: '{command}'\nReturn Code: {code}\n{}\n{}",
            section("STDOUT", stdout),
            section("STDERR", stderr)
        )
    }
}

#[async_trait]
impl Tool for CommandLineTool {
    fn name(&self) -> &str {
        "command_line"
    }

    fn description(&self) -> &str {
        "Executes a command in the host's default shell, from the workspace directory. \
         Input is the command string (e.g. 'ls -l'), or {\"command\": \"...\"}. \
         Returns the exit code, stdout and stderr."
    }

    fn dangerous(&self) -> bool {
        true
    }

    async fn execute(&self, input: &ActionInput) -> Result<String, ToolError> {
        let command = input
            .text_arg("command")
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ToolError::InvalidInput("No command provided".into()))?;

        warn!(command = %command, "Executing shell command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        };

        let output = cmd
            .current_dir(&self.workdir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "command_line".into(),
                reason: e.to_string(),
            })?;

        let code = output.status.code().unwrap_or(-1);
        if !output.status.success() {
            warn!(command = %command, exit_code = code, "Command exited with non-zero status");
        }

        Ok(Self::render(
            command,
            code,
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flagged_dangerous() {
        assert!(CommandLineTool::new(".").dangerous());
    }

    #[tokio::test]
    async fn execute_echo() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CommandLineTool::new(dir.path());
        let output = tool
            .execute(&ActionInput::literal("echo hello"))
            .await
            .unwrap();
        assert!(output.contains("Return Code: 0"));
        assert!(output.contains("STDOUT:\nhello"));
        assert!(output.contains("STDERR: (empty)"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CommandLineTool::new(dir.path());
        let input = ActionInput::structured(serde_json::json!({"command": "exit 3"})).unwrap();
        let output = tool.execute(&input).await.unwrap();
        assert!(output.contains("Return Code: 3"));
    }

    #[tokio::test]
    async fn runs_in_workdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let tool = CommandLineTool::new(dir.path());
        let output = tool.execute(&ActionInput::literal("ls")).await.unwrap();
        assert!(output.contains("marker.txt"));
    }

    #[tokio::test]
    async fn empty_command_rejected() {
        let tool = CommandLineTool::new(".");
        assert!(matches!(
            tool.execute(&ActionInput::literal("  ")).await,
            Err(ToolError::InvalidInput(_))
        ));
    }
}
