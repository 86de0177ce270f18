//! Read file tool: return the contents of a workspace file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use stepwise_core::{ActionInput, Tool, ToolError};

use crate::workspace;

pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads a text file at a path relative to the workspace. \
         Input is the path, or {\"path\": \"...\"}."
    }

    async fn execute(&self, input: &ActionInput) -> Result<String, ToolError> {
        let requested = input
            .text_arg("path")
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidInput("Missing 'path' argument".into()))?;
        let path = workspace::resolve(self.name(), &self.root, requested)?;

        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "read_file".into(),
                reason: format!("Failed to read file '{requested}': {e}"),
            })
    }
}
