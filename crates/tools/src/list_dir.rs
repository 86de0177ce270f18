//! List directory tool: show the entries of a workspace directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use stepwise_core::{ActionInput, Tool, ToolError};
use tracing::debug;

use crate::workspace;

pub struct ListDirTool {
    root: PathBuf,
}

impl ListDirTool {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "Lists the files and directories at a path relative to the workspace. \
         Input is the path (e.g. '.' or 'src'), or {\"path\": \"...\"}. Directories end with '/'."
    }

    async fn execute(&self, input: &ActionInput) -> Result<String, ToolError> {
        let requested = input.text_arg("path").unwrap_or(".");
        let dir = workspace::resolve(self.name(), &self.root, requested)?;
        debug!(path = %dir.display(), "Listing directory");

        let failed = |e: std::io::Error| ToolError::ExecutionFailed {
            tool_name: "list_dir".into(),
            reason: format!("Failed to list '{requested}': {e}"),
        };

        let mut reader = tokio::fs::read_dir(&dir).await.map_err(failed)?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(failed)? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        if entries.is_empty() {
            return Ok(format!("Directory '{requested}' is empty."));
        }
        Ok(entries.join("\n"))
    }
}
