//! Path scoping for the workspace-bound built-in tools.

use std::path::{Component, Path, PathBuf};

use stepwise_core::ToolError;

/// Resolve `requested` against `root`, refusing anything that would leave it.
///
/// Only relative paths without `..` components are accepted; `""` and `"."`
/// name the root itself.
pub(crate) fn resolve(tool: &str, root: &Path, requested: &str) -> Result<PathBuf, ToolError> {
    let requested = requested.trim();
    let relative = Path::new(requested);

    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: tool.into(),
                    reason: format!("Access denied: '{requested}' is outside the workspace"),
                });
            }
        }
    }

    Ok(root.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_stay_in_root() {
        let root = Path::new("/ws");
        assert_eq!(resolve("t", root, ".").unwrap(), PathBuf::from("/ws/."));
        assert_eq!(resolve("t", root, "").unwrap(), PathBuf::from("/ws/"));
        assert_eq!(
            resolve("t", root, "src/main.rs").unwrap(),
            PathBuf::from("/ws/src/main.rs")
        );
    }

    #[test]
    fn escapes_are_denied() {
        let root = Path::new("/ws");
        assert!(resolve("t", root, "../etc/passwd").is_err());
        assert!(resolve("t", root, "/etc/passwd").is_err());
        assert!(resolve("t", root, "a/../../b").is_err());
    }
}
