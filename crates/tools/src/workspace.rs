//! Workspace file tools — read, write, edit, and list files inside the
//! workspace root.
//!
//! Every path goes through `nimbus_security::resolve_within` before any
//! filesystem access; a path that escapes the root is a `PermissionDenied`
//! before anything is touched.

use async_trait::async_trait;
use nimbus_core::error::ToolError;
use nimbus_core::tool::{Tool, ToolContext, ToolResult};
use nimbus_core::truncate_chars;
use std::path::PathBuf;
use tracing::debug;

/// Cap on file content returned to the model.
const READ_MAX_CHARS: usize = 12_000;

fn resolve(root: &PathBuf, path: &str, tool_name: &str) -> Result<PathBuf, ToolError> {
    nimbus_security::resolve_within(root, path).map_err(|e| ToolError::PermissionDenied {
        tool_name: tool_name.into(),
        reason: e.to_string(),
    })
}

fn required_str<'a>(arguments: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolError> {
    arguments[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

/// Read a file's contents.
pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file in the workspace. Paths are relative to the workspace root."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read, relative to the workspace"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        _cx: &ToolContext,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let path = required_str(&arguments, "path")?;
        let resolved = resolve(&self.root, path, "read_file")?;

        match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => Ok(ToolResult::ok(truncate_chars(&content, READ_MAX_CHARS))),
            Err(e) => Ok(ToolResult {
                success: false,
                output: format!("Failed to read file: {e}"),
            }),
        }
    }
}

/// Write (create or overwrite) a file.
pub struct WriteFileTool {
    root: PathBuf,
}

impl WriteFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file in the workspace, creating it (and any parent directories) if needed. Overwrites existing content."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write, relative to the workspace"
                },
                "content": {
                    "type": "string",
                    "description": "The full content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(
        &self,
        _cx: &ToolContext,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let path = required_str(&arguments, "path")?;
        let content = required_str(&arguments, "content")?;
        let resolved = resolve(&self.root, path, "write_file")?;

        if let Some(parent) = resolved.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(ToolResult {
                    success: false,
                    output: format!("Failed to create parent directory: {e}"),
                });
            }
        }

        match tokio::fs::write(&resolved, content).await {
            Ok(()) => {
                debug!(path = %resolved.display(), bytes = content.len(), "Wrote file");
                Ok(ToolResult::ok(format!(
                    "Wrote {} bytes to {path}",
                    content.len()
                )))
            }
            Err(e) => Ok(ToolResult {
                success: false,
                output: format!("Failed to write file: {e}"),
            }),
        }
    }
}

/// Replace one unique occurrence of a text span in a file.
pub struct EditFileTool {
    root: PathBuf,
}

impl EditFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit a file by replacing old_text with new_text. old_text must appear exactly once in the file; include enough surrounding context to make it unique."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to edit, relative to the workspace"
                },
                "old_text": {
                    "type": "string",
                    "description": "The exact text to replace"
                },
                "new_text": {
                    "type": "string",
                    "description": "The replacement text"
                }
            },
            "required": ["path", "old_text", "new_text"]
        })
    }

    async fn execute(
        &self,
        _cx: &ToolContext,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let path = required_str(&arguments, "path")?;
        let old_text = required_str(&arguments, "old_text")?;
        let new_text = required_str(&arguments, "new_text")?;
        let resolved = resolve(&self.root, path, "edit_file")?;

        let content = match tokio::fs::read_to_string(&resolved).await {
            Ok(c) => c,
            Err(e) => {
                return Ok(ToolResult {
                    success: false,
                    output: format!("Failed to read file: {e}"),
                });
            }
        };

        let occurrences = content.matches(old_text).count();
        if occurrences == 0 {
            return Ok(ToolResult {
                success: false,
                output: "old_text not found in file".into(),
            });
        }
        if occurrences > 1 {
            return Ok(ToolResult {
                success: false,
                output: format!(
                    "old_text appears {occurrences} times; add surrounding context so it is unique"
                ),
            });
        }

        let updated = content.replacen(old_text, new_text, 1);
        match tokio::fs::write(&resolved, updated).await {
            Ok(()) => Ok(ToolResult::ok(format!("Edited {path}"))),
            Err(e) => Ok(ToolResult {
                success: false,
                output: format!("Failed to write file: {e}"),
            }),
        }
    }
}

/// List directory entries.
pub struct ListFilesTool {
    root: PathBuf,
}

impl ListFilesTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List the files and directories at a path in the workspace. Defaults to the workspace root."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list, relative to the workspace (default: workspace root)"
                }
            }
        })
    }

    async fn execute(
        &self,
        _cx: &ToolContext,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let path = arguments["path"].as_str().unwrap_or(".");
        let resolved = resolve(&self.root, path, "list_files")?;

        let mut entries = match tokio::fs::read_dir(&resolved).await {
            Ok(rd) => rd,
            Err(e) => {
                return Ok(ToolResult {
                    success: false,
                    output: format!("Failed to list directory: {e}"),
                });
            }
        };

        let mut names = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let mut name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();

        if names.is_empty() {
            return Ok(ToolResult::ok("(empty directory)"));
        }
        Ok(ToolResult::ok(names.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cx() -> ToolContext {
        ToolContext::default()
    }

    #[tokio::test]
    async fn read_write_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let write = WriteFileTool::new(dir.path().to_path_buf());
        let read = ReadFileTool::new(dir.path().to_path_buf());

        let result = write
            .execute(
                &cx(),
                serde_json::json!({"path": "notes.txt", "content": "hello workspace"}),
            )
            .await
            .unwrap();
        assert!(result.success);

        let result = read
            .execute(&cx(), serde_json::json!({"path": "notes.txt"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hello workspace");
    }

    #[tokio::test]
    async fn write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let write = WriteFileTool::new(dir.path().to_path_buf());

        let result = write
            .execute(
                &cx(),
                serde_json::json!({"path": "a/b/c.txt", "content": "nested"}),
            )
            .await
            .unwrap();
        assert!(result.success);
        assert!(dir.path().join("a/b/c.txt").exists());
    }

    #[tokio::test]
    async fn read_outside_workspace_denied() {
        let dir = tempfile::tempdir().unwrap();
        let read = ReadFileTool::new(dir.path().to_path_buf());

        let err = read
            .execute(&cx(), serde_json::json!({"path": "../../etc/passwd"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn read_nonexistent_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let read = ReadFileTool::new(dir.path().to_path_buf());

        let result = read
            .execute(&cx(), serde_json::json!({"path": "missing.txt"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("Failed to read file"));
    }

    #[tokio::test]
    async fn edit_replaces_unique_text() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() { old(); }").unwrap();
        let edit = EditFileTool::new(dir.path().to_path_buf());

        let result = edit
            .execute(
                &cx(),
                serde_json::json!({"path": "main.rs", "old_text": "old()", "new_text": "new()"}),
            )
            .await
            .unwrap();
        assert!(result.success);

        let content = std::fs::read_to_string(dir.path().join("main.rs")).unwrap();
        assert_eq!(content, "fn main() { new(); }");
    }

    #[tokio::test]
    async fn edit_rejects_ambiguous_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.txt"), "aaa bbb aaa").unwrap();
        let edit = EditFileTool::new(dir.path().to_path_buf());

        let result = edit
            .execute(
                &cx(),
                serde_json::json!({"path": "x.txt", "old_text": "aaa", "new_text": "ccc"}),
            )
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("2 times"));
    }

    #[tokio::test]
    async fn edit_rejects_missing_text() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.txt"), "hello").unwrap();
        let edit = EditFileTool::new(dir.path().to_path_buf());

        let result = edit
            .execute(
                &cx(),
                serde_json::json!({"path": "x.txt", "old_text": "absent", "new_text": "y"}),
            )
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("not found"));
    }

    #[tokio::test]
    async fn list_marks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("file.txt"), "x").unwrap();
        let list = ListFilesTool::new(dir.path().to_path_buf());

        let result = list.execute(&cx(), serde_json::json!({})).await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("file.txt"));
        assert!(result.output.contains("sub/"));
    }

    #[tokio::test]
    async fn missing_required_argument() {
        let dir = tempfile::tempdir().unwrap();
        let read = ReadFileTool::new(dir.path().to_path_buf());
        let result = read.execute(&cx(), serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
