//! Shell tool — execute commands inside the workspace.
//!
//! Commands run via `sh -c` with the workspace (or a validated `cwd` inside
//! it) as the working directory, a hard timeout, and a deny-list screen for
//! obviously destructive invocations.

use async_trait::async_trait;
use nimbus_core::error::ToolError;
use nimbus_core::tool::{Tool, ToolContext, ToolResult};
use nimbus_core::truncate_chars;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

const SHELL_TIMEOUT_SECS: u64 = 60;
const OUTPUT_MAX_CHARS: usize = 10_000;

/// Execute shell commands fenced to a workspace root.
pub struct ShellTool {
    root: PathBuf,
}

impl ShellTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the workspace and return stdout/stderr. Use this for running programs, checking files, git operations, etc."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "cwd": {
                    "type": "string",
                    "description": "Working directory relative to the workspace (default: workspace root)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(
        &self,
        _cx: &ToolContext,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        if let Err(e) = nimbus_security::guard_command(command) {
            return Err(ToolError::PermissionDenied {
                tool_name: "shell".into(),
                reason: e.to_string(),
            });
        }

        let cwd = match arguments["cwd"].as_str() {
            Some(sub) => nimbus_security::resolve_within(&self.root, sub).map_err(|e| {
                ToolError::PermissionDenied {
                    tool_name: "shell".into(),
                    reason: e.to_string(),
                }
            })?,
            None => self.root.clone(),
        };

        debug!(command = %command, cwd = %cwd.display(), "Executing shell command");

        let child = Command::new("sh")
            .args(["-c", command])
            .current_dir(&cwd)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(Duration::from_secs(SHELL_TIMEOUT_SECS), child)
            .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: "shell".into(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(command = %command, "Shell command timed out");
                return Err(ToolError::Timeout {
                    tool_name: "shell".into(),
                    timeout_secs: SHELL_TIMEOUT_SECS,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let success = output.status.success();

        let result_text = if success {
            if stderr.is_empty() {
                stdout
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            }
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Command failed");
            format!("[exit code: {code}]\n{stdout}\n{stderr}")
        };

        Ok(ToolResult {
            success,
            output: truncate_chars(result_text.trim(), OUTPUT_MAX_CHARS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cx() -> ToolContext {
        ToolContext::default()
    }

    #[tokio::test]
    async fn execute_echo() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ShellTool::new(dir.path().to_path_buf());
        let result = tool
            .execute(&cx(), serde_json::json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("hello"));
    }

    #[tokio::test]
    async fn runs_in_workspace_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let tool = ShellTool::new(dir.path().to_path_buf());

        let result = tool
            .execute(&cx(), serde_json::json!({"command": "ls"}))
            .await
            .unwrap();
        assert!(result.output.contains("marker.txt"));
    }

    #[tokio::test]
    async fn cwd_resolved_inside_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/inner.txt"), "x").unwrap();
        let tool = ShellTool::new(dir.path().to_path_buf());

        let result = tool
            .execute(&cx(), serde_json::json!({"command": "ls", "cwd": "sub"}))
            .await
            .unwrap();
        assert!(result.output.contains("inner.txt"));
    }

    #[tokio::test]
    async fn cwd_escape_denied() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ShellTool::new(dir.path().to_path_buf());

        let result = tool
            .execute(&cx(), serde_json::json!({"command": "ls", "cwd": "../.."}))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn dangerous_command_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ShellTool::new(dir.path().to_path_buf());

        let result = tool
            .execute(&cx(), serde_json::json!({"command": "sudo rm -rf /"}))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn failing_command_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ShellTool::new(dir.path().to_path_buf());

        let result = tool
            .execute(&cx(), serde_json::json!({"command": "false"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("exit code"));
    }

    #[tokio::test(start_paused = true)]
    async fn long_command_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ShellTool::new(dir.path().to_path_buf());

        // auto-advance: the sleep elapses without real waiting
        let result = tool
            .execute(&cx(), serde_json::json!({"command": "sleep 3600"}))
            .await;
        assert!(matches!(result, Err(ToolError::Timeout { .. })));
    }
}
