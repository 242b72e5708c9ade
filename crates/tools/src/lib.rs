//! Built-in tool implementations for Nimbus.
//!
//! Tools give the agent the ability to interact with the world: run shell
//! commands, read/write/edit files inside the workspace, make HTTP requests,
//! and maintain long-term memory.
//!
//! File and shell tools are constructed against an explicit workspace root.
//! The delegator re-scopes them by building a fresh set rooted at a
//! sub-directory.

pub mod http_request;
pub mod memory_tools;
pub mod shell;
pub mod workspace;

use nimbus_core::tool::{Tool, ToolRegistry};
use std::path::Path;
use std::sync::Arc;

pub use http_request::HttpRequestTool;
pub use memory_tools::{LearnFactTool, RecallFactsTool, SetGoalTool};
pub use shell::ShellTool;
pub use workspace::{EditFileTool, ListFilesTool, ReadFileTool, WriteFileTool};

/// Names of the tools that are fenced to a workspace root. The delegator
/// swaps exactly these when re-scoping a child to a sub-workspace.
pub const WORKSPACE_TOOL_NAMES: [&str; 5] =
    ["read_file", "write_file", "edit_file", "list_files", "shell"];

/// Build the workspace-scoped tool set rooted at `root`.
pub fn workspace_tools(root: &Path) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ReadFileTool::new(root.to_path_buf())),
        Arc::new(WriteFileTool::new(root.to_path_buf())),
        Arc::new(EditFileTool::new(root.to_path_buf())),
        Arc::new(ListFilesTool::new(root.to_path_buf())),
        Arc::new(ShellTool::new(root.to_path_buf())),
    ]
}

/// Register the workspace tool set into an existing registry.
pub fn register_workspace_tools(registry: &mut ToolRegistry, root: &Path) {
    for tool in workspace_tools(root) {
        registry.register(tool);
    }
}
