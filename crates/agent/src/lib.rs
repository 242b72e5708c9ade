//! Agent orchestration — the heart of Nimbus.
//!
//! Each user message runs one turn:
//!
//! 1. The session is created or its system prompt refreshed
//! 2. The transcript goes to the provider
//! 3. **If tool calls**: dispatch them, append the results, loop back to 2
//! 4. **If text**: append it and return to the caller
//!
//! The loop is bounded by an iteration cap and a wall-clock deadline. Long
//! tasks can be delegated to subagents, synchronously or in the background.

pub mod context;
pub mod service;
pub mod session;
pub mod subagent;

pub use context::ContextAssembler;
pub use service::{AgentService, RegistryCell};
pub use session::{Session, SessionStore};
pub use subagent::{
    delegation_tools, CompletionHandler, DelegationConfig, SpawnTool, SubagentTool,
    SubagentTracker, TaskRecord, TaskStatus,
};
