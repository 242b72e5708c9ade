//! # Nimbus Core
//!
//! Domain types, traits, and error definitions for the Nimbus agent.
//! This crate has **zero framework dependencies** — it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod context;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod text;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use context::ContextSource;
pub use error::{Error, MemoryError, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{ConversationId, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use text::truncate_chars;
pub use tool::{Tool, ToolContext, ToolRegistry, ToolResult};
