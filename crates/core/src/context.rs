//! Context sources — named collaborators that contribute system prompt
//! sections.
//!
//! The context assembler queries each registered source when it rebuilds the
//! system prompt. A source that has nothing to say returns an empty string
//! and its section is omitted entirely.

use async_trait::async_trait;

/// A collaborator that renders one section of the system prompt.
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// The section heading (e.g., "Memory", "Goals", "Usage").
    fn name(&self) -> &str;

    /// Render the section body, staying within `budget_chars`.
    /// Return an empty string to omit the section.
    async fn render(&self, budget_chars: usize) -> String;
}
