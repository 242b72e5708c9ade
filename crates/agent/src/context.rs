//! System prompt assembly.
//!
//! The assembler builds the full system prompt from a fixed identity header,
//! the live tool catalog, and a set of pluggable context sources (memory,
//! goals, usage). Sources share a character budget; a source that renders
//! nothing gets no section.

use chrono::Utc;
use nimbus_core::context::ContextSource;
use nimbus_core::tool::ToolRegistry;
use std::sync::Arc;

/// Builds the system prompt for each session.
pub struct ContextAssembler {
    agent_name: String,
    instructions: String,
    sources: Vec<Arc<dyn ContextSource>>,
    budget_chars: usize,
}

impl ContextAssembler {
    pub fn new(
        agent_name: impl Into<String>,
        instructions: impl Into<String>,
        budget_chars: usize,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            instructions: instructions.into(),
            sources: Vec::new(),
            budget_chars,
        }
    }

    /// Register a context source. Sections render in registration order.
    pub fn add_source(&mut self, source: Arc<dyn ContextSource>) {
        self.sources.push(source);
    }

    /// Assemble the complete system prompt against the current tool catalog.
    pub async fn assemble(&self, registry: &ToolRegistry) -> String {
        let mut prompt = format!(
            "You are {}, an autonomous assistant.\nCurrent time: {}\n\n{}",
            self.agent_name,
            Utc::now().format("%Y-%m-%d %H:%M UTC"),
            self.instructions,
        );

        if !registry.is_empty() {
            prompt.push_str("\n\n## Tools Available\n");
            for def in registry.definitions() {
                prompt.push_str(&format!("- {}: {}\n", def.name, def.description));
            }
        }

        if self.sources.is_empty() {
            return prompt;
        }

        let per_source = self.budget_chars / self.sources.len();
        for source in &self.sources {
            let body = source.render(per_source).await;
            if body.is_empty() {
                continue;
            }
            prompt.push_str(&format!("\n## {}\n{}\n", source.name(), body));
        }

        prompt
    }
}
