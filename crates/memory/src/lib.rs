//! Memory stores for Nimbus — long-lived knowledge the agent accumulates
//! across sessions.
//!
//! Two stores, both JSONL files on disk:
//! - [`FactStore`] — categorized facts the agent has learned
//! - [`GoalStore`] — standing goals with priorities
//!
//! Both implement [`nimbus_core::ContextSource`] so the context assembler can
//! fold their summaries into the system prompt.

pub mod facts;
pub mod goals;

pub use facts::{Fact, FactStore};
pub use goals::{Goal, GoalStore};
