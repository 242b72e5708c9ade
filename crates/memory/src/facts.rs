//! Fact store — persistent JSONL storage of learned facts.
//!
//! Each line of the store file is a JSON-encoded [`Fact`]. Facts are loaded
//! into memory on creation and flushed to disk on every mutation, giving
//! fast reads with durable writes. The file is human-inspectable.
//!
//! Storage location: `~/.nimbus/memory/facts.jsonl`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nimbus_core::error::MemoryError;
use nimbus_core::{truncate_chars, ContextSource};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Keep at most this many facts; oldest are dropped first.
const MAX_FACTS: usize = 200;

/// A single learned fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    /// Grouping key, e.g. "user", "environment", "preferences"
    pub category: String,

    /// The fact itself, one sentence
    pub content: String,

    /// How sure the agent is (0.0–1.0)
    pub confidence: f32,

    /// When the fact was learned
    pub learned_at: DateTime<Utc>,
}

/// A file-backed store of categorized facts.
pub struct FactStore {
    path: PathBuf,
    facts: RwLock<Vec<Fact>>,
}

impl FactStore {
    /// Open a fact store at the given path. Missing file = empty store.
    pub fn new(path: PathBuf) -> Self {
        let facts = load_jsonl(&path);
        debug!(path = %path.display(), count = facts.len(), "Fact store loaded");
        Self {
            path,
            facts: RwLock::new(facts),
        }
    }

    /// Record a new fact. Duplicate content within a category is refreshed
    /// in place rather than stored twice.
    pub async fn learn(
        &self,
        category: impl Into<String>,
        content: impl Into<String>,
        confidence: f32,
    ) -> Result<(), MemoryError> {
        let fact = Fact {
            category: category.into(),
            content: content.into(),
            confidence: confidence.clamp(0.0, 1.0),
            learned_at: Utc::now(),
        };

        {
            let mut facts = self.facts.write().await;
            facts.retain(|f| !(f.category == fact.category && f.content == fact.content));
            facts.push(fact);
            if facts.len() > MAX_FACTS {
                let excess = facts.len() - MAX_FACTS;
                facts.drain(..excess);
            }
        }
        self.flush().await
    }

    /// Facts in a category, newest first. Empty category = all facts.
    pub async fn recall(&self, category: &str) -> Vec<Fact> {
        let facts = self.facts.read().await;
        let mut out: Vec<Fact> = facts
            .iter()
            .filter(|f| category.is_empty() || f.category == category)
            .cloned()
            .collect();
        out.reverse();
        out
    }

    pub async fn count(&self) -> usize {
        self.facts.read().await.len()
    }

    async fn flush(&self) -> Result<(), MemoryError> {
        let facts = self.facts.read().await;
        write_jsonl(&self.path, facts.iter())
    }
}

#[async_trait]
impl ContextSource for FactStore {
    fn name(&self) -> &str {
        "Memory"
    }

    /// Newest facts first, grouped as bullet lines, cut at the budget.
    async fn render(&self, budget_chars: usize) -> String {
        let facts = self.facts.read().await;
        if facts.is_empty() {
            return String::new();
        }

        let mut lines: Vec<String> = facts
            .iter()
            .rev()
            .map(|f| format!("- [{}] {}", f.category, f.content))
            .collect();
        lines.truncate(50);
        truncate_chars(&lines.join("\n"), budget_chars)
    }
}

pub(crate) fn load_jsonl<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Vec<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(), // file doesn't exist yet — start empty
    };

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<T>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping corrupted store entry");
                None
            }
        })
        .collect()
}

pub(crate) fn write_jsonl<'a, T: Serialize + 'a>(
    path: &PathBuf,
    entries: impl Iterator<Item = &'a T>,
) -> Result<(), MemoryError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| MemoryError::Storage(format!("Failed to create store directory: {e}")))?;
    }

    let mut content = String::new();
    for entry in entries {
        let line = serde_json::to_string(entry)
            .map_err(|e| MemoryError::Serialization(e.to_string()))?;
        content.push_str(&line);
        content.push('\n');
    }

    std::fs::write(path, &content)
        .map_err(|e| MemoryError::Storage(format!("Failed to write store file: {e}")))
}
