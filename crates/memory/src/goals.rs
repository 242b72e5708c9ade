//! Goal store — standing goals the agent keeps in mind across sessions.
//!
//! Same JSONL-on-disk shape as the fact store. Goals are few; the whole set
//! is rendered into the system prompt sorted by priority.
//!
//! Storage location: `~/.nimbus/memory/goals.jsonl`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nimbus_core::error::MemoryError;
use nimbus_core::{truncate_chars, ContextSource};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

use crate::facts::{load_jsonl, write_jsonl};

/// A standing goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    /// What to accomplish
    pub description: String,

    /// 1 = highest, 5 = lowest
    pub priority: u8,

    /// "active" or "done"
    pub status: String,

    /// Last time this goal was set or updated
    pub updated_at: DateTime<Utc>,
}

/// A file-backed store of prioritized goals.
pub struct GoalStore {
    path: PathBuf,
    goals: RwLock<Vec<Goal>>,
}

impl GoalStore {
    /// Open a goal store at the given path. Missing file = empty store.
    pub fn new(path: PathBuf) -> Self {
        let goals = load_jsonl(&path);
        debug!(path = %path.display(), count = goals.len(), "Goal store loaded");
        Self {
            path,
            goals: RwLock::new(goals),
        }
    }

    /// Set a goal. A goal with the same description is updated in place.
    pub async fn set(
        &self,
        description: impl Into<String>,
        priority: u8,
    ) -> Result<(), MemoryError> {
        let goal = Goal {
            description: description.into(),
            priority: priority.clamp(1, 5),
            status: "active".into(),
            updated_at: Utc::now(),
        };

        {
            let mut goals = self.goals.write().await;
            goals.retain(|g| g.description != goal.description);
            goals.push(goal);
        }
        self.flush().await
    }

    /// Mark a goal done. Returns false if no goal matched.
    pub async fn complete(&self, description: &str) -> Result<bool, MemoryError> {
        let found = {
            let mut goals = self.goals.write().await;
            match goals.iter_mut().find(|g| g.description == description) {
                Some(goal) => {
                    goal.status = "done".into();
                    goal.updated_at = Utc::now();
                    true
                }
                None => false,
            }
        };
        if found {
            self.flush().await?;
        }
        Ok(found)
    }

    /// Active goals sorted by priority (highest first).
    pub async fn active(&self) -> Vec<Goal> {
        let goals = self.goals.read().await;
        let mut out: Vec<Goal> = goals.iter().filter(|g| g.status == "active").cloned().collect();
        out.sort_by_key(|g| g.priority);
        out
    }

    async fn flush(&self) -> Result<(), MemoryError> {
        let goals = self.goals.read().await;
        write_jsonl(&self.path, goals.iter())
    }
}

#[async_trait]
impl ContextSource for GoalStore {
    fn name(&self) -> &str {
        "Goals"
    }

    async fn render(&self, budget_chars: usize) -> String {
        let goals = self.active().await;
        if goals.is_empty() {
            return String::new();
        }

        let lines: Vec<String> = goals
            .iter()
            .map(|g| format!("- (P{}) {}", g.priority, g.description))
            .collect();
        truncate_chars(&lines.join("\n"), budget_chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, GoalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = GoalStore::new(dir.path().join("goals.jsonl"));
        (dir, store)
    }

    #[tokio::test]
    async fn set_and_reload_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("goals.jsonl");

        let store = GoalStore::new(path.clone());
        store.set("ship the release", 1).await.unwrap();

        let store2 = GoalStore::new(path);
        let goals = store2.active().await;
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].description, "ship the release");
    }

    #[tokio::test]
    async fn same_description_updates_in_place() {
        let (_dir, store) = temp_store();
        store.set("write docs", 3).await.unwrap();
        store.set("write docs", 1).await.unwrap();

        let goals = store.active().await;
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].priority, 1);
    }

    #[tokio::test]
    async fn completed_goals_leave_active_set() {
        let (_dir, store) = temp_store();
        store.set("fix the bug", 2).await.unwrap();
        assert!(store.complete("fix the bug").await.unwrap());
        assert!(store.active().await.is_empty());

        // unknown goal
        assert!(!store.complete("not a goal").await.unwrap());
    }

    #[tokio::test]
    async fn active_sorted_by_priority() {
        let (_dir, store) = temp_store();
        store.set("low", 5).await.unwrap();
        store.set("high", 1).await.unwrap();

        let goals = store.active().await;
        assert_eq!(goals[0].description, "high");
    }

    #[tokio::test]
    async fn render_lists_priorities() {
        let (_dir, store) = temp_store();
        store.set("keep tests green", 1).await.unwrap();

        let rendered = store.render(1000).await;
        assert!(rendered.contains("(P1) keep tests green"));
    }

    #[tokio::test]
    async fn render_empty_store_is_empty() {
        let (_dir, store) = temp_store();
        assert!(store.render(1000).await.is_empty());
    }
}
