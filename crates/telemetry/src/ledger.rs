//! The usage ledger — thread-safe counters with a human-readable report.

use crate::TelemetryError;
use chrono::{DateTime, Utc};
use nimbus_core::provider::Usage;
use nimbus_core::ContextSource;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::debug;

/// Counters for the current process lifetime ("session").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub messages: u64,
    pub oracle_calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Executions per tool name
    pub tool_calls: HashMap<String, u64>,
    pub started_at: DateTime<Utc>,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            messages: 0,
            oracle_calls: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            tool_calls: HashMap::new(),
            started_at: Utc::now(),
        }
    }
}

/// Counters persisted across restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifetimeStats {
    pub messages: u64,
    pub oracle_calls: u64,
    pub total_tokens: u64,
    /// Provider calls per model name
    pub calls_by_model: HashMap<String, u64>,
}

/// Thread-safe usage ledger.
///
/// All record methods are cheap counter bumps under an `RwLock`; persistence
/// happens only in [`UsageLedger::save_lifetime`].
pub struct UsageLedger {
    path: Option<PathBuf>,
    session: RwLock<SessionStats>,
    lifetime: RwLock<LifetimeStats>,
}

impl UsageLedger {
    /// Create a ledger. When `path` is given, lifetime stats are loaded from
    /// it (missing or unreadable file = fresh stats).
    pub fn new(path: Option<PathBuf>) -> Self {
        let lifetime = path
            .as_ref()
            .and_then(|p| std::fs::read_to_string(p).ok())
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();

        Self {
            path,
            session: RwLock::new(SessionStats::default()),
            lifetime: RwLock::new(lifetime),
        }
    }

    /// An in-memory ledger that never persists. Used in tests and when
    /// telemetry is disabled.
    pub fn ephemeral() -> Self {
        Self::new(None)
    }

    /// Count an inbound user message.
    pub fn record_message(&self) {
        if let Ok(mut s) = self.session.write() {
            s.messages += 1;
        }
        if let Ok(mut l) = self.lifetime.write() {
            l.messages += 1;
        }
    }

    /// Count a provider round-trip and its token usage.
    pub fn record_oracle_call(&self, model: &str, usage: Option<Usage>) {
        if let Ok(mut s) = self.session.write() {
            s.oracle_calls += 1;
            if let Some(u) = usage {
                s.prompt_tokens += u.prompt_tokens as u64;
                s.completion_tokens += u.completion_tokens as u64;
            }
        }
        if let Ok(mut l) = self.lifetime.write() {
            l.oracle_calls += 1;
            *l.calls_by_model.entry(model.to_string()).or_insert(0) += 1;
            if let Some(u) = usage {
                l.total_tokens += u.total_tokens as u64;
            }
        }
    }

    /// Count a tool execution.
    pub fn record_tool_call(&self, tool_name: &str) {
        if let Ok(mut s) = self.session.write() {
            *s.tool_calls.entry(tool_name.to_string()).or_insert(0) += 1;
        }
    }

    /// Snapshot of the current session counters.
    pub fn session_stats(&self) -> SessionStats {
        self.session
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Snapshot of the persisted lifetime counters.
    pub fn lifetime_stats(&self) -> LifetimeStats {
        self.lifetime
            .read()
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    /// Persist lifetime stats to disk. No-op for ephemeral ledgers.
    pub fn save_lifetime(&self) -> Result<(), TelemetryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let snapshot = self.lifetime_stats();
        let content = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TelemetryError::Persist(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| TelemetryError::Persist(e.to_string()))?;
        debug!(path = %path.display(), "Saved lifetime usage stats");
        Ok(())
    }

    /// Human-readable summary for the `usage` CLI command.
    pub fn report(&self) -> String {
        let s = self.session_stats();
        let l = self.lifetime_stats();

        let mut out = String::new();
        out.push_str("Session\n");
        out.push_str(&format!("  messages:       {}\n", s.messages));
        out.push_str(&format!("  oracle calls:   {}\n", s.oracle_calls));
        out.push_str(&format!(
            "  tokens:         {} in / {} out\n",
            s.prompt_tokens, s.completion_tokens
        ));

        if !s.tool_calls.is_empty() {
            let mut tools: Vec<_> = s.tool_calls.iter().collect();
            tools.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
            out.push_str("  tool calls:\n");
            for (name, count) in tools {
                out.push_str(&format!("    {name}: {count}\n"));
            }
        }

        out.push_str("Lifetime\n");
        out.push_str(&format!("  messages:       {}\n", l.messages));
        out.push_str(&format!("  oracle calls:   {}\n", l.oracle_calls));
        out.push_str(&format!("  total tokens:   {}\n", l.total_tokens));
        out
    }
}

#[async_trait::async_trait]
impl ContextSource for UsageLedger {
    fn name(&self) -> &str {
        "Usage"
    }

    /// Compact one-liner so the model knows how heavy the session is.
    async fn render(&self, _budget_chars: usize) -> String {
        let s = self.session_stats();
        if s.oracle_calls == 0 {
            return String::new();
        }
        format!(
            "This session: {} messages, {} oracle calls, {} prompt + {} completion tokens.",
            s.messages, s.oracle_calls, s.prompt_tokens, s.completion_tokens
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(p: u32, c: u32) -> Usage {
        Usage {
            prompt_tokens: p,
            completion_tokens: c,
            total_tokens: p + c,
        }
    }

    #[test]
    fn counters_accumulate() {
        let ledger = UsageLedger::ephemeral();
        ledger.record_message();
        ledger.record_oracle_call("gpt-4o", Some(usage(100, 20)));
        ledger.record_oracle_call("gpt-4o", None);
        ledger.record_tool_call("shell");
        ledger.record_tool_call("shell");

        let s = ledger.session_stats();
        assert_eq!(s.messages, 1);
        assert_eq!(s.oracle_calls, 2);
        assert_eq!(s.prompt_tokens, 100);
        assert_eq!(s.tool_calls["shell"], 2);

        let l = ledger.lifetime_stats();
        assert_eq!(l.calls_by_model["gpt-4o"], 2);
        assert_eq!(l.total_tokens, 120);
    }

    #[test]
    fn report_mentions_counts() {
        let ledger = UsageLedger::ephemeral();
        ledger.record_message();
        ledger.record_oracle_call("gpt-4o", Some(usage(10, 5)));
        ledger.record_tool_call("read_file");

        let report = ledger.report();
        assert!(report.contains("oracle calls:   1"));
        assert!(report.contains("read_file: 1"));
    }

    #[test]
    fn lifetime_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.json");

        let ledger = UsageLedger::new(Some(path.clone()));
        ledger.record_oracle_call("gpt-4o", Some(usage(50, 50)));
        ledger.save_lifetime().unwrap();

        let reloaded = UsageLedger::new(Some(path));
        assert_eq!(reloaded.lifetime_stats().total_tokens, 100);
        // session stats start fresh
        assert_eq!(reloaded.session_stats().oracle_calls, 0);
    }

    #[test]
    fn ephemeral_save_is_noop() {
        let ledger = UsageLedger::ephemeral();
        assert!(ledger.save_lifetime().is_ok());
    }

    #[tokio::test]
    async fn context_section_empty_before_first_call() {
        let ledger = UsageLedger::ephemeral();
        assert!(ledger.render(1000).await.is_empty());

        ledger.record_oracle_call("gpt-4o", Some(usage(1, 1)));
        assert!(ledger.render(1000).await.contains("oracle calls"));
    }
}
